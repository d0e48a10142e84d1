//! Peer registry and allow-list view-models for the VPN gateway console
//!
//! This library provides:
//! - Allow-list store with client-side address validation
//! - Peer registry with the protection flag and confirmation-gated deletion
//! - Reachability classification from handshake recency
//! - The backend abstraction both views talk through

pub mod allow_list;
pub mod backend;
pub mod command;
pub mod config;
pub mod error;
pub mod memory;
pub mod reachability;
pub mod registry;

pub use allow_list::{validate_ipv4, AllowListStore, CsvScan};
pub use backend::{RegistryBackend, StatusSource};
pub use command::{
    AlwaysConfirm, BatchReport, Confirm, ConfirmPrompt, Confirmation, DeleteCommand,
    DeleteOutcome, NeverConfirm,
};
pub use config::ConsoleConfig;
pub use error::{Notification, NotificationLevel, RegistryError, Result};
pub use memory::MemoryBackend;
pub use reachability::{Reachability, ReachabilityClassifier, DEFAULT_ONLINE_THRESHOLD};
pub use registry::{PeerRegistry, PeerSummary};
