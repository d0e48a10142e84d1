//! Wire types for the VPN gateway management API
//!
//! This library defines the JSON payloads exchanged with the gateway backend:
//! - AllowListEntry: an IPv4 address permitted to reach the gateway
//! - Peer: a WireGuard client as reported by the status endpoints
//! - Envelope types wrapping both in the shapes the backend returns

pub mod allow_list;
pub mod peer;

pub use allow_list::{
    AllowListEntry, AllowListPayload, AllowListQuery, CreatedEntry, CreatedItems, DeleteStatus,
    NewAllowListEntry,
};
pub use peer::{Peer, PeerStatusList, Protection};
