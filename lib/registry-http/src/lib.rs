//! REST client for the gateway management API
pub mod client;

pub use client::HttpBackend;
