//! Backend abstraction over the gateway management endpoints

use crate::Result;
use async_trait::async_trait;
use registry_api::{AllowListEntry, AllowListQuery, CreatedEntry, NewAllowListEntry, Peer};

/// Which status endpoint to read peers from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusSource {
    /// Live `wg show` backed status
    #[default]
    Live,
    /// Template payload the backend serves for layout checks
    Blank,
}

/// One method per backend endpoint. Implementations perform exactly one
/// request per call and never retry.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// `GET /whitelist`
    async fn list_allow_list(&self, query: &AllowListQuery) -> Result<Vec<AllowListEntry>>;

    /// `POST /whitelist`
    async fn create_allow_list(&self, items: &[NewAllowListEntry]) -> Result<Vec<CreatedEntry>>;

    /// `POST /whitelist_file`
    async fn import_allow_list(&self, file_name: &str, csv: Vec<u8>) -> Result<Vec<CreatedEntry>>;

    /// `DELETE /whitelist/{id}`
    async fn delete_allow_list(&self, id: i64) -> Result<()>;

    /// `GET /wireguard_user_status` or its blank variant
    async fn peer_status(&self, source: StatusSource) -> Result<Vec<Peer>>;

    /// `PUT /wireguard_config_not_removed_flg`
    async fn set_not_removable(&self, name: &str) -> Result<()>;

    /// `DELETE /wireguard_config_remove`
    async fn remove_peer(&self, pub_key: &str) -> Result<()>;
}
