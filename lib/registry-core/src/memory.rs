//! In-process backend with the same contract as the gateway API

use crate::{RegistryBackend, RegistryError, Result, StatusSource};
use async_trait::async_trait;
use registry_api::{AllowListEntry, AllowListQuery, CreatedEntry, NewAllowListEntry, Peer};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// MemoryBackend keeps allow-list rows and peers in memory.
///
/// Allow-list ids are allocated monotonically and duplicate addresses are
/// answered with a null id, like the gateway's unique constraint. Removed
/// peer keys are remembered and cannot be registered again.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    requests: AtomicUsize,
    offline: AtomicBool,
}

#[derive(Default)]
struct State {
    next_id: i64,
    allow_list: BTreeMap<i64, String>,
    peers: Vec<Peer>,
    blank: Vec<Peer>,
    removed_keys: HashSet<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_peers(peers: Vec<Peer>) -> Result<Self> {
        let backend = Self::new();
        for peer in peers {
            backend.register_peer(peer).await?;
        }
        Ok(backend)
    }

    /// Add a peer the way the tunnel configuration subsystem would
    pub async fn register_peer(&self, peer: Peer) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.removed_keys.contains(&peer.pub_key) {
            return Err(RegistryError::Conflict(format!(
                "public key {} belonged to a removed peer",
                peer.pub_key
            )));
        }
        if state.peers.iter().any(|p| p.pub_key == peer.pub_key) {
            return Err(RegistryError::Conflict(format!(
                "public key {} already registered",
                peer.pub_key
            )));
        }
        state.peers.push(peer);
        Ok(())
    }

    /// Replace the template served for `StatusSource::Blank`
    pub async fn set_blank(&self, peers: Vec<Peer>) {
        self.state.lock().await.blank = peers;
    }

    /// Overwrite the stored status fields of a peer (handshake, counters)
    pub async fn update_peer<F>(&self, pub_key: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut Peer),
    {
        let mut state = self.state.lock().await;
        let peer = state
            .peers
            .iter_mut()
            .find(|p| p.pub_key == pub_key)
            .ok_or_else(|| RegistryError::NotFound(pub_key.to_string()))?;
        update(peer);
        Ok(())
    }

    /// Simulate the gateway going away: every call fails with `Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of calls served (or refused) so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn begin(&self, what: &str) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable(format!("{}: backend offline", what)));
        }
        debug!("memory backend: {}", what);
        Ok(())
    }

    fn insert(state: &mut State, ip_addr: &str) -> CreatedEntry {
        if state.allow_list.values().any(|ip| ip == ip_addr) {
            return CreatedEntry {
                id: None,
                ip_addr: Some(ip_addr.to_string()),
            };
        }
        state.next_id += 1;
        let id = state.next_id;
        state.allow_list.insert(id, ip_addr.to_string());
        CreatedEntry {
            id: Some(id),
            ip_addr: Some(ip_addr.to_string()),
        }
    }
}

#[async_trait]
impl RegistryBackend for MemoryBackend {
    async fn list_allow_list(&self, query: &AllowListQuery) -> Result<Vec<AllowListEntry>> {
        self.begin("list allow-list")?;
        let state = self.state.lock().await;
        Ok(state
            .allow_list
            .iter()
            .map(|(id, ip)| AllowListEntry {
                id: *id,
                ip_addr: ip.clone(),
            })
            .filter(|entry| query.matches(entry))
            .collect())
    }

    async fn create_allow_list(&self, items: &[NewAllowListEntry]) -> Result<Vec<CreatedEntry>> {
        self.begin("create allow-list entries")?;
        let mut state = self.state.lock().await;
        Ok(items
            .iter()
            .map(|item| Self::insert(&mut state, &item.ip_addr))
            .collect())
    }

    async fn import_allow_list(&self, file_name: &str, csv: Vec<u8>) -> Result<Vec<CreatedEntry>> {
        self.begin(&format!("import {}", file_name))?;
        let text = String::from_utf8_lossy(&csv);
        let mut state = self.state.lock().await;
        Ok(text
            .lines()
            .filter_map(|line| line.split(',').next())
            .map(|cell| cell.trim().trim_matches('"'))
            .filter(|cell| !cell.is_empty())
            .map(|cell| Self::insert(&mut state, cell))
            .collect())
    }

    async fn delete_allow_list(&self, id: i64) -> Result<()> {
        self.begin(&format!("delete allow-list entry {}", id))?;
        let mut state = self.state.lock().await;
        state
            .allow_list
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(format!("Record {} not found", id)))
    }

    async fn peer_status(&self, source: StatusSource) -> Result<Vec<Peer>> {
        self.begin("peer status")?;
        let state = self.state.lock().await;
        Ok(match source {
            StatusSource::Live => state.peers.clone(),
            StatusSource::Blank => state.blank.clone(),
        })
    }

    async fn set_not_removable(&self, name: &str) -> Result<()> {
        self.begin(&format!("protect {}", name))?;
        let mut state = self.state.lock().await;
        let peer = state
            .peers
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| RegistryError::NotFound(format!("config {} not found", name)))?;
        peer.used = true;
        Ok(())
    }

    async fn remove_peer(&self, pub_key: &str) -> Result<()> {
        self.begin(&format!("remove {}", pub_key))?;
        let mut state = self.state.lock().await;
        let before = state.peers.len();
        state.peers.retain(|p| p.pub_key != pub_key);
        if state.peers.len() == before {
            return Err(RegistryError::NotFound(format!("peer {} not found", pub_key)));
        }
        state.removed_keys.insert(pub_key.to_string());
        Ok(())
    }
}
