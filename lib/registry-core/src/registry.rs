//! Peer registry view-model: status snapshot, protection flag, deletion

use crate::{
    BatchReport, Confirm, ConfirmPrompt, Confirmation, DeleteCommand, DeleteOutcome,
    ReachabilityClassifier, RegistryBackend, RegistryError, Result, StatusSource,
};
use chrono::Utc;
use futures::future::join_all;
use registry_api::{Peer, Protection};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// PeerRegistry maintains the operator's view of the gateway peers.
///
/// The snapshot is only ever replaced by `refresh`; every mutation is sent to
/// the backend first and followed by a refresh.
pub struct PeerRegistry {
    backend: Arc<dyn RegistryBackend>,
    source: StatusSource,
    classifier: Option<ReachabilityClassifier>,
    refresh_delay: Duration,
    // pub_key -> peer
    peers: Arc<RwLock<HashMap<String, Peer>>>,
    // keys of peers removed through this registry
    retired: Arc<RwLock<HashSet<String>>>,
}

/// Aggregate counts over the current snapshot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerSummary {
    pub total: usize,
    pub protected: usize,
    pub unprotected: usize,
    pub online: usize,
    pub offline: usize,
}

impl PeerRegistry {
    pub fn new(backend: Arc<dyn RegistryBackend>) -> Self {
        Self {
            backend,
            source: StatusSource::Live,
            classifier: None,
            refresh_delay: Duration::from_millis(500),
            peers: Arc::new(RwLock::new(HashMap::new())),
            retired: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Derive `is_online` locally instead of trusting the backend
    pub fn with_classifier(mut self, classifier: ReachabilityClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_source(mut self, source: StatusSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_refresh_delay(mut self, refresh_delay: Duration) -> Self {
        self.refresh_delay = refresh_delay;
        self
    }

    /// Pull the peer list and replace the snapshot. Safe to call repeatedly.
    pub async fn refresh(&self) -> Result<Vec<Peer>> {
        let fetched = self.backend.peer_status(self.source).await?;
        let now = Utc::now();
        let retired = self.retired.read().await;

        let mut peers = HashMap::with_capacity(fetched.len());
        for mut peer in fetched {
            if retired.contains(&peer.pub_key) {
                warn!(
                    "Public key {} belongs to a removed peer, ignoring it",
                    peer.pub_key
                );
                continue;
            }
            if peers.contains_key(&peer.pub_key) {
                warn!("Duplicate public key {} in status, keeping first", peer.pub_key);
                continue;
            }
            if let Some(classifier) = &self.classifier {
                peer.is_online = classifier.is_online(&peer, now);
            }
            peers.insert(peer.pub_key.clone(), peer);
        }
        drop(retired);

        debug!("Peer registry refreshed with {} peers", peers.len());
        let snapshot = Self::sorted(peers.values().cloned().collect());
        *self.peers.write().await = peers;
        Ok(snapshot)
    }

    /// Current snapshot, ordered by name then key
    pub async fn peers(&self) -> Vec<Peer> {
        let peers = self.peers.read().await;
        Self::sorted(peers.values().cloned().collect())
    }

    pub async fn get(&self, pub_key: &str) -> Result<Peer> {
        let peers = self.peers.read().await;
        peers
            .get(pub_key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("peer {}", pub_key)))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Peer> {
        let peers = self.peers.read().await;
        peers
            .values()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("peer named {}", name)))
    }

    pub async fn protection(&self, pub_key: &str) -> Result<Protection> {
        Ok(self.get(pub_key).await?.protection())
    }

    /// Mark a peer not-removable. There is no way back.
    pub async fn set_protected(&self, name: &str) -> Result<()> {
        let peer = self.find_by_name(name).await?;
        if peer.protection() == Protection::Protected {
            debug!("Peer {} already protected", name);
            return Ok(());
        }

        self.backend.set_not_removable(name).await?;
        info!("Peer {} marked not-removable", name);
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Decide how a peer may be removed, based on the snapshot's flag
    pub async fn plan_delete(&self, pub_key: &str) -> Result<DeleteCommand> {
        let peer = self.get(pub_key).await?;
        Ok(DeleteCommand::for_peer(&peer))
    }

    /// Run a planned removal. A gated command only proceeds when
    /// `confirmation` is `Confirmed`; direct commands ignore it.
    pub async fn execute(
        &self,
        command: DeleteCommand,
        confirmation: Confirmation,
    ) -> Result<DeleteOutcome> {
        if command.requires_confirmation() && confirmation == Confirmation::Declined {
            info!("Deletion of protected peer {} declined", command.pub_key());
            return Ok(DeleteOutcome::Declined);
        }

        self.remove(command.pub_key()).await?;
        self.refresh_after_mutation().await;
        Ok(DeleteOutcome::Deleted)
    }

    /// Plan, ask only if the peer is protected, then execute
    pub async fn delete(&self, pub_key: &str, confirm: &dyn Confirm) -> Result<DeleteOutcome> {
        let command = self.plan_delete(pub_key).await?;
        let confirmation = Self::ask(&command, confirm).await;
        self.execute(command, confirmation).await
    }

    /// Delete several peers. Protected ones are confirmed one by one; the
    /// removals then run concurrently and are followed by one delayed refresh.
    pub async fn delete_many(
        &self,
        pub_keys: &[String],
        confirm: &dyn Confirm,
    ) -> Result<BatchReport<String>> {
        let mut report = BatchReport::default();
        let mut approved = Vec::new();

        for pub_key in pub_keys {
            let command = match self.plan_delete(pub_key).await {
                Ok(command) => command,
                Err(e) => {
                    report.failed.push((pub_key.clone(), e));
                    continue;
                }
            };
            match Self::ask(&command, confirm).await {
                Confirmation::Declined if command.requires_confirmation() => {
                    report.declined.push(pub_key.clone());
                }
                _ => approved.push(pub_key.clone()),
            }
        }

        self.remove_all(approved, &mut report).await;
        Ok(report)
    }

    /// Mark several peers not-removable; one delayed refresh at the end
    pub async fn protect_many(&self, names: &[String]) -> Result<BatchReport<String>> {
        let mut report = BatchReport::default();
        let mut pending = Vec::new();

        for name in names {
            match self.find_by_name(name).await {
                Ok(peer) if peer.used => report.succeeded.push(name.clone()),
                Ok(_) => pending.push(name.clone()),
                Err(e) => report.failed.push((name.clone(), e)),
            }
        }

        let results = join_all(pending.iter().map(|name| self.backend.set_not_removable(name))).await;
        for (name, result) in pending.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    info!("Peer {} marked not-removable", name);
                    report.succeeded.push(name);
                }
                Err(e) => {
                    warn!("Failed to protect peer {}: {}", name, e);
                    report.failed.push((name, e));
                }
            }
        }

        tokio::time::sleep(self.refresh_delay).await;
        self.refresh_after_mutation().await;
        Ok(report)
    }

    /// Remove every offline, unprotected peer after one confirmation.
    /// Protected peers are never touched.
    pub async fn sweep_offline(&self, confirm: &dyn Confirm) -> Result<BatchReport<String>> {
        let mut report = BatchReport::default();
        let candidates: Vec<String> = self
            .peers()
            .await
            .into_iter()
            .filter(|p| !p.is_online && !p.used)
            .map(|p| p.pub_key)
            .collect();

        if candidates.is_empty() {
            debug!("No offline unprotected peers to sweep");
            return Ok(report);
        }

        let prompt = ConfirmPrompt {
            title: "Remove offline peers".to_string(),
            message: format!("Remove {} offline peers?", candidates.len()),
        };
        if confirm.confirm(&prompt).await == Confirmation::Declined {
            report.declined = candidates;
            return Ok(report);
        }

        self.remove_all(candidates, &mut report).await;
        Ok(report)
    }

    pub async fn summary(&self) -> PeerSummary {
        let peers = self.peers.read().await;
        let total = peers.len();
        let protected = peers.values().filter(|p| p.used).count();
        let online = peers.values().filter(|p| p.is_online).count();
        PeerSummary {
            total,
            protected,
            unprotected: total - protected,
            online,
            offline: total - online,
        }
    }

    async fn ask(command: &DeleteCommand, confirm: &dyn Confirm) -> Confirmation {
        match command.prompt() {
            Some(prompt) => confirm.confirm(&prompt).await,
            None => Confirmation::Confirmed,
        }
    }

    async fn remove(&self, pub_key: &str) -> Result<()> {
        self.backend.remove_peer(pub_key).await?;
        self.retire(pub_key).await;
        info!("Removed peer {}", pub_key);
        Ok(())
    }

    async fn remove_all(&self, pub_keys: Vec<String>, report: &mut BatchReport<String>) {
        if pub_keys.is_empty() {
            return;
        }

        let results = join_all(pub_keys.iter().map(|key| self.remove(key))).await;
        for (pub_key, result) in pub_keys.into_iter().zip(results) {
            match result {
                Ok(()) => report.succeeded.push(pub_key),
                Err(e) => {
                    warn!("Failed to remove peer {}: {}", pub_key, e);
                    report.failed.push((pub_key, e));
                }
            }
        }

        tokio::time::sleep(self.refresh_delay).await;
        self.refresh_after_mutation().await;
    }

    async fn retire(&self, pub_key: &str) {
        self.retired.write().await.insert(pub_key.to_string());
        self.peers.write().await.remove(pub_key);
    }

    async fn refresh_after_mutation(&self) {
        if let Err(e) = self.refresh().await {
            warn!("Peer refresh after mutation failed: {}", e);
        }
    }

    fn sorted(mut peers: Vec<Peer>) -> Vec<Peer> {
        peers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.pub_key.cmp(&b.pub_key)));
        peers
    }
}
