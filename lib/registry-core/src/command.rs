//! Confirmation gating and deletion commands

use crate::RegistryError;
use async_trait::async_trait;
use registry_api::Peer;

/// Operator answer to a confirmation prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub message: String,
}

/// Source of operator confirmations (terminal prompt, dialog, test double)
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> Confirmation;
}

/// Confirms every prompt
pub struct AlwaysConfirm;

#[async_trait]
impl Confirm for AlwaysConfirm {
    async fn confirm(&self, _prompt: &ConfirmPrompt) -> Confirmation {
        Confirmation::Confirmed
    }
}

/// Declines every prompt
pub struct NeverConfirm;

#[async_trait]
impl Confirm for NeverConfirm {
    async fn confirm(&self, _prompt: &ConfirmPrompt) -> Confirmation {
        Confirmation::Declined
    }
}

/// A planned peer removal, carrying everything needed to run it
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteCommand {
    /// Unprotected peer, removed without asking
    Direct { pub_key: String },
    /// Protected peer, removed only after the operator confirms
    NeedsConfirmation { pub_key: String, name: String },
}

impl DeleteCommand {
    pub fn for_peer(peer: &Peer) -> Self {
        if peer.used {
            DeleteCommand::NeedsConfirmation {
                pub_key: peer.pub_key.clone(),
                name: peer.name.clone(),
            }
        } else {
            DeleteCommand::Direct {
                pub_key: peer.pub_key.clone(),
            }
        }
    }

    pub fn pub_key(&self) -> &str {
        match self {
            DeleteCommand::Direct { pub_key } => pub_key,
            DeleteCommand::NeedsConfirmation { pub_key, .. } => pub_key,
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        matches!(self, DeleteCommand::NeedsConfirmation { .. })
    }

    pub fn prompt(&self) -> Option<ConfirmPrompt> {
        match self {
            DeleteCommand::Direct { .. } => None,
            DeleteCommand::NeedsConfirmation { pub_key, name } => Some(ConfirmPrompt {
                title: "Delete peer".to_string(),
                message: format!(
                    "Peer {} ({}) is marked not-removable. Delete it anyway?",
                    pub_key, name
                ),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
}

/// Per-item result of a batch operation. Items fail independently.
#[derive(Debug)]
pub struct BatchReport<K> {
    pub succeeded: Vec<K>,
    pub declined: Vec<K>,
    pub failed: Vec<(K, RegistryError)>,
}

impl<K> Default for BatchReport<K> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            declined: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<K> BatchReport<K> {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.declined.len() + self.failed.len()
    }
}
