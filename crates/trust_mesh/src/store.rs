//! Replicated Broadcast Store Interface
//!
//! The trust layer consumes the network-wide key/value store only through
//! [`BroadcastStore`] and [`StoreListener`]. Entries are stamped with the
//! publishing node's Ed25519 owner key. Removal takes a [`RemovalRequest`]
//! signed by that same key, so observing an entry is not enough to remove
//! it.
//!
//! [`InMemoryBroadcastStore`] is a process-local implementation used by
//! simulations and tests: several nodes can share one instance to observe
//! each other's publications.

use crate::fact::{EntryId, StoredPayload};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};
use trustgate_crypto::PublicKey;
use trustgate_identity::{IdentityProvider, SignatureKeyPair};

/// Domain tag for removal signatures; keeps them distinct from entry stamps.
const REMOVAL_TAG: &[u8] = b"trustgate/remove-entry/v1";

/// Store errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Removal of {0} not signed by the entry owner")]
    Unauthorized(EntryId),
}

/// A payload plus the publisher's provenance stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedEntry {
    pub payload: StoredPayload,
    pub owner_public_key: PublicKey,
    /// Ed25519 signature by `owner_public_key` over the entry id
    #[serde(with = "hex::serde")]
    pub owner_signature: Vec<u8>,
    pub created_at_ms: u64,
}

impl ProtectedEntry {
    /// Wrap `payload` and sign its content id with the local identity.
    pub fn stamp(payload: StoredPayload, identity: &dyn IdentityProvider) -> Self {
        let key_pair = identity.signature_key_pair();
        let entry_id = payload.content_id();
        Self {
            owner_signature: key_pair.sign(entry_id.as_bytes()),
            owner_public_key: key_pair.public_key().clone(),
            payload,
            created_at_ms: now_millis(),
        }
    }

    /// Identity of the entry; derived from the payload only so that add
    /// and remove events for the same fact agree.
    pub fn entry_id(&self) -> EntryId {
        self.payload.content_id()
    }

    /// Owner signature valid, and the owner matches the payload's claimed
    /// publisher when it names one.
    pub fn has_valid_provenance(&self) -> bool {
        if let Some(claimed) = self.payload.owner_public_key() {
            if claimed != &self.owner_public_key {
                return false;
            }
        }
        SignatureKeyPair::verify(
            self.owner_public_key.as_bytes(),
            self.entry_id().as_bytes(),
            &self.owner_signature,
        )
    }
}

/// Owner-signed request to remove one stored entry.
///
/// The signature covers the entry id and the stored `created_at_ms`, so a
/// request cannot be replayed against a later re-publication of the same
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRequest {
    pub entry_id: EntryId,
    pub created_at_ms: u64,
    #[serde(with = "hex::serde")]
    pub owner_signature: Vec<u8>,
}

impl RemovalRequest {
    /// Sign a removal of `entry` with the local identity.
    pub fn sign(entry: &ProtectedEntry, identity: &dyn IdentityProvider) -> Self {
        let entry_id = entry.entry_id();
        let message = removal_message(&entry_id, entry.created_at_ms);
        Self {
            entry_id,
            created_at_ms: entry.created_at_ms,
            owner_signature: identity.signature_key_pair().sign(&message),
        }
    }

    /// Signed by the owner of `stored`, for that exact stored instance.
    pub fn authorizes(&self, stored: &ProtectedEntry) -> bool {
        if stored.entry_id() != self.entry_id || stored.created_at_ms != self.created_at_ms {
            return false;
        }
        SignatureKeyPair::verify(
            stored.owner_public_key.as_bytes(),
            &removal_message(&self.entry_id, self.created_at_ms),
            &self.owner_signature,
        )
    }
}

fn removal_message(entry_id: &EntryId, created_at_ms: u64) -> Vec<u8> {
    let mut message = Vec::with_capacity(REMOVAL_TAG.len() + 40);
    message.extend_from_slice(REMOVAL_TAG);
    message.extend_from_slice(entry_id.as_bytes());
    message.extend_from_slice(&created_at_ms.to_be_bytes());
    message
}

/// Receives batches of entries observed in the replicated store.
pub trait StoreListener: Send + Sync {
    fn on_added(&self, entries: &[ProtectedEntry]);
    fn on_removed(&self, entries: &[ProtectedEntry]);
}

/// Replicated, eventually consistent broadcast store.
pub trait BroadcastStore: Send + Sync {
    /// Add an entry. `Ok(false)` means the entry was already present.
    fn add_entry(&self, entry: ProtectedEntry) -> Result<bool, StoreError>;

    /// Remove the entry named by an owner-signed request. `Ok(false)` means
    /// there was nothing to remove.
    fn remove_entry(&self, request: &RemovalRequest) -> Result<bool, StoreError>;

    /// Register for add/remove notifications.
    fn subscribe(&self, listener: Arc<dyn StoreListener>);
}

/// Process-local broadcast store.
///
/// Listeners are notified synchronously on the calling thread, after the
/// store's own locks are released, so listeners may call back into the
/// store.
pub struct InMemoryBroadcastStore {
    entries: RwLock<HashMap<EntryId, ProtectedEntry>>,
    listeners: RwLock<Vec<Arc<dyn StoreListener>>>,
    available: AtomicBool,
}

impl InMemoryBroadcastStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going offline or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, entry_id: &EntryId) -> bool {
        self.entries.read().contains_key(entry_id)
    }

    pub fn entries(&self) -> Vec<ProtectedEntry> {
        self.entries.read().values().cloned().collect()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("store offline".to_string()))
        }
    }

    fn listeners(&self) -> Vec<Arc<dyn StoreListener>> {
        self.listeners.read().clone()
    }
}

impl Default for InMemoryBroadcastStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastStore for InMemoryBroadcastStore {
    fn add_entry(&self, entry: ProtectedEntry) -> Result<bool, StoreError> {
        self.check_available()?;

        let entry_id = entry.entry_id();
        {
            let mut entries = self.entries.write();
            if entries.contains_key(&entry_id) {
                debug!(%entry_id, "Entry already stored");
                return Ok(false);
            }
            entries.insert(entry_id, entry.clone());
        }

        let batch = [entry];
        for listener in self.listeners() {
            listener.on_added(&batch);
        }
        Ok(true)
    }

    fn remove_entry(&self, request: &RemovalRequest) -> Result<bool, StoreError> {
        self.check_available()?;

        let entry_id = request.entry_id;
        let removed = {
            let mut entries = self.entries.write();
            match entries.get(&entry_id) {
                Some(stored) if !request.authorizes(stored) => {
                    warn!(%entry_id, "Removal not signed by the entry owner");
                    return Err(StoreError::Unauthorized(entry_id));
                }
                Some(_) => entries.remove(&entry_id),
                None => None,
            }
        };

        match removed {
            Some(stored) => {
                let batch = [stored];
                for listener in self.listeners() {
                    listener.on_removed(&batch);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn subscribe(&self, listener: Arc<dyn StoreListener>) {
        self.listeners.write().push(listener.clone());

        // Late subscribers receive the current contents as one add batch.
        let existing = self.entries();
        if !existing.is_empty() {
            listener.on_added(&existing);
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
