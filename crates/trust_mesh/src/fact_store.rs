//! Verified Fact Store
//!
//! Gatekeeper between the replicated [`BroadcastStore`] and the local
//! consumers of privileged facts. Every entry, local or remote, passes the
//! same check before anyone sees it:
//!
//! 1. the publisher's owner stamp is valid
//! 2. the embedded signer is trusted for the payload's category
//! 3. the privileged signature verifies over the re-derived payload
//!
//! Entries that fail are dropped with a warning and never dispatched.

use crate::fact::{EntryId, StoredPayload};
use crate::store::{BroadcastStore, ProtectedEntry, RemovalRequest, StoreListener};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use trustgate_identity::{FactCategory, IdentityProvider, KeyRegistry};

/// Reason an entry was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Invalid owner provenance on entry {0}")]
    InvalidProvenance(EntryId),

    #[error("Signer {signer} is not trusted for {category}")]
    UntrustedSigner {
        category: FactCategory,
        signer: String,
    },

    #[error("Signature verification failed for {category}")]
    VerificationFailure { category: FactCategory },
}

/// An entry that passed verification. Only [`FactStore`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedEntry {
    entry: ProtectedEntry,
}

impl VerifiedEntry {
    pub fn entry(&self) -> &ProtectedEntry {
        &self.entry
    }

    pub fn payload(&self) -> &StoredPayload {
        &self.entry.payload
    }

    pub fn entry_id(&self) -> EntryId {
        self.entry.entry_id()
    }

    pub fn category(&self) -> FactCategory {
        self.entry.payload.category()
    }

    pub fn into_entry(self) -> ProtectedEntry {
        self.entry
    }
}

/// Consumer of verified facts for one category.
pub trait FactListener: Send + Sync {
    fn on_fact_added(&self, fact: &VerifiedEntry);
    fn on_fact_removed(&self, fact: &VerifiedEntry);
}

/// Verification counters
#[derive(Debug, Default)]
pub struct FactStoreMetrics {
    pub accepted: AtomicU64,
    pub rejected: AtomicU64,
    pub publish_failures: AtomicU64,
}

/// Point-in-time copy of [`FactStoreMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FactStoreStats {
    pub accepted: u64,
    pub rejected: u64,
    pub publish_failures: u64,
}

/// Verifying facade over a [`BroadcastStore`].
pub struct FactStore {
    registry: Arc<KeyRegistry>,
    store: Arc<dyn BroadcastStore>,
    listeners: RwLock<HashMap<FactCategory, Vec<Arc<dyn FactListener>>>>,
    metrics: FactStoreMetrics,
}

impl FactStore {
    pub fn new(registry: Arc<KeyRegistry>, store: Arc<dyn BroadcastStore>) -> Self {
        Self {
            registry,
            store,
            listeners: RwLock::new(HashMap::new()),
            metrics: FactStoreMetrics::default(),
        }
    }

    /// Start receiving entries from the underlying store.
    pub fn attach(self: &Arc<Self>) {
        let listener: Arc<dyn StoreListener> = self.clone();
        self.store.subscribe(listener);
        debug!("Fact store attached to broadcast store");
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Register a consumer for `category`.
    pub fn subscribe(&self, category: FactCategory, listener: Arc<dyn FactListener>) {
        self.listeners
            .write()
            .entry(category)
            .or_default()
            .push(listener);
    }

    /// Run the full trust check on `entry`.
    pub fn verify(&self, entry: ProtectedEntry) -> Result<VerifiedEntry, Rejection> {
        if !entry.has_valid_provenance() {
            return Err(Rejection::InvalidProvenance(entry.entry_id()));
        }

        let fact = entry.payload.signed_fact();
        if !self
            .registry
            .is_trusted(fact.category, fact.signer_public_key.as_bytes())
        {
            return Err(Rejection::UntrustedSigner {
                category: fact.category,
                signer: fact.signer_public_key.to_hex(),
            });
        }
        if !fact.verify_with(&self.registry) {
            return Err(Rejection::VerificationFailure {
                category: fact.category,
            });
        }

        Ok(VerifiedEntry { entry })
    }

    /// Verify and add `entry`. Returns whether the store accepted it.
    pub fn publish(&self, entry: ProtectedEntry) -> bool {
        match self.verify(entry) {
            Ok(verified) => self.publish_verified(&verified),
            Err(rejection) => {
                self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(%rejection, "Refusing to publish unverified entry");
                false
            }
        }
    }

    /// Add an already verified entry. A duplicate counts as success.
    pub fn publish_verified(&self, verified: &VerifiedEntry) -> bool {
        match self.store.add_entry(verified.entry.clone()) {
            Ok(added) => {
                if !added {
                    debug!(entry_id = %verified.entry_id(), "Entry already present");
                }
                true
            }
            Err(e) => {
                self.metrics.publish_failures.fetch_add(1, Ordering::Relaxed);
                warn!(entry_id = %verified.entry_id(), error = %e, "Broadcast store add failed");
                false
            }
        }
    }

    /// Verify and remove `entry`, signing the removal as `owner`.
    pub fn retract(&self, entry: ProtectedEntry, owner: &dyn IdentityProvider) -> bool {
        match self.verify(entry) {
            Ok(verified) => self.retract_verified(&verified, owner),
            Err(rejection) => {
                self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(%rejection, "Refusing to retract unverified entry");
                false
            }
        }
    }

    /// Remove an already verified entry. Removing an absent entry counts as
    /// success; the store refuses unless `owner` stamped the entry.
    pub fn retract_verified(
        &self,
        verified: &VerifiedEntry,
        owner: &dyn IdentityProvider,
    ) -> bool {
        let request = RemovalRequest::sign(&verified.entry, owner);
        match self.store.remove_entry(&request) {
            Ok(_) => true,
            Err(e) => {
                self.metrics.publish_failures.fetch_add(1, Ordering::Relaxed);
                warn!(entry_id = %verified.entry_id(), error = %e, "Broadcast store remove failed");
                false
            }
        }
    }

    pub fn stats(&self) -> FactStoreStats {
        FactStoreStats {
            accepted: self.metrics.accepted.load(Ordering::Relaxed),
            rejected: self.metrics.rejected.load(Ordering::Relaxed),
            publish_failures: self.metrics.publish_failures.load(Ordering::Relaxed),
        }
    }

    fn listeners_for(&self, category: FactCategory) -> Vec<Arc<dyn FactListener>> {
        self.listeners
            .read()
            .get(&category)
            .cloned()
            .unwrap_or_default()
    }

    fn dispatch(&self, entries: &[ProtectedEntry], removed: bool) {
        for entry in entries {
            let verified = match self.verify(entry.clone()) {
                Ok(verified) => verified,
                Err(rejection) => {
                    self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(%rejection, removed, "Dropping entry from broadcast store");
                    continue;
                }
            };
            self.metrics.accepted.fetch_add(1, Ordering::Relaxed);

            let category = verified.category();
            info!(%category, entry_id = %verified.entry_id(), removed, "Verified privileged fact");
            for listener in self.listeners_for(category) {
                if removed {
                    listener.on_fact_removed(&verified);
                } else {
                    listener.on_fact_added(&verified);
                }
            }
        }
    }
}

impl StoreListener for FactStore {
    fn on_added(&self, entries: &[ProtectedEntry]) {
        self.dispatch(entries, false);
    }

    fn on_removed(&self, entries: &[ProtectedEntry]) {
        self.dispatch(entries, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::Alert;
    use crate::store::InMemoryBroadcastStore;
    use parking_lot::Mutex;
    use trustgate_crypto::PrivilegedKey;
    use trustgate_identity::KeyRing;

    #[derive(Default)]
    struct Collector {
        added: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
    }

    impl FactListener for Collector {
        fn on_fact_added(&self, fact: &VerifiedEntry) {
            if let StoredPayload::Alert(alert) = fact.payload() {
                self.added.lock().push(alert.message.clone());
            }
        }

        fn on_fact_removed(&self, fact: &VerifiedEntry) {
            if let StoredPayload::Alert(alert) = fact.payload() {
                self.removed.lock().push(alert.message.clone());
            }
        }
    }

    struct Fixture {
        operator: PrivilegedKey,
        ring: KeyRing,
        store: Arc<InMemoryBroadcastStore>,
        facts: Arc<FactStore>,
        collector: Arc<Collector>,
    }

    fn fixture() -> Fixture {
        let operator = PrivilegedKey::generate();
        let registry = Arc::new(KeyRegistry::with_mainnet_keys(
            false,
            [(FactCategory::Alert, vec![operator.public_key().clone()])],
        ));
        let store = Arc::new(InMemoryBroadcastStore::new());
        let facts = Arc::new(FactStore::new(registry, store.clone()));
        facts.attach();

        let collector = Arc::new(Collector::default());
        facts.subscribe(FactCategory::Alert, collector.clone());

        Fixture {
            operator,
            ring: KeyRing::generate(),
            store,
            facts,
            collector,
        }
    }

    fn entry(f: &Fixture, key: &PrivilegedKey, message: &str) -> ProtectedEntry {
        let owner = f.ring.signature_key_pair().public_key().clone();
        let alert = Alert::sign(message, key, &owner).unwrap();
        ProtectedEntry::stamp(StoredPayload::Alert(alert), &f.ring)
    }

    #[test]
    fn test_trusted_entry_dispatched() {
        let f = fixture();
        assert!(f.facts.publish(entry(&f, &f.operator, "maintenance")));
        assert_eq!(f.collector.added.lock().as_slice(), ["maintenance"]);
        assert_eq!(f.facts.stats().accepted, 1);
    }

    #[test]
    fn test_untrusted_signer_refused_locally() {
        let f = fixture();
        let outsider = PrivilegedKey::generate();
        let e = entry(&f, &outsider, "spoof");

        assert!(matches!(
            f.facts.verify(e.clone()),
            Err(Rejection::UntrustedSigner { .. })
        ));
        assert!(!f.facts.publish(e));
        assert!(f.store.is_empty());
    }

    #[test]
    fn test_remote_untrusted_entry_dropped() {
        let f = fixture();
        let outsider = PrivilegedKey::generate();

        // Written straight to the store, bypassing local verification.
        f.store.add_entry(entry(&f, &outsider, "spoof")).unwrap();

        assert!(f.collector.added.lock().is_empty());
        assert_eq!(f.facts.stats().rejected, 1);
    }

    #[test]
    fn test_forged_signature_dropped() {
        let f = fixture();
        let owner = f.ring.signature_key_pair().public_key().clone();
        let mut alert = Alert::sign("real", &f.operator, &owner).unwrap();
        alert.message = "forged".to_string();
        let e = ProtectedEntry::stamp(StoredPayload::Alert(alert), &f.ring);

        assert!(matches!(
            f.facts.verify(e.clone()),
            Err(Rejection::VerificationFailure { .. })
        ));
        f.store.add_entry(e).unwrap();
        assert!(f.collector.added.lock().is_empty());
    }

    #[test]
    fn test_broken_provenance_dropped() {
        let f = fixture();
        let mut e = entry(&f, &f.operator, "maintenance");
        e.owner_signature[0] ^= 0xFF;

        assert!(matches!(
            f.facts.verify(e),
            Err(Rejection::InvalidProvenance(_))
        ));
    }

    #[test]
    fn test_retract_dispatches_removal() {
        let f = fixture();
        let e = entry(&f, &f.operator, "maintenance");
        assert!(f.facts.publish(e.clone()));
        assert!(f.facts.retract(e, &f.ring));
        assert_eq!(f.collector.removed.lock().as_slice(), ["maintenance"]);
    }

    #[test]
    fn test_retract_by_non_owner_refused() {
        let f = fixture();
        let e = entry(&f, &f.operator, "maintenance");
        assert!(f.facts.publish(e.clone()));

        let peer = KeyRing::generate();
        assert!(!f.facts.retract(e.clone(), &peer));
        assert!(f.store.contains(&e.entry_id()));
        assert!(f.collector.removed.lock().is_empty());
        assert_eq!(f.facts.stats().publish_failures, 1);
    }

    #[test]
    fn test_duplicate_publish_is_success() {
        let f = fixture();
        let e = entry(&f, &f.operator, "maintenance");
        assert!(f.facts.publish(e.clone()));
        assert!(f.facts.publish(e));
        assert_eq!(f.collector.added.lock().len(), 1);
    }

    #[test]
    fn test_store_failure_reports_false() {
        let f = fixture();
        f.store.set_available(false);
        assert!(!f.facts.publish(entry(&f, &f.operator, "maintenance")));
        assert_eq!(f.facts.stats().publish_failures, 1);
    }
}
