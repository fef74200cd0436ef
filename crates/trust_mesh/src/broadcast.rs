//! Operator Broadcast Managers
//!
//! Publish and retract singleton facts with a privileged key. Local
//! publications go through the same [`FactStore`] verification as remote
//! ones, so the publisher and every receiver agree on validity.

use crate::fact::{Alert, PrivateNotification};
use crate::fact_store::FactStore;
use crate::singleton::{SingletonBroadcast, SingletonFact};
use crate::store::ProtectedEntry;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use trustgate_identity::IdentityProvider;

/// Manager for network-wide operator alerts.
pub type AlertManager = BroadcastManager<Alert>;

/// Manager for operator private notifications.
pub type PrivateNotificationManager = BroadcastManager<PrivateNotification>;

/// Publishes, retracts and observes one singleton fact kind.
pub struct BroadcastManager<T: SingletonFact> {
    facts: Arc<FactStore>,
    identity: Arc<dyn IdentityProvider>,
    slot: Arc<SingletonBroadcast<T>>,
    // Serializes "store new, retract previous" against concurrent callers.
    publish_lock: Mutex<()>,
}

impl<T: SingletonFact> BroadcastManager<T> {
    pub fn new(facts: Arc<FactStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        let slot: Arc<SingletonBroadcast<T>> = Arc::new(SingletonBroadcast::new());
        facts.subscribe(T::CATEGORY, slot.clone());
        Self {
            facts,
            identity,
            slot,
            publish_lock: Mutex::new(()),
        }
    }

    /// Sign `message` with `private_key_hex` and publish it, replacing this
    /// node's previous instance. Returns `false` when the key is refused,
    /// the fact fails verification, or the store rejects the add.
    pub fn publish(&self, message: &str, private_key_hex: &str) -> bool {
        let category = T::CATEGORY;
        let Some(key) = self
            .facts
            .registry()
            .checked_signer_key(category, private_key_hex)
        else {
            return false;
        };

        let owner = self.identity.signature_key_pair().public_key().clone();
        let fact = match T::sign_message(message, &key, &owner) {
            Ok(fact) => fact,
            Err(e) => {
                warn!(%category, error = %e, "Signing failed");
                return false;
            }
        };

        let entry = ProtectedEntry::stamp(fact.into_payload(), self.identity.as_ref());
        let verified = match self.facts.verify(entry) {
            Ok(verified) => verified,
            Err(rejection) => {
                warn!(%category, %rejection, "Self-published fact failed verification");
                return false;
            }
        };

        let entry_id = verified.entry_id();
        let _guard = self.publish_lock.lock();

        // A queued copy of the same content must go first so the fresh add
        // reaches every node.
        if let Some(stale) = self.slot.reclaim_pending(entry_id) {
            if !self.facts.retract_verified(&stale, self.identity.as_ref()) {
                self.slot.defer_retract(stale);
                return false;
            }
        }
        if !self.facts.publish_verified(&verified) {
            return false;
        }

        match self.slot.published() {
            // Same content already live; keep the stored stamp so removal
            // requests still match it.
            Some(previous) if previous.entry_id() == entry_id => {}
            _ => {
                if let Some(previous) = self.slot.replace_published(verified) {
                    self.slot.defer_retract(previous);
                }
            }
        }
        self.retract_pending();

        info!(
            %category,
            %entry_id,
            signer = %key.public_key(),
            "Published privileged fact"
        );
        true
    }

    /// Retract this node's published instance. Any key trusted for the
    /// category may retract.
    pub fn retract(&self, private_key_hex: &str) -> bool {
        let category = T::CATEGORY;
        if self
            .facts
            .registry()
            .checked_signer_key(category, private_key_hex)
            .is_none()
        {
            return false;
        }

        let _guard = self.publish_lock.lock();
        let stale_cleared = self.retract_pending();
        let Some(published) = self.slot.published() else {
            if stale_cleared.is_none() {
                debug!(%category, "Nothing published to retract");
            }
            return stale_cleared.unwrap_or(false);
        };
        if !self.facts.retract_verified(&published, self.identity.as_ref()) {
            return false;
        }

        let entry_id = published.entry_id();
        self.slot.take_published(entry_id);
        info!(%category, %entry_id, "Retracted privileged fact");
        stale_cleared.unwrap_or(true)
    }

    /// Retry removal of replaced instances. `None` when nothing was pending,
    /// otherwise whether every one was removed. Caller holds `publish_lock`.
    fn retract_pending(&self) -> Option<bool> {
        let pending = self.slot.take_pending_retracts();
        if pending.is_empty() {
            return None;
        }

        let mut all_removed = true;
        for stale in pending {
            let entry_id = stale.entry_id();
            if self.facts.retract_verified(&stale, self.identity.as_ref()) {
                debug!(category = %T::CATEGORY, %entry_id, "Replaced instance retracted");
            } else {
                warn!(category = %T::CATEGORY, %entry_id, "Replaced instance still live; will retry");
                self.slot.defer_retract(stale);
                all_removed = false;
            }
        }
        Some(all_removed)
    }

    /// Replaced instances of this node still awaiting removal.
    pub fn pending_retracts(&self) -> usize {
        self.slot.pending_retract_count()
    }

    /// The active fact in local observable state.
    pub fn current(&self) -> Option<T> {
        self.slot.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.slot.subscribe()
    }

    /// Message of the instance this node published, if still live.
    pub fn published_message(&self) -> Option<String> {
        self.slot.published().and_then(|verified| {
            T::from_payload(verified.payload()).map(|fact| fact.message().to_string())
        })
    }
}
