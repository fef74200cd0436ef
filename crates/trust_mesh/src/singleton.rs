//! Singleton Broadcast Slot
//!
//! Local observable state for categories with at most one live instance
//! (alerts, private notifications). The slot is written only by verified
//! store events; observers read through a `tokio::sync::watch` channel.
//!
//! State machine:
//! - `Empty -> Active(f)` on a verified add
//! - `Active(f) -> Active(f')` on a verified add (last verified write wins)
//! - `Active(f) -> Empty` on a verified remove of `f`
//!
//! A remove for any entry other than the active one is ignored: it targets
//! a superseded fact.

use crate::fact::{Alert, EntryId, PrivateNotification, StoredPayload};
use crate::fact_store::{FactListener, VerifiedEntry};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;
use trustgate_crypto::{PrivilegedKey, PublicKey, SigningError};
use trustgate_identity::FactCategory;

/// A fact kind held in a [`SingletonBroadcast`] slot.
pub trait SingletonFact: Clone + PartialEq + Send + Sync + 'static {
    const CATEGORY: FactCategory;

    fn sign_message(
        message: &str,
        key: &PrivilegedKey,
        owner_public_key: &PublicKey,
    ) -> Result<Self, SigningError>;

    fn message(&self) -> &str;

    fn from_payload(payload: &StoredPayload) -> Option<&Self>;

    fn into_payload(self) -> StoredPayload;
}

impl SingletonFact for Alert {
    const CATEGORY: FactCategory = FactCategory::Alert;

    fn sign_message(
        message: &str,
        key: &PrivilegedKey,
        owner_public_key: &PublicKey,
    ) -> Result<Self, SigningError> {
        Alert::sign(message, key, owner_public_key)
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn from_payload(payload: &StoredPayload) -> Option<&Self> {
        match payload {
            StoredPayload::Alert(alert) => Some(alert),
            _ => None,
        }
    }

    fn into_payload(self) -> StoredPayload {
        StoredPayload::Alert(self)
    }
}

impl SingletonFact for PrivateNotification {
    const CATEGORY: FactCategory = FactCategory::PrivateNotification;

    fn sign_message(
        message: &str,
        key: &PrivilegedKey,
        owner_public_key: &PublicKey,
    ) -> Result<Self, SigningError> {
        PrivateNotification::sign(message, key, owner_public_key)
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn from_payload(payload: &StoredPayload) -> Option<&Self> {
        match payload {
            StoredPayload::PrivateNotification(notice) => Some(notice),
            _ => None,
        }
    }

    fn into_payload(self) -> StoredPayload {
        StoredPayload::PrivateNotification(self)
    }
}

#[derive(Default)]
struct SlotState {
    /// Last verified add observed from the store
    active: Option<EntryId>,
    /// Entry this node published and has not yet retracted
    published: Option<VerifiedEntry>,
    /// Replaced instances whose removal the store has not yet accepted
    pending_retract: Vec<VerifiedEntry>,
}

/// At-most-one live fact of kind `T`.
pub struct SingletonBroadcast<T: SingletonFact> {
    state: Mutex<SlotState>,
    current: watch::Sender<Option<T>>,
}

impl<T: SingletonFact> SingletonBroadcast<T> {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            state: Mutex::new(SlotState::default()),
            current,
        }
    }

    /// The active fact, if any.
    pub fn current(&self) -> Option<T> {
        self.current.borrow().clone()
    }

    /// Observe changes to the active fact.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.current.subscribe()
    }

    /// Entry id of the active fact, if any.
    pub fn active(&self) -> Option<EntryId> {
        self.state.lock().active
    }

    /// Apply a verified add event.
    pub fn accept(&self, verified: &VerifiedEntry) {
        let Some(fact) = T::from_payload(verified.payload()) else {
            return;
        };

        let mut state = self.state.lock();
        state.active = Some(verified.entry_id());
        self.current.send_if_modified(|current| {
            if current.as_ref() == Some(fact) {
                false
            } else {
                *current = Some(fact.clone());
                true
            }
        });
        debug!(category = %T::CATEGORY, entry_id = %verified.entry_id(), "Singleton fact active");
    }

    /// Apply a verified remove event. Returns whether the active fact was
    /// cleared.
    pub fn accept_removal(&self, verified: &VerifiedEntry) -> bool {
        let entry_id = verified.entry_id();
        let mut state = self.state.lock();
        if state.active != Some(entry_id) {
            debug!(category = %T::CATEGORY, %entry_id, "Ignoring removal of superseded fact");
            return false;
        }

        state.active = None;
        self.current.send_replace(None);
        debug!(category = %T::CATEGORY, %entry_id, "Singleton fact cleared");
        true
    }

    /// Record `verified` as this node's published instance, returning the
    /// instance it replaces.
    pub fn replace_published(&self, verified: VerifiedEntry) -> Option<VerifiedEntry> {
        self.state.lock().published.replace(verified)
    }

    /// This node's published instance, if any.
    pub fn published(&self) -> Option<VerifiedEntry> {
        self.state.lock().published.clone()
    }

    /// Queue a replaced instance for another removal attempt.
    pub fn defer_retract(&self, stale: VerifiedEntry) {
        let mut state = self.state.lock();
        if !state
            .pending_retract
            .iter()
            .any(|pending| pending.entry_id() == stale.entry_id())
        {
            state.pending_retract.push(stale);
        }
    }

    pub fn pending_retract_count(&self) -> usize {
        self.state.lock().pending_retract.len()
    }

    /// Take back a queued instance with id `entry_id`, if any.
    pub fn reclaim_pending(&self, entry_id: EntryId) -> Option<VerifiedEntry> {
        let mut state = self.state.lock();
        let index = state
            .pending_retract
            .iter()
            .position(|pending| pending.entry_id() == entry_id)?;
        Some(state.pending_retract.remove(index))
    }

    /// Drain instances still awaiting removal.
    pub fn take_pending_retracts(&self) -> Vec<VerifiedEntry> {
        std::mem::take(&mut self.state.lock().pending_retract)
    }

    /// Forget the published instance if it is still `expected`.
    pub fn take_published(&self, expected: EntryId) -> Option<VerifiedEntry> {
        let mut state = self.state.lock();
        match &state.published {
            Some(published) if published.entry_id() == expected => state.published.take(),
            _ => None,
        }
    }
}

impl<T: SingletonFact> Default for SingletonBroadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SingletonFact> FactListener for SingletonBroadcast<T> {
    fn on_fact_added(&self, fact: &VerifiedEntry) {
        self.accept(fact);
    }

    fn on_fact_removed(&self, fact: &VerifiedEntry) {
        self.accept_removal(fact);
    }
}
