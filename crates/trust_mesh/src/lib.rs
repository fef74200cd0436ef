//! Trust Mesh Service
//!
//! This crate authenticates the small set of network-wide privileged facts
//! carried by the replicated broadcast store:
//! - Operator alerts and private notifications (at most one live instance)
//! - Arbitrator attestations of account-age witnesses (append-only)
//! - Arbitrator-signed dispute results (verified on demand)
//!
//! A fact is trusted only when its signer is on the compiled-in allow-list
//! for its category and network environment and its signature verifies.
//! Facts this node publishes pass exactly the same check as facts received
//! from peers.

pub mod broadcast;
pub mod dispute;
pub mod fact;
pub mod fact_store;
pub mod ledger;
pub mod service;
pub mod singleton;
pub mod store;
pub mod witness;

pub use broadcast::{AlertManager, BroadcastManager, PrivateNotificationManager};
pub use dispute::{
    DisputeReason, DisputeResult, DisputeResultVerifier, DisputeSummary, DisputeWinner,
    SignedDisputeResult,
};
pub use fact::{
    storage_policy, Alert, Attestation, EntryId, PrivateNotification, SignedFact, StoragePolicy,
    StoredPayload,
};
pub use fact_store::{FactListener, FactStore, FactStoreStats, Rejection, VerifiedEntry};
pub use ledger::{AttestationLedger, WitnessError, WitnessSignRequest};
pub use service::TrustLayer;
pub use singleton::{SingletonBroadcast, SingletonFact};
pub use store::{
    BroadcastStore, InMemoryBroadcastStore, ProtectedEntry, RemovalRequest, StoreError,
    StoreListener,
};
pub use witness::WitnessSigner;
