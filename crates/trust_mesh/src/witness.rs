//! Account-age witness signing.
//!
//! Arbitrators attest witness hashes with their registered key. New
//! attestations are recorded in the local [`AttestationLedger`] and then
//! distributed through the [`FactStore`]; a distribution failure does not
//! undo the local record.

use crate::fact::{Attestation, StoredPayload};
use crate::fact_store::FactStore;
use crate::ledger::{AttestationLedger, WitnessError, WitnessSignRequest};
use crate::store::ProtectedEntry;
use std::sync::Arc;
use tracing::warn;
use trustgate_crypto::PublicKey;
use trustgate_identity::{FactCategory, IdentityProvider};

pub struct WitnessSigner {
    ledger: Arc<AttestationLedger>,
    facts: Arc<FactStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl WitnessSigner {
    /// Wire `ledger` to receive verified attestations from the store.
    pub fn new(
        ledger: Arc<AttestationLedger>,
        facts: Arc<FactStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        facts.subscribe(FactCategory::WitnessSigning, ledger.clone());
        Self {
            ledger,
            facts,
            identity,
        }
    }

    pub fn ledger(&self) -> &AttestationLedger {
        &self.ledger
    }

    /// Attest `hash`. Signing again with the same key returns the first
    /// attestation unchanged.
    pub fn sign_witness(
        &self,
        hash: &[u8],
        private_key_hex: &str,
        timestamp_ms: u64,
    ) -> Result<Attestation, WitnessError> {
        self.sign_and_distribute(hash, private_key_hex, timestamp_ms, None)
    }

    /// Attest the witness named by an operator sign-info string.
    pub fn sign_witness_request(
        &self,
        sign_info: &str,
        private_key_hex: &str,
        timestamp_ms: u64,
    ) -> Result<Attestation, WitnessError> {
        let request = WitnessSignRequest::parse(sign_info)?;
        self.sign_and_distribute(
            &request.hash,
            private_key_hex,
            timestamp_ms,
            Some(request.owner_public_key),
        )
    }

    fn sign_and_distribute(
        &self,
        hash: &[u8],
        private_key_hex: &str,
        timestamp_ms: u64,
        owner: Option<PublicKey>,
    ) -> Result<Attestation, WitnessError> {
        let (attestation, created) =
            self.ledger
                .sign(hash, private_key_hex, timestamp_ms, owner)?;

        if created {
            let entry = ProtectedEntry::stamp(
                StoredPayload::SignedWitness(attestation.clone()),
                self.identity.as_ref(),
            );
            if !self.facts.publish(entry) {
                warn!(hash = %hex::encode(hash), "Attestation recorded locally but not distributed");
            }
        }
        Ok(attestation)
    }
}
