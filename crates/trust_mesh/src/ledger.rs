//! Attestation Ledger
//!
//! Append-only record of arbitrator attestations over account-age witness
//! hashes. Keyed by `(hash, signer)`: signing the same hash twice with the
//! same key returns the original attestation instead of creating another.

use crate::fact::{Attestation, StoredPayload};
use crate::fact_store::{FactListener, VerifiedEntry};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use trustgate_crypto::{PublicKey, SigningError};
use trustgate_identity::{FactCategory, IdentityError, KeyRegistry};

/// Witness signing errors
#[derive(Debug, Error)]
pub enum WitnessError {
    #[error("Signing refused: {0}")]
    Refused(#[from] IdentityError),

    #[error("Signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("Malformed sign info: {0}")]
    MalformedSignInfo(String),

    #[error("Witness hash is empty")]
    EmptyHash,
}

/// Operator input `"<witness hash hex>,<owner public key hex>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessSignRequest {
    pub hash: Vec<u8>,
    pub owner_public_key: PublicKey,
}

impl WitnessSignRequest {
    pub fn parse(sign_info: &str) -> Result<Self, WitnessError> {
        let mut parts = sign_info.trim().split(',');
        let (Some(hash_hex), Some(owner_hex), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(WitnessError::MalformedSignInfo(
                "expected \"<hash>,<owner public key>\"".to_string(),
            ));
        };

        let hash = hex::decode(hash_hex.trim())
            .map_err(|e| WitnessError::MalformedSignInfo(format!("witness hash: {e}")))?;
        if hash.is_empty() {
            return Err(WitnessError::EmptyHash);
        }

        let owner_public_key = PublicKey::from_hex(owner_hex.trim())
            .map_err(|e| WitnessError::MalformedSignInfo(format!("owner public key: {e}")))?;
        if owner_public_key.as_bytes().is_empty() {
            return Err(WitnessError::MalformedSignInfo(
                "owner public key is empty".to_string(),
            ));
        }

        Ok(Self {
            hash,
            owner_public_key,
        })
    }
}

/// Append-only, hash-indexed attestation store.
pub struct AttestationLedger {
    registry: Arc<KeyRegistry>,
    by_hash: RwLock<HashMap<Vec<u8>, Vec<Attestation>>>,
}

impl AttestationLedger {
    pub fn new(registry: Arc<KeyRegistry>) -> Self {
        Self {
            registry,
            by_hash: RwLock::new(HashMap::new()),
        }
    }

    /// Sign `hash` with an arbitrator key, or return the attestation that
    /// key already made. The flag is `true` when a new attestation was
    /// created.
    pub fn sign(
        &self,
        hash: &[u8],
        private_key_hex: &str,
        timestamp_ms: u64,
        witness_owner_public_key: Option<PublicKey>,
    ) -> Result<(Attestation, bool), WitnessError> {
        if hash.is_empty() {
            return Err(WitnessError::EmptyHash);
        }
        let key = self
            .registry
            .authorize_signer(FactCategory::WitnessSigning, private_key_hex)?;

        let mut by_hash = self.by_hash.write();
        if let Some(existing) = by_hash.get(hash).and_then(|attestations| {
            attestations
                .iter()
                .find(|a| &a.signer_public_key == key.public_key())
        }) {
            debug!(hash = %hex::encode(hash), "Witness already signed by this key");
            return Ok((existing.clone(), false));
        }

        let attestation =
            Attestation::sign(hash, &key, witness_owner_public_key, timestamp_ms)?;
        by_hash
            .entry(hash.to_vec())
            .or_default()
            .push(attestation.clone());
        info!(
            hash = %hex::encode(hash),
            signer = %key.public_key(),
            "Signed account-age witness"
        );
        Ok((attestation, true))
    }

    /// Verify `attestation` and insert it if absent. Returns whether it was
    /// inserted.
    pub fn insert(&self, attestation: Attestation) -> bool {
        if !attestation.signed_fact().verify_with(&self.registry) {
            warn!(
                hash = %hex::encode(&attestation.hash),
                signer = %attestation.signer_public_key,
                "Rejecting unverified attestation"
            );
            return false;
        }
        self.insert_unchecked(attestation)
    }

    fn insert_unchecked(&self, attestation: Attestation) -> bool {
        let mut by_hash = self.by_hash.write();
        let attestations = by_hash.entry(attestation.hash.clone()).or_default();
        if attestations
            .iter()
            .any(|a| a.signer_public_key == attestation.signer_public_key)
        {
            return false;
        }
        attestations.push(attestation);
        true
    }

    /// Attestation for `hash` by `signer`, if recorded.
    pub fn get(&self, hash: &[u8], signer: &PublicKey) -> Option<Attestation> {
        self.by_hash
            .read()
            .get(hash)?
            .iter()
            .find(|a| &a.signer_public_key == signer)
            .cloned()
    }

    /// Every attestation recorded for `hash`, in insertion order.
    pub fn attestations_for(&self, hash: &[u8]) -> Vec<Attestation> {
        self.by_hash
            .read()
            .get(hash)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_attested(&self, hash: &[u8]) -> bool {
        self.by_hash
            .read()
            .get(hash)
            .is_some_and(|attestations| !attestations.is_empty())
    }

    /// Total number of attestations.
    pub fn len(&self) -> usize {
        self.by_hash.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FactListener for AttestationLedger {
    fn on_fact_added(&self, fact: &VerifiedEntry) {
        if let StoredPayload::SignedWitness(attestation) = fact.payload() {
            if self.insert_unchecked(attestation.clone()) {
                debug!(hash = %hex::encode(&attestation.hash), "Recorded remote attestation");
            }
        }
    }

    // Append-only: removal events never evict.
    fn on_fact_removed(&self, _fact: &VerifiedEntry) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustgate_crypto::PrivilegedKey;

    fn ledger_for(arbitrators: &[&PrivilegedKey]) -> AttestationLedger {
        let keys: Vec<PublicKey> = arbitrators.iter().map(|k| k.public_key().clone()).collect();
        AttestationLedger::new(Arc::new(KeyRegistry::with_mainnet_keys(
            false,
            [(FactCategory::WitnessSigning, keys)],
        )))
    }

    #[test]
    fn test_sign_is_idempotent_per_signer() {
        let arbitrator = PrivilegedKey::generate();
        let ledger = ledger_for(&[&arbitrator]);
        let hash = [0x11u8; 20];

        let (first, created) = ledger.sign(&hash, &arbitrator.to_hex(), 1_000, None).unwrap();
        assert!(created);
        let (second, created) = ledger.sign(&hash, &arbitrator.to_hex(), 2_000, None).unwrap();
        assert!(!created);

        assert_eq!(first, second);
        assert_eq!(second.timestamp_ms, 1_000);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_distinct_signers_accumulate() {
        let a = PrivilegedKey::generate();
        let b = PrivilegedKey::generate();
        let ledger = ledger_for(&[&a, &b]);
        let hash = [0x22u8; 20];

        ledger.sign(&hash, &a.to_hex(), 1, None).unwrap();
        ledger.sign(&hash, &b.to_hex(), 2, None).unwrap();

        assert_eq!(ledger.attestations_for(&hash).len(), 2);
        assert!(ledger.get(&hash, b.public_key()).is_some());
        assert!(ledger.is_attested(&hash));
        assert!(!ledger.is_attested(&[0x33u8; 20]));
    }

    #[test]
    fn test_untrusted_key_refused() {
        let arbitrator = PrivilegedKey::generate();
        let stranger = PrivilegedKey::generate();
        let ledger = ledger_for(&[&arbitrator]);

        assert!(matches!(
            ledger.sign(&[1u8; 20], &stranger.to_hex(), 1, None),
            Err(WitnessError::Refused(IdentityError::UntrustedSigner { .. }))
        ));
        assert!(matches!(
            ledger.sign(&[1u8; 20], "xyz", 1, None),
            Err(WitnessError::Refused(IdentityError::InvalidKeyFormat(_)))
        ));
        assert!(matches!(
            ledger.sign(&[], &arbitrator.to_hex(), 1, None),
            Err(WitnessError::EmptyHash)
        ));
        assert!(ledger.is_empty());
        // Failed attempts leave no empty bucket behind
        assert!(ledger.by_hash.read().is_empty());
        assert!(!ledger.is_attested(&[1u8; 20]));
    }

    #[test]
    fn test_insert_verifies() {
        let arbitrator = PrivilegedKey::generate();
        let stranger = PrivilegedKey::generate();
        let ledger = ledger_for(&[&arbitrator]);
        let hash = [0x44u8; 20];

        let foreign = Attestation::sign(&hash, &stranger, None, 1).unwrap();
        assert!(!ledger.insert(foreign));

        let genuine = Attestation::sign(&hash, &arbitrator, None, 1).unwrap();
        assert!(ledger.insert(genuine.clone()));
        assert!(!ledger.insert(genuine));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_parse_sign_info() {
        let owner = PrivilegedKey::generate();
        let info = format!("{},{}", "ab".repeat(20), owner.public_key().to_hex());
        let request = WitnessSignRequest::parse(&info).unwrap();

        assert_eq!(request.hash, vec![0xABu8; 20]);
        assert_eq!(&request.owner_public_key, owner.public_key());
    }

    #[test]
    fn test_parse_sign_info_rejects_garbage() {
        assert!(matches!(
            WitnessSignRequest::parse("abcd"),
            Err(WitnessError::MalformedSignInfo(_))
        ));
        assert!(matches!(
            WitnessSignRequest::parse("zz,02ab"),
            Err(WitnessError::MalformedSignInfo(_))
        ));
        assert!(matches!(
            WitnessSignRequest::parse(",02ab"),
            Err(WitnessError::EmptyHash)
        ));
        assert!(matches!(
            WitnessSignRequest::parse("abcd,02ab,extra"),
            Err(WitnessError::MalformedSignInfo(_))
        ));
    }
}
