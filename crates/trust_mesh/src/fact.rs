//! Privileged Fact Types
//!
//! Every privileged fact reduces to a [`SignedFact`]: the payload bytes that
//! were signed, the base64 signature, and the claimed signer. Receivers never
//! trust a stored signature blob on its own; they re-derive the payload from
//! the fact's fields and verify it against the key registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use trustgate_crypto::{PrivilegedKey, PublicKey, SignatureCodec, SigningError};
use trustgate_identity::{FactCategory, KeyRegistry};

/// How facts of a category are held locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoragePolicy {
    /// At most one live instance, replaced on publish
    Singleton,
    /// Content-addressed, never removed
    AppendOnly,
    /// Not distributed; verified when presented
    OnDemand,
}

/// Storage policy lookup for a fact category.
pub fn storage_policy(category: FactCategory) -> StoragePolicy {
    match category {
        FactCategory::Alert | FactCategory::PrivateNotification => StoragePolicy::Singleton,
        FactCategory::WitnessSigning => StoragePolicy::AppendOnly,
        FactCategory::DisputeResult => StoragePolicy::OnDemand,
    }
}

/// Generic signed envelope shared by all fact kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedFact {
    pub category: FactCategory,
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,
    pub signature_base64: String,
    pub signer_public_key: PublicKey,
}

impl SignedFact {
    pub fn sign(
        category: FactCategory,
        payload: Vec<u8>,
        key: &PrivilegedKey,
    ) -> Result<Self, SigningError> {
        let signature_base64 = SignatureCodec::sign(key, &payload)?;
        Ok(Self {
            category,
            payload,
            signature_base64,
            signer_public_key: key.public_key().clone(),
        })
    }

    /// Signature check alone, without key membership.
    pub fn has_valid_signature(&self) -> bool {
        SignatureCodec::verify(
            self.signer_public_key.as_bytes(),
            &self.payload,
            &self.signature_base64,
        )
    }

    /// Full trust check: signer on the allow-list and signature valid.
    pub fn verify_with(&self, registry: &KeyRegistry) -> bool {
        registry.verify(
            self.category,
            self.signer_public_key.as_bytes(),
            &self.payload,
            &self.signature_base64,
        )
    }
}

/// Operator alert broadcast to every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub message: String,
    pub signature_base64: String,
    /// Privileged key that signed `message`
    pub signer_public_key: PublicKey,
    /// Publisher's general-purpose key
    pub owner_public_key: PublicKey,
}

impl Alert {
    pub fn sign(
        message: &str,
        key: &PrivilegedKey,
        owner_public_key: &PublicKey,
    ) -> Result<Self, SigningError> {
        let fact = SignedFact::sign(FactCategory::Alert, message.as_bytes().to_vec(), key)?;
        Ok(Self {
            message: message.to_string(),
            signature_base64: fact.signature_base64,
            signer_public_key: fact.signer_public_key,
            owner_public_key: owner_public_key.clone(),
        })
    }

    pub fn signed_fact(&self) -> SignedFact {
        SignedFact {
            category: FactCategory::Alert,
            payload: self.message.as_bytes().to_vec(),
            signature_base64: self.signature_base64.clone(),
            signer_public_key: self.signer_public_key.clone(),
        }
    }
}

/// Operator notice; same lifecycle as [`Alert`] in its own slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateNotification {
    pub message: String,
    pub signature_base64: String,
    pub signer_public_key: PublicKey,
    pub owner_public_key: PublicKey,
}

impl PrivateNotification {
    pub fn sign(
        message: &str,
        key: &PrivilegedKey,
        owner_public_key: &PublicKey,
    ) -> Result<Self, SigningError> {
        let fact = SignedFact::sign(
            FactCategory::PrivateNotification,
            message.as_bytes().to_vec(),
            key,
        )?;
        Ok(Self {
            message: message.to_string(),
            signature_base64: fact.signature_base64,
            signer_public_key: fact.signer_public_key,
            owner_public_key: owner_public_key.clone(),
        })
    }

    pub fn signed_fact(&self) -> SignedFact {
        SignedFact {
            category: FactCategory::PrivateNotification,
            payload: self.message.as_bytes().to_vec(),
            signature_base64: self.signature_base64.clone(),
            signer_public_key: self.signer_public_key.clone(),
        }
    }
}

/// Arbitrator attestation over an account-age witness hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    #[serde(with = "hex::serde")]
    pub hash: Vec<u8>,
    pub signature_base64: String,
    pub signer_public_key: PublicKey,
    /// Account owner the witness belongs to, when known
    pub witness_owner_public_key: Option<PublicKey>,
    pub timestamp_ms: u64,
}

impl Attestation {
    pub fn sign(
        hash: &[u8],
        key: &PrivilegedKey,
        witness_owner_public_key: Option<PublicKey>,
        timestamp_ms: u64,
    ) -> Result<Self, SigningError> {
        let fact = SignedFact::sign(FactCategory::WitnessSigning, hash.to_vec(), key)?;
        Ok(Self {
            hash: fact.payload,
            signature_base64: fact.signature_base64,
            signer_public_key: fact.signer_public_key,
            witness_owner_public_key,
            timestamp_ms,
        })
    }

    pub fn signed_fact(&self) -> SignedFact {
        SignedFact {
            category: FactCategory::WitnessSigning,
            payload: self.hash.clone(),
            signature_base64: self.signature_base64.clone(),
            signer_public_key: self.signer_public_key.clone(),
        }
    }
}

/// Content-addressed identity of a stored payload (BLAKE3).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(#[serde(with = "hex::serde")] [u8; 32]);

impl EntryId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", hex::encode(&self.0[..8]))
    }
}

/// Closed set of payloads carried by the replicated store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredPayload {
    Alert(Alert),
    PrivateNotification(PrivateNotification),
    SignedWitness(Attestation),
}

impl StoredPayload {
    pub fn category(&self) -> FactCategory {
        match self {
            StoredPayload::Alert(_) => FactCategory::Alert,
            StoredPayload::PrivateNotification(_) => FactCategory::PrivateNotification,
            StoredPayload::SignedWitness(_) => FactCategory::WitnessSigning,
        }
    }

    /// Re-derive the signed envelope from the payload's own fields.
    pub fn signed_fact(&self) -> SignedFact {
        match self {
            StoredPayload::Alert(alert) => alert.signed_fact(),
            StoredPayload::PrivateNotification(notice) => notice.signed_fact(),
            StoredPayload::SignedWitness(attestation) => attestation.signed_fact(),
        }
    }

    /// General-purpose key the payload claims as its publisher, if any.
    pub fn owner_public_key(&self) -> Option<&PublicKey> {
        match self {
            StoredPayload::Alert(alert) => Some(&alert.owner_public_key),
            StoredPayload::PrivateNotification(notice) => Some(&notice.owner_public_key),
            StoredPayload::SignedWitness(_) => None,
        }
    }

    /// BLAKE3 over a length-prefixed encoding of every field.
    pub fn content_id(&self) -> EntryId {
        let mut hasher = blake3::Hasher::new();
        let mut field = |bytes: &[u8]| {
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };

        field(self.category().as_str().as_bytes());
        match self {
            StoredPayload::Alert(Alert {
                message,
                signature_base64,
                signer_public_key,
                owner_public_key,
            })
            | StoredPayload::PrivateNotification(PrivateNotification {
                message,
                signature_base64,
                signer_public_key,
                owner_public_key,
            }) => {
                field(message.as_bytes());
                field(signature_base64.as_bytes());
                field(signer_public_key.as_bytes());
                field(owner_public_key.as_bytes());
            }
            StoredPayload::SignedWitness(attestation) => {
                field(&attestation.hash);
                field(attestation.signature_base64.as_bytes());
                field(attestation.signer_public_key.as_bytes());
                match &attestation.witness_owner_public_key {
                    Some(owner) => field(owner.as_bytes()),
                    None => field(&[]),
                }
                field(&attestation.timestamp_ms.to_le_bytes());
            }
        }

        EntryId(*hasher.finalize().as_bytes())
    }
}
