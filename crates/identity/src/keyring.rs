//! Local signature key ring.
//!
//! Every node holds a general-purpose Ed25519 key pair that stamps
//! provenance on the store entries it publishes. It is unrelated to the
//! privileged secp256k1 keys: owning it grants no trust.

use crate::error::{IdentityError, IdentityResult};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use trustgate_crypto::PublicKey;
use zeroize::Zeroize;

/// Identity collaborator consumed by the trust layer.
pub trait IdentityProvider: Send + Sync {
    /// The local node's general-purpose signature key pair.
    fn signature_key_pair(&self) -> &SignatureKeyPair;
}

/// Ed25519 key pair used for entry provenance.
pub struct SignatureKeyPair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl SignatureKeyPair {
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut secret_key_bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret_key_bytes);
        let pair = Self::from_signing_key(SigningKey::from_bytes(&secret_key_bytes));
        secret_key_bytes.zeroize();
        pair
    }

    /// Restore a key pair from persisted secret bytes.
    pub fn from_secret_bytes(key_bytes: &[u8]) -> IdentityResult<Self> {
        if key_bytes.len() != 32 {
            return Err(IdentityError::InvalidKeyFormat(format!(
                "Invalid key length: {} (expected 32)",
                key_bytes.len()
            )));
        }

        let mut key_array = [0u8; 32];
        key_array.copy_from_slice(key_bytes);
        let pair = Self::from_signing_key(SigningKey::from_bytes(&key_array));
        key_array.zeroize();
        Ok(pair)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey::from_bytes(signing_key.verifying_key().to_bytes().to_vec());
        Self {
            signing_key,
            public_key,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    /// Verify an owner signature; malformed keys or signatures yield `false`.
    pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        let Ok(public_key) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(message, &signature).is_ok()
    }
}

/// In-process key ring holding the local signature key pair.
pub struct KeyRing {
    signature_key_pair: SignatureKeyPair,
}

impl KeyRing {
    pub fn new(signature_key_pair: SignatureKeyPair) -> Self {
        Self { signature_key_pair }
    }

    pub fn generate() -> Self {
        Self::new(SignatureKeyPair::generate())
    }
}

impl IdentityProvider for KeyRing {
    fn signature_key_pair(&self) -> &SignatureKeyPair {
        &self.signature_key_pair
    }
}
