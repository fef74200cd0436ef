//! Privileged Message Signing
//!
//! Signs and verifies privileged facts with secp256k1 keys using the
//! wallet-compatible "signed message" format:
//!
//! - The payload is canonicalized as its lower-case hex encoding
//! - The canonical text is length-prefixed behind a fixed magic string and
//!   hashed with double SHA-256
//! - Signatures are 65 byte compact recoverable signatures, base64 encoded
//!
//! # Security Model
//!
//! - Verification never panics and never returns an error; malformed keys or
//!   signatures simply fail to verify
//! - Private keys supplied by operators are parsed fail-closed
//! - Decoded secret bytes are zeroized after use

use base64::{engine::general_purpose, Engine as _};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::keys::PublicKey;

/// Magic prefix of the signed-message format.
pub const MESSAGE_MAGIC: &str = "Bitcoin Signed Message:\n";

/// Length of a compact recoverable signature (header + r + s).
pub const COMPACT_SIGNATURE_LEN: usize = 65;

/// Header byte offset for recoverable signatures over compressed keys.
const COMPRESSED_HEADER_BASE: u8 = 27 + 4;

/// Length of a secp256k1 secret scalar.
const SECRET_KEY_LEN: usize = 32;

/// Errors that can occur during signing operations.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Invalid key format: {reason}")]
    InvalidKeyFormat { reason: String },

    #[error("Cryptographic error: {reason}")]
    CryptoError { reason: String },
}

/// A privileged secp256k1 signing key, parsed from operator input.
pub struct PrivilegedKey {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl PrivilegedKey {
    /// Parse a hex encoded private key.
    ///
    /// Leading zero bytes are tolerated; the remaining scalar must fit in 32
    /// bytes and be a valid non-zero secp256k1 scalar.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, SigningError> {
        let trimmed = private_key_hex.trim();
        if trimmed.is_empty() {
            return Err(SigningError::InvalidKeyFormat {
                reason: "empty private key".to_string(),
            });
        }

        let decoded = Zeroizing::new(hex::decode(trimmed).map_err(|e| {
            SigningError::InvalidKeyFormat {
                reason: format!("not hex: {e}"),
            }
        })?);

        let significant = match decoded.iter().position(|b| *b != 0) {
            Some(start) => &decoded[start..],
            None => {
                return Err(SigningError::InvalidKeyFormat {
                    reason: "zero scalar".to_string(),
                })
            }
        };

        if significant.len() > SECRET_KEY_LEN {
            return Err(SigningError::InvalidKeyFormat {
                reason: format!(
                    "key too long: {} bytes (expected at most {})",
                    significant.len(),
                    SECRET_KEY_LEN
                ),
            });
        }

        let mut padded = Zeroizing::new([0u8; SECRET_KEY_LEN]);
        padded[SECRET_KEY_LEN - significant.len()..].copy_from_slice(significant);

        let signing_key =
            SigningKey::from_slice(&padded[..]).map_err(|_| SigningError::InvalidKeyFormat {
                reason: "scalar out of range".to_string(),
            })?;

        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey::from_bytes(
            signing_key
                .verifying_key()
                .to_encoded_point(true)
                .as_bytes()
                .to_vec(),
        );
        Self {
            signing_key,
            public_key,
        }
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Compressed SEC1 public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Hex encoding of the secret scalar, for handing keys to operators.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.signing_key.to_bytes()))
    }
}

impl fmt::Debug for PrivilegedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivilegedKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Deterministic canonicalization plus sign/verify over privileged keys.
pub struct SignatureCodec;

impl SignatureCodec {
    /// Canonical text form of a payload: lower-case hex of its bytes.
    pub fn canonicalize(payload: &[u8]) -> String {
        hex::encode(payload)
    }

    /// Double SHA-256 digest of the magic-prefixed message.
    pub fn message_digest(message: &str) -> [u8; 32] {
        let mut framed = Vec::with_capacity(MESSAGE_MAGIC.len() + message.len() + 10);
        write_compact_size(&mut framed, MESSAGE_MAGIC.len() as u64);
        framed.extend_from_slice(MESSAGE_MAGIC.as_bytes());
        write_compact_size(&mut framed, message.len() as u64);
        framed.extend_from_slice(message.as_bytes());

        let first = Sha256::digest(&framed);
        Sha256::digest(first).into()
    }

    /// Sign the canonical form of `payload`, returning a base64 signature.
    pub fn sign(key: &PrivilegedKey, payload: &[u8]) -> Result<String, SigningError> {
        let digest = Self::message_digest(&Self::canonicalize(payload));
        let (signature, recovery_id) = key
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| SigningError::CryptoError {
                reason: e.to_string(),
            })?;

        let mut compact = Vec::with_capacity(COMPACT_SIGNATURE_LEN);
        compact.push(COMPRESSED_HEADER_BASE + recovery_id.to_byte());
        compact.extend_from_slice(&signature.to_bytes());

        Ok(general_purpose::STANDARD.encode(compact))
    }

    /// Verify a base64 signature over the canonical form of `payload`.
    ///
    /// Returns `false` for any malformed key or signature.
    pub fn verify(public_key: &[u8], payload: &[u8], signature_base64: &str) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(public_key) else {
            return false;
        };

        let Ok(compact) = general_purpose::STANDARD.decode(signature_base64.trim()) else {
            return false;
        };

        if compact.len() != COMPACT_SIGNATURE_LEN || !(27..=34).contains(&compact[0]) {
            return false;
        }

        let Ok(signature) = Signature::from_slice(&compact[1..]) else {
            return false;
        };
        // Wallets are not required to emit low-S signatures
        let signature = signature.normalize_s().unwrap_or(signature);

        let digest = Self::message_digest(&Self::canonicalize(payload));
        verifying_key.verify_prehash(&digest, &signature).is_ok()
    }

    /// Parse an operator supplied private key, failing closed.
    pub fn parse_private_key(private_key_hex: &str) -> Option<PrivilegedKey> {
        match PrivilegedKey::from_hex(private_key_hex) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected privileged key input");
                None
            }
        }
    }
}

fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}
