//! Cryptographic primitives for the Trustgate trust layer.
//!
//! This crate provides the signing foundation for privileged facts:
//! canonical payload encoding, secp256k1 message signatures, and operator
//! key parsing.
//!
//! # Security Principles
//!
//! - Never roll custom cryptographic primitives
//! - All privileged facts must be signed
//! - All signatures must be verified before trust
//! - Secrets must never be logged or hardcoded outside test vectors

pub mod keys;
pub mod signing;

#[cfg(test)]
mod test_vectors;

pub use keys::PublicKey;
pub use signing::{PrivilegedKey, SignatureCodec, SigningError, MESSAGE_MAGIC};
