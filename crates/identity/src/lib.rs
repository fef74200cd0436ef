//! Identity and key authorization for the Trustgate trust layer.
//!
//! This crate decides *who* may sign privileged facts and gives the local
//! node its own general-purpose identity.
//!
//! # Core Concepts
//!
//! - **Key Registry**: compiled-in allow-lists of privileged public keys per
//!   fact category and network environment, with a development override
//! - **Key Ring**: the local Ed25519 signature key pair used to stamp
//!   provenance on published store entries
//!
//! # Security Model
//!
//! - Trust anchors are constants; nothing at runtime can add a key
//! - Unknown or malformed operator keys are refused, never partially used
//! - Pre-mainnet environments trust no production key

pub mod error;
pub mod keyring;
pub mod registry;

pub use error::{IdentityError, IdentityResult};
pub use keyring::{IdentityProvider, KeyRing, SignatureKeyPair};
pub use registry::{
    compiled_key_list, trusted_keys, FactCategory, KeyRegistry, TrustedKey,
    DEV_PRIVILEGE_PRIV_KEY, DEV_PRIVILEGE_PUB_KEY,
};
