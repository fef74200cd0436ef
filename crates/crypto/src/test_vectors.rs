//! Test vectors for deterministic signing verification.
//!
//! These vectors pin the message framing and key derivation so that
//! signatures stay interoperable with wallet message-signing tools across
//! builds. Each vector contains:
//! - A fixed payload
//! - Its canonical hex text
//! - The expected double SHA-256 digest of the framed message

use crate::signing::{PrivilegedKey, SignatureCodec};

/// Publicly known development key pair.
///
/// ⚠️ WARNING: DO NOT USE IN PRODUCTION ⚠️
///
/// This key only ever signs for development deployments and local testing.
const DEV_PRIVATE_KEY_HEX: &str =
    "6ac43ea1df2a290c1c8391736aa42e4339c5cb4f110ff0257a13b63211977b7a";
const DEV_PUBLIC_KEY_HEX: &str =
    "027a381b5333a56e1cc3d90d3a7d07f26509adf7029ed06fc997c656621f8da1ee";

struct DigestVector {
    name: &'static str,
    payload: &'static [u8],
    canonical: &'static str,
    digest_hex: &'static str,
}

fn digest_vectors() -> Vec<DigestVector> {
    vec![
        DigestVector {
            name: "vector_1_hello",
            payload: b"Hello",
            canonical: "48656c6c6f",
            digest_hex: "46bea33370e5e3bd883b6169c70ffb96cb556b8e89929cc8b6476403ab931170",
        },
        DigestVector {
            name: "vector_2_maintenance_alert",
            payload: b"System maintenance at 20:00 UTC",
            canonical: "53797374656d206d61696e74656e616e63652061742032303a303020555443",
            digest_hex: "45e73187c85f9ba77d1815d8d7501ea31a787dcd999e542bf74d28c308deb89e",
        },
    ]
}

#[test]
fn test_digest_vectors() {
    for vector in digest_vectors() {
        let canonical = SignatureCodec::canonicalize(vector.payload);
        assert_eq!(canonical, vector.canonical, "{}: canonical text", vector.name);

        let digest = SignatureCodec::message_digest(&canonical);
        assert_eq!(
            hex::encode(digest),
            vector.digest_hex,
            "{}: digest",
            vector.name
        );
    }
}

#[test]
fn test_dev_key_derivation() {
    let key = PrivilegedKey::from_hex(DEV_PRIVATE_KEY_HEX).unwrap();
    assert_eq!(key.public_key().to_hex(), DEV_PUBLIC_KEY_HEX);
    assert_eq!(key.to_hex().as_str(), DEV_PRIVATE_KEY_HEX);
}

#[test]
fn test_dev_key_signs_vectors() {
    let key = PrivilegedKey::from_hex(DEV_PRIVATE_KEY_HEX).unwrap();
    let public_key = hex::decode(DEV_PUBLIC_KEY_HEX).unwrap();

    for vector in digest_vectors() {
        let signature = SignatureCodec::sign(&key, vector.payload).unwrap();
        let again = SignatureCodec::sign(&key, vector.payload).unwrap();
        assert_eq!(signature, again, "{}: deterministic", vector.name);
        assert!(
            SignatureCodec::verify(&public_key, vector.payload, &signature),
            "{}: verifies",
            vector.name
        );
    }
}

#[test]
fn test_uppercase_key_input_accepted() {
    let lower = PrivilegedKey::from_hex(DEV_PRIVATE_KEY_HEX).unwrap();
    let upper = PrivilegedKey::from_hex(&DEV_PRIVATE_KEY_HEX.to_uppercase()).unwrap();
    assert_eq!(lower.public_key(), upper.public_key());
}
