//! Privileged key registry.
//!
//! Resolves which public keys may sign each category of privileged fact on a
//! given network environment. The key lists are compiled-in trust anchors;
//! they are resolved once when the registry is built and never change
//! afterwards. The only runtime switch is the development override, which
//! replaces every list with the single well-known developer key.

use crate::error::{IdentityError, IdentityResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use trustgate_core::{NetworkEnvironment, TrustConfig};
use trustgate_crypto::{PrivilegedKey, PublicKey, SignatureCodec};

/// Well-known developer public key, trusted for every category when the
/// development override is enabled.
pub const DEV_PRIVILEGE_PUB_KEY: &str =
    "027a381b5333a56e1cc3d90d3a7d07f26509adf7029ed06fc997c656621f8da1ee";

/// Private half of [`DEV_PRIVILEGE_PUB_KEY`]. Publicly known by design of
/// development deployments; never trusted unless the override is on.
pub const DEV_PRIVILEGE_PRIV_KEY: &str =
    "6ac43ea1df2a290c1c8391736aa42e4339c5cb4f110ff0257a13b63211977b7a";

const MAINNET_ALERT_KEYS: &[&str] = &[
    "038154884362237c5efceed1b559c340add1c8b527bbd832d2f07f317108e7fc84",
    "023114de0484a55861c53edaca6667ea9f489954bfeaa6c5feb78ac9fdc028ca86",
    "03eb5a83bc55a1e699ae61000bb4db38f69bea13cb82c63b95b93a8c6756faf182",
];

const MAINNET_PRIVATE_NOTIFICATION_KEYS: &[&str] = &[
    "035395cff3857ea49f05650c1d0e8ff5e6f2a9e79b1d167711247a98c620b87292",
    "038fd0f6b42f160f938989256177c8f791cda12bac80ae567be5c44c20c080506a",
    "028f04fa5ea29cc2113628d84c3e66ee0817cdc4fd4d0ef5ba431ebee518c058d6",
];

// Arbitrator registration keys sign both account witnesses and dispute results.
const MAINNET_ARBITRATOR_KEYS: &[&str] = &[
    "02d16b6e8269111bca8fd7715bdf8b95c028d7d6f10fba2fb8796343eceb7b7411",
    "028b8c8fcd86b598fe83e3f23b6a5a8cee6ef47e53387cc26749f26ba286dec086",
    "03f93c8da252aa8c2572ee9ccbbb95f6368758aa609144de5c409704d7102d1e94",
];

/// Category of privileged fact a key may sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    /// Network-wide operator alert
    Alert,
    /// Operator notice to peers
    PrivateNotification,
    /// Arbitrator attestation of an account-age witness
    WitnessSigning,
    /// Arbitrator signature over a dispute outcome
    DisputeResult,
}

impl FactCategory {
    pub const ALL: [FactCategory; 4] = [
        FactCategory::Alert,
        FactCategory::PrivateNotification,
        FactCategory::WitnessSigning,
        FactCategory::DisputeResult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactCategory::Alert => "alert",
            FactCategory::PrivateNotification => "private_notification",
            FactCategory::WitnessSigning => "witness_signing",
            FactCategory::DisputeResult => "dispute_result",
        }
    }
}

impl fmt::Display for FactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactCategory {
    type Err = IdentityError;

    fn from_str(s: &str) -> IdentityResult<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        FactCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| IdentityError::Config(format!("unknown fact category: {s:?}")))
    }
}

/// A public key authorized for one category on one network environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedKey {
    pub public_key: PublicKey,
    pub category: FactCategory,
    pub environment: NetworkEnvironment,
}

/// Compiled-in key list for a category on an environment, without the
/// development override.
pub fn compiled_key_list(
    category: FactCategory,
    environment: NetworkEnvironment,
) -> &'static [&'static str] {
    match environment {
        // No production fact is ever trusted before mainnet.
        NetworkEnvironment::Local | NetworkEnvironment::Stagenet => &[],
        NetworkEnvironment::Mainnet => match category {
            FactCategory::Alert => MAINNET_ALERT_KEYS,
            FactCategory::PrivateNotification => MAINNET_PRIVATE_NOTIFICATION_KEYS,
            FactCategory::WitnessSigning | FactCategory::DisputeResult => MAINNET_ARBITRATOR_KEYS,
        },
    }
}

/// Ordered set of public keys trusted for `category` on `environment`.
pub fn trusted_keys(
    category: FactCategory,
    environment: NetworkEnvironment,
    dev_override: bool,
) -> Vec<PublicKey> {
    let source: &[&str] = if dev_override {
        &[DEV_PRIVILEGE_PUB_KEY]
    } else {
        compiled_key_list(category, environment)
    };

    source
        .iter()
        .filter_map(|hex_key| match PublicKey::from_hex(hex_key) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::error!(%category, key = %hex_key, error = %e, "Skipping malformed trusted key");
                None
            }
        })
        .collect()
}

/// Immutable, process-wide view of the trusted key lists.
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    environment: NetworkEnvironment,
    dev_override: bool,
    trusted: HashMap<FactCategory, Vec<TrustedKey>>,
}

impl KeyRegistry {
    /// Resolve the compiled key lists for `environment`.
    pub fn new(environment: NetworkEnvironment, use_dev_privilege_keys: bool) -> Self {
        let lists = FactCategory::ALL.into_iter().map(|category| {
            (
                category,
                trusted_keys(category, environment, use_dev_privilege_keys),
            )
        });
        Self::from_lists(environment, use_dev_privilege_keys, lists)
    }

    pub fn from_config(config: &TrustConfig) -> Self {
        Self::new(config.network, config.use_dev_privilege_keys)
    }

    /// Resolve from a network name as typed by an operator. Unknown names
    /// are a configuration error.
    pub fn for_network_name(network: &str, use_dev_privilege_keys: bool) -> IdentityResult<Self> {
        let environment: NetworkEnvironment = network.parse()?;
        Ok(Self::new(environment, use_dev_privilege_keys))
    }

    /// Mainnet registry with operator-provided key lists in place of the
    /// compiled ones, for private deployments and simulations.
    ///
    /// Categories missing from `lists` trust nothing. The development
    /// override still replaces every list when enabled.
    pub fn with_mainnet_keys<I>(use_dev_privilege_keys: bool, lists: I) -> Self
    where
        I: IntoIterator<Item = (FactCategory, Vec<PublicKey>)>,
    {
        let environment = NetworkEnvironment::Mainnet;
        if use_dev_privilege_keys {
            return Self::new(environment, true);
        }

        let mut provided: HashMap<FactCategory, Vec<PublicKey>> = lists.into_iter().collect();
        let lists = FactCategory::ALL
            .into_iter()
            .map(|category| (category, provided.remove(&category).unwrap_or_default()));
        Self::from_lists(environment, false, lists)
    }

    fn from_lists<I>(environment: NetworkEnvironment, dev_override: bool, lists: I) -> Self
    where
        I: IntoIterator<Item = (FactCategory, Vec<PublicKey>)>,
    {
        let trusted = lists
            .into_iter()
            .map(|(category, keys)| {
                let mut entries: Vec<TrustedKey> = Vec::with_capacity(keys.len());
                for public_key in keys {
                    if entries.iter().all(|e| e.public_key != public_key) {
                        entries.push(TrustedKey {
                            public_key,
                            category,
                            environment,
                        });
                    }
                }
                (category, entries)
            })
            .collect();

        let registry = Self {
            environment,
            dev_override,
            trusted,
        };
        tracing::info!(
            environment = %registry.environment,
            dev_override = registry.dev_override,
            alert_keys = registry.trusted_keys(FactCategory::Alert).len(),
            arbitrator_keys = registry.trusted_keys(FactCategory::WitnessSigning).len(),
            "Key registry resolved"
        );
        registry
    }

    pub fn environment(&self) -> NetworkEnvironment {
        self.environment
    }

    pub fn dev_override_enabled(&self) -> bool {
        self.dev_override
    }

    /// Trusted keys for `category`, in registry order.
    pub fn trusted_keys(&self, category: FactCategory) -> &[TrustedKey] {
        self.trusted
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `public_key` may sign facts of `category`.
    pub fn is_trusted(&self, category: FactCategory, public_key: &[u8]) -> bool {
        self.trusted_keys(category)
            .iter()
            .any(|k| k.public_key.as_bytes() == public_key)
    }

    /// Parse `private_key_hex` and require its public half to be trusted
    /// for `category`.
    pub fn authorize_signer(
        &self,
        category: FactCategory,
        private_key_hex: &str,
    ) -> IdentityResult<PrivilegedKey> {
        let key = PrivilegedKey::from_hex(private_key_hex)
            .map_err(|e| IdentityError::InvalidKeyFormat(e.to_string()))?;

        if !self.is_trusted(category, key.public_key().as_bytes()) {
            return Err(IdentityError::UntrustedSigner {
                category,
                public_key: key.public_key().to_hex(),
            });
        }
        Ok(key)
    }

    /// Fail-closed variant of [`authorize_signer`](Self::authorize_signer).
    pub fn checked_signer_key(
        &self,
        category: FactCategory,
        private_key_hex: &str,
    ) -> Option<PrivilegedKey> {
        match self.authorize_signer(category, private_key_hex) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(%category, error = %e, "Privileged key refused");
                None
            }
        }
    }

    /// Verify that `signature_base64` is a signature over `payload` by a key
    /// trusted for `category`.
    pub fn verify(
        &self,
        category: FactCategory,
        signer_public_key: &[u8],
        payload: &[u8],
        signature_base64: &str,
    ) -> bool {
        self.is_trusted(category, signer_public_key)
            && SignatureCodec::verify(signer_public_key, payload, signature_base64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiled_keys_are_valid_points() {
        for category in FactCategory::ALL {
            for hex_key in compiled_key_list(category, NetworkEnvironment::Mainnet) {
                let bytes = hex::decode(hex_key).unwrap();
                assert_eq!(bytes.len(), 33, "{category}: {hex_key}");
                assert!(
                    k256::PublicKey::from_sec1_bytes(&bytes).is_ok(),
                    "{category}: {hex_key} is not on secp256k1"
                );
            }
        }
    }

    #[test]
    fn test_mainnet_lists_have_two_to_five_keys() {
        for category in FactCategory::ALL {
            let keys = trusted_keys(category, NetworkEnvironment::Mainnet, false);
            assert!((2..=5).contains(&keys.len()), "{category}: {}", keys.len());
        }
    }

    #[test]
    fn test_pre_mainnet_environments_trust_nothing() {
        for env in [NetworkEnvironment::Local, NetworkEnvironment::Stagenet] {
            let registry = KeyRegistry::new(env, false);
            for category in FactCategory::ALL {
                assert!(registry.trusted_keys(category).is_empty());
                assert!(!registry.is_trusted(
                    category,
                    &hex::decode(MAINNET_ALERT_KEYS[0]).unwrap()
                ));
            }
        }
    }

    #[test]
    fn test_dev_override_replaces_every_list() {
        for env in NetworkEnvironment::ALL {
            let registry = KeyRegistry::new(env, true);
            for category in FactCategory::ALL {
                let keys = registry.trusted_keys(category);
                assert_eq!(keys.len(), 1);
                assert_eq!(keys[0].public_key.to_hex(), DEV_PRIVILEGE_PUB_KEY);
                assert_eq!(keys[0].environment, env);
            }
            assert!(!registry.is_trusted(
                FactCategory::Alert,
                &hex::decode(MAINNET_ALERT_KEYS[0]).unwrap()
            ));
        }
    }

    #[test]
    fn test_unknown_network_name_is_fatal() {
        assert!(matches!(
            KeyRegistry::for_network_name("xmr_testnet", false),
            Err(IdentityError::Core(trustgate_core::CoreError::Configuration(_)))
        ));
        let registry = KeyRegistry::for_network_name("XMR_MAINNET", false).unwrap();
        assert_eq!(registry.environment(), NetworkEnvironment::Mainnet);
    }

    #[test]
    fn test_dev_key_pair_matches() {
        let key = PrivilegedKey::from_hex(DEV_PRIVILEGE_PRIV_KEY).unwrap();
        assert_eq!(key.public_key().to_hex(), DEV_PRIVILEGE_PUB_KEY);
    }

    #[test]
    fn test_mainnet_order_preserved() {
        let registry = KeyRegistry::new(NetworkEnvironment::Mainnet, false);
        let keys: Vec<String> = registry
            .trusted_keys(FactCategory::Alert)
            .iter()
            .map(|k| k.public_key.to_hex())
            .collect();
        assert_eq!(keys, MAINNET_ALERT_KEYS);
    }

    #[test]
    fn test_checked_signer_key() {
        let registry = KeyRegistry::new(NetworkEnvironment::Local, true);

        assert!(registry
            .checked_signer_key(FactCategory::WitnessSigning, DEV_PRIVILEGE_PRIV_KEY)
            .is_some());
        assert!(registry
            .checked_signer_key(FactCategory::WitnessSigning, "not a key")
            .is_none());

        let stranger = PrivilegedKey::generate();
        assert!(registry
            .checked_signer_key(FactCategory::WitnessSigning, &stranger.to_hex())
            .is_none());
    }

    #[test]
    fn test_authorize_signer_reports_reason() {
        let registry = KeyRegistry::new(NetworkEnvironment::Mainnet, false);

        assert!(matches!(
            registry.authorize_signer(FactCategory::Alert, "zz"),
            Err(IdentityError::InvalidKeyFormat(_))
        ));
        assert!(matches!(
            registry.authorize_signer(FactCategory::Alert, DEV_PRIVILEGE_PRIV_KEY),
            Err(IdentityError::UntrustedSigner {
                category: FactCategory::Alert,
                ..
            })
        ));
    }

    #[test]
    fn test_with_mainnet_keys() {
        let operator = PrivilegedKey::generate();
        let registry = KeyRegistry::with_mainnet_keys(
            false,
            [(
                FactCategory::Alert,
                vec![operator.public_key().clone(), operator.public_key().clone()],
            )],
        );

        assert_eq!(registry.trusted_keys(FactCategory::Alert).len(), 1);
        assert!(registry.is_trusted(FactCategory::Alert, operator.public_key().as_bytes()));
        assert!(registry.trusted_keys(FactCategory::DisputeResult).is_empty());
    }

    #[test]
    fn test_verify_requires_membership_and_signature() {
        let operator = PrivilegedKey::generate();
        let outsider = PrivilegedKey::generate();
        let registry = KeyRegistry::with_mainnet_keys(
            false,
            [(FactCategory::Alert, vec![operator.public_key().clone()])],
        );

        let good = SignatureCodec::sign(&operator, b"msg").unwrap();
        let foreign = SignatureCodec::sign(&outsider, b"msg").unwrap();

        assert!(registry.verify(
            FactCategory::Alert,
            operator.public_key().as_bytes(),
            b"msg",
            &good
        ));
        assert!(!registry.verify(
            FactCategory::PrivateNotification,
            operator.public_key().as_bytes(),
            b"msg",
            &good
        ));
        assert!(!registry.verify(
            FactCategory::Alert,
            outsider.public_key().as_bytes(),
            b"msg",
            &foreign
        ));
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(
            "private-notification".parse::<FactCategory>().unwrap(),
            FactCategory::PrivateNotification
        );
        assert_eq!(
            "DISPUTE_RESULT".parse::<FactCategory>().unwrap(),
            FactCategory::DisputeResult
        );
        assert!("witness".parse::<FactCategory>().is_err());
    }
}
