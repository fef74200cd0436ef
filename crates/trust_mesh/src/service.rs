//! Trust Layer Service
//!
//! Facade that wires the key registry, fact store, singleton managers,
//! attestation ledger and dispute verifier for one node.

use crate::broadcast::{AlertManager, PrivateNotificationManager};
use crate::dispute::{DisputeResult, DisputeResultVerifier, SignedDisputeResult};
use crate::fact::{Alert, Attestation, PrivateNotification, SignedFact};
use crate::fact_store::{FactStore, FactStoreStats};
use crate::ledger::{AttestationLedger, WitnessError};
use crate::store::BroadcastStore;
use crate::witness::WitnessSigner;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use trustgate_core::TrustConfig;
use trustgate_crypto::PrivilegedKey;
use trustgate_identity::{FactCategory, IdentityProvider, KeyRegistry};

/// Main trust layer service
pub struct TrustLayer {
    config: TrustConfig,
    registry: Arc<KeyRegistry>,
    facts: Arc<FactStore>,
    alerts: AlertManager,
    notifications: PrivateNotificationManager,
    witnesses: WitnessSigner,
    disputes: DisputeResultVerifier,
}

impl TrustLayer {
    /// Resolve the key registry from `config` and start the layer.
    pub fn start(
        config: TrustConfig,
        store: Arc<dyn BroadcastStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let registry = Arc::new(KeyRegistry::from_config(&config));
        Self::with_registry(config, registry, store, identity)
    }

    /// Start with an explicit registry, e.g. one built with
    /// [`KeyRegistry::with_mainnet_keys`].
    pub fn with_registry(
        config: TrustConfig,
        registry: Arc<KeyRegistry>,
        store: Arc<dyn BroadcastStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        if registry.environment() != config.network {
            warn!(
                configured = %config.network,
                registry = %registry.environment(),
                "Registry environment differs from configured network"
            );
        }

        let facts = Arc::new(FactStore::new(registry.clone(), store));
        let alerts = AlertManager::new(facts.clone(), identity.clone());
        let notifications = PrivateNotificationManager::new(facts.clone(), identity.clone());
        let witnesses = WitnessSigner::new(
            Arc::new(AttestationLedger::new(registry.clone())),
            facts.clone(),
            identity,
        );
        let disputes = DisputeResultVerifier::new(registry.clone());

        // Listeners are registered above so the store's snapshot reaches them.
        if config.ignore_privileged_messages {
            info!("Ignoring privileged messages from the network");
        } else {
            facts.attach();
        }

        info!(
            network = %registry.environment(),
            dev_override = registry.dev_override_enabled(),
            ignore_privileged_messages = config.ignore_privileged_messages,
            "Trust layer started"
        );

        Self {
            config,
            registry,
            facts,
            alerts,
            notifications,
            witnesses,
            disputes,
        }
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn fact_stats(&self) -> FactStoreStats {
        self.facts.stats()
    }

    /// Parse a privileged private key and require it to be trusted for
    /// `category`.
    pub fn checked_signer_key(
        &self,
        category: FactCategory,
        private_key_hex: &str,
    ) -> Option<PrivilegedKey> {
        self.registry.checked_signer_key(category, private_key_hex)
    }

    // Alerts

    pub fn publish_alert(&self, message: &str, private_key_hex: &str) -> bool {
        self.alerts.publish(message, private_key_hex)
    }

    pub fn retract_alert(&self, private_key_hex: &str) -> bool {
        self.alerts.retract(private_key_hex)
    }

    pub fn current_alert(&self) -> Option<Alert> {
        self.alerts.current()
    }

    pub fn alert_updates(&self) -> watch::Receiver<Option<Alert>> {
        self.alerts.subscribe()
    }

    // Private notifications

    pub fn publish_private_notification(&self, message: &str, private_key_hex: &str) -> bool {
        self.notifications.publish(message, private_key_hex)
    }

    pub fn retract_private_notification(&self, private_key_hex: &str) -> bool {
        self.notifications.retract(private_key_hex)
    }

    pub fn current_private_notification(&self) -> Option<PrivateNotification> {
        self.notifications.current()
    }

    pub fn private_notification_updates(&self) -> watch::Receiver<Option<PrivateNotification>> {
        self.notifications.subscribe()
    }

    // Account-age witnesses

    pub fn sign_witness(
        &self,
        hash: &[u8],
        private_key_hex: &str,
        timestamp_ms: u64,
    ) -> Result<Attestation, WitnessError> {
        self.witnesses.sign_witness(hash, private_key_hex, timestamp_ms)
    }

    pub fn sign_witness_request(
        &self,
        sign_info: &str,
        private_key_hex: &str,
        timestamp_ms: u64,
    ) -> Result<Attestation, WitnessError> {
        self.witnesses
            .sign_witness_request(sign_info, private_key_hex, timestamp_ms)
    }

    pub fn witness_attestations(&self, hash: &[u8]) -> Vec<Attestation> {
        self.witnesses.ledger().attestations_for(hash)
    }

    pub fn is_witness_attested(&self, hash: &[u8]) -> bool {
        self.witnesses.ledger().is_attested(hash)
    }

    // Dispute results

    /// Sign `result` with an arbitrator key. `None` if the key is refused.
    pub fn sign_dispute_result(
        &self,
        result: DisputeResult,
        private_key_hex: &str,
    ) -> Option<SignedDisputeResult> {
        let key = self.checked_signer_key(FactCategory::DisputeResult, private_key_hex)?;
        match SignedDisputeResult::sign(result, &key) {
            Ok(signed) => Some(signed),
            Err(e) => {
                warn!(error = %e, "Dispute result signing failed");
                None
            }
        }
    }

    pub fn verify_dispute_result(&self, fact: &SignedFact) -> bool {
        self.disputes.verify_fact(fact)
    }

    pub fn verify_signed_dispute_result(&self, signed: &SignedDisputeResult) -> bool {
        self.disputes.verify(signed)
    }

    pub fn verify_dispute_summary(&self, text: &str) -> bool {
        self.disputes.verify_summary(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBroadcastStore;
    use trustgate_core::NetworkEnvironment;
    use trustgate_identity::{KeyRing, DEV_PRIVILEGE_PRIV_KEY};

    fn dev_config(network: NetworkEnvironment) -> TrustConfig {
        TrustConfig {
            network,
            use_dev_privilege_keys: true,
            ..TrustConfig::default_config()
        }
    }

    #[test]
    fn test_dev_layer_round_trip() {
        let layer = TrustLayer::start(
            dev_config(NetworkEnvironment::Local),
            Arc::new(InMemoryBroadcastStore::new()),
            Arc::new(KeyRing::generate()),
        );

        assert!(layer.publish_alert("hello", DEV_PRIVILEGE_PRIV_KEY));
        assert_eq!(layer.current_alert().unwrap().message, "hello");
        assert!(layer.publish_private_notification("notice", DEV_PRIVILEGE_PRIV_KEY));
        assert_eq!(
            layer.current_private_notification().unwrap().message,
            "notice"
        );

        let attestation = layer
            .sign_witness(&[9u8; 20], DEV_PRIVILEGE_PRIV_KEY, 1)
            .unwrap();
        assert_eq!(layer.witness_attestations(&[9u8; 20]), vec![attestation]);
        assert!(layer.fact_stats().accepted >= 3);
    }

    #[test]
    fn test_ignore_privileged_messages() {
        let store = Arc::new(InMemoryBroadcastStore::new());
        let publisher = TrustLayer::start(
            dev_config(NetworkEnvironment::Local),
            store.clone(),
            Arc::new(KeyRing::generate()),
        );
        let deaf = TrustLayer::start(
            TrustConfig {
                ignore_privileged_messages: true,
                ..dev_config(NetworkEnvironment::Local)
            },
            store.clone(),
            Arc::new(KeyRing::generate()),
        );

        assert!(publisher.publish_alert("hello", DEV_PRIVILEGE_PRIV_KEY));
        assert!(publisher.current_alert().is_some());
        assert!(deaf.current_alert().is_none());
    }

    #[test]
    fn test_late_node_sees_existing_alert() {
        let store = Arc::new(InMemoryBroadcastStore::new());
        let publisher = TrustLayer::start(
            dev_config(NetworkEnvironment::Stagenet),
            store.clone(),
            Arc::new(KeyRing::generate()),
        );
        assert!(publisher.publish_alert("hello", DEV_PRIVILEGE_PRIV_KEY));

        let late = TrustLayer::start(
            dev_config(NetworkEnvironment::Stagenet),
            store,
            Arc::new(KeyRing::generate()),
        );
        assert_eq!(late.current_alert().unwrap().message, "hello");
    }

    #[test]
    fn test_dispute_sign_and_verify() {
        let layer = TrustLayer::start(
            dev_config(NetworkEnvironment::Mainnet),
            Arc::new(InMemoryBroadcastStore::new()),
            Arc::new(KeyRing::generate()),
        );
        let result = DisputeResult {
            trade_id: "t-1".to_string(),
            winner: crate::dispute::DisputeWinner::Seller,
            reason: crate::dispute::DisputeReason::Other,
            buyer_payout_atomic: 0,
            seller_payout_atomic: 10,
            summary_notes: String::new(),
            closed_at_ms: 5,
        };

        let signed = layer
            .sign_dispute_result(result.clone(), DEV_PRIVILEGE_PRIV_KEY)
            .unwrap();
        assert!(layer.verify_signed_dispute_result(&signed));
        assert!(layer.verify_dispute_result(&signed.signed_fact()));
        assert!(layer
            .sign_dispute_result(result, &PrivilegedKey::generate().to_hex())
            .is_none());
    }
}
