//! Dispute Result Verification
//!
//! Dispute outcomes are signed by an arbitrator key and verified on demand.
//! They are never written to the broadcast store.
//!
//! The signed payload is the outcome's summary text, so a signed result can
//! be handed around as plain text:
//!
//! ```text
//! Trade ID: 8f2c...
//! Winner: BUYER
//! ...
//! Summary notes: seller never sent funds
//!
//! Signer: 02d16b6e...
//! Signature: H1x...
//! ```

use crate::fact::SignedFact;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use trustgate_crypto::{PrivilegedKey, PublicKey, SigningError};
use trustgate_identity::{FactCategory, KeyRegistry};

const SIGNER_MARKER: &str = "\n\nSigner: ";
const SIGNATURE_MARKER: &str = "\nSignature: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeWinner {
    Buyer,
    Seller,
}

impl DisputeWinner {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeWinner::Buyer => "BUYER",
            DisputeWinner::Seller => "SELLER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeReason {
    Other,
    Bug,
    Usability,
    Scam,
    ProtocolViolation,
    NoReply,
    BankProblems,
    OptionTrade,
    SellerNotResponding,
    WrongSenderAccount,
    PeerWasLate,
    TradeAlreadyWithdrawn,
}

impl DisputeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeReason::Other => "OTHER",
            DisputeReason::Bug => "BUG",
            DisputeReason::Usability => "USABILITY",
            DisputeReason::Scam => "SCAM",
            DisputeReason::ProtocolViolation => "PROTOCOL_VIOLATION",
            DisputeReason::NoReply => "NO_REPLY",
            DisputeReason::BankProblems => "BANK_PROBLEMS",
            DisputeReason::OptionTrade => "OPTION_TRADE",
            DisputeReason::SellerNotResponding => "SELLER_NOT_RESPONDING",
            DisputeReason::WrongSenderAccount => "WRONG_SENDER_ACCOUNT",
            DisputeReason::PeerWasLate => "PEER_WAS_LATE",
            DisputeReason::TradeAlreadyWithdrawn => "TRADE_ALREADY_WITHDRAWN",
        }
    }
}

impl fmt::Display for DisputeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arbitrated outcome of a trade dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeResult {
    pub trade_id: String,
    pub winner: DisputeWinner,
    pub reason: DisputeReason,
    /// Payouts in atomic units
    pub buyer_payout_atomic: u64,
    pub seller_payout_atomic: u64,
    pub summary_notes: String,
    pub closed_at_ms: u64,
}

impl DisputeResult {
    /// Deterministic text rendering; this is what gets signed.
    pub fn summary_text(&self) -> String {
        format!(
            "Trade ID: {}\nWinner: {}\nReason: {}\nBuyer payout: {}\nSeller payout: {}\nClosed at: {}\nSummary notes: {}",
            self.trade_id,
            self.winner.as_str(),
            self.reason,
            self.buyer_payout_atomic,
            self.seller_payout_atomic,
            self.closed_at_ms,
            self.summary_notes.trim_end(),
        )
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.summary_text().into_bytes()
    }
}

/// A dispute result with its arbitrator signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDisputeResult {
    pub result: DisputeResult,
    pub signature_base64: String,
    pub signer_public_key: PublicKey,
}

impl SignedDisputeResult {
    pub fn sign(result: DisputeResult, key: &PrivilegedKey) -> Result<Self, SigningError> {
        let fact = SignedFact::sign(FactCategory::DisputeResult, result.canonical_bytes(), key)?;
        Ok(Self {
            result,
            signature_base64: fact.signature_base64,
            signer_public_key: fact.signer_public_key,
        })
    }

    pub fn signed_fact(&self) -> SignedFact {
        SignedFact {
            category: FactCategory::DisputeResult,
            payload: self.result.canonical_bytes(),
            signature_base64: self.signature_base64.clone(),
            signer_public_key: self.signer_public_key.clone(),
        }
    }
}

/// Text form of a signed dispute result.
pub struct DisputeSummary;

impl DisputeSummary {
    pub fn render(signed: &SignedDisputeResult) -> String {
        format!(
            "{}{}{}{}{}",
            signed.result.summary_text(),
            SIGNER_MARKER,
            signed.signer_public_key,
            SIGNATURE_MARKER,
            signed.signature_base64
        )
    }

    /// Split summary text into its signed body and trailing signer and
    /// signature lines. `None` when the footer is missing or malformed.
    pub fn parse(text: &str) -> Option<SignedFact> {
        let normalized = text.replace("\r\n", "\n");
        let (body, footer) = normalized.trim_end().rsplit_once(SIGNER_MARKER)?;
        let (signer_hex, signature) = footer.split_once(SIGNATURE_MARKER)?;
        let signer_public_key = PublicKey::from_hex(signer_hex).ok()?;

        Some(SignedFact {
            category: FactCategory::DisputeResult,
            payload: body.as_bytes().to_vec(),
            signature_base64: signature.trim().to_string(),
            signer_public_key,
        })
    }
}

/// On-demand verification of dispute results against the arbitrator keys.
pub struct DisputeResultVerifier {
    registry: Arc<KeyRegistry>,
}

impl DisputeResultVerifier {
    pub fn new(registry: Arc<KeyRegistry>) -> Self {
        Self { registry }
    }

    pub fn verify_fact(&self, fact: &SignedFact) -> bool {
        if fact.category != FactCategory::DisputeResult {
            debug!(category = %fact.category, "Not a dispute result");
            return false;
        }
        fact.verify_with(&self.registry)
    }

    pub fn verify(&self, signed: &SignedDisputeResult) -> bool {
        self.verify_fact(&signed.signed_fact())
    }

    pub fn verify_summary(&self, text: &str) -> bool {
        match DisputeSummary::parse(text) {
            Some(fact) => self.verify_fact(&fact),
            None => {
                debug!("Dispute summary has no signer footer");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> DisputeResult {
        DisputeResult {
            trade_id: "8f2c1d4e".to_string(),
            winner: DisputeWinner::Buyer,
            reason: DisputeReason::SellerNotResponding,
            buyer_payout_atomic: 1_250_000_000_000,
            seller_payout_atomic: 0,
            summary_notes: "Seller stopped responding.\nBuyer refunded.".to_string(),
            closed_at_ms: 1_700_000_000_000,
        }
    }

    fn verifier_for(arbitrator: &PrivilegedKey) -> DisputeResultVerifier {
        DisputeResultVerifier::new(Arc::new(KeyRegistry::with_mainnet_keys(
            false,
            [(
                FactCategory::DisputeResult,
                vec![arbitrator.public_key().clone()],
            )],
        )))
    }

    #[test]
    fn test_summary_text_layout() {
        let text = result().summary_text();
        assert!(text.starts_with("Trade ID: 8f2c1d4e\nWinner: BUYER\n"));
        assert!(text.contains("Reason: SELLER_NOT_RESPONDING\n"));
        assert!(text.ends_with("Buyer refunded."));
    }

    #[test]
    fn test_verify_signed_result() {
        let arbitrator = PrivilegedKey::generate();
        let verifier = verifier_for(&arbitrator);
        let signed = SignedDisputeResult::sign(result(), &arbitrator).unwrap();
        assert!(verifier.verify(&signed));

        let mut tampered = signed.clone();
        tampered.result.buyer_payout_atomic += 1;
        assert!(!verifier.verify(&tampered));
    }

    #[test]
    fn test_untrusted_arbitrator() {
        let arbitrator = PrivilegedKey::generate();
        let impostor = PrivilegedKey::generate();
        let verifier = verifier_for(&arbitrator);
        let signed = SignedDisputeResult::sign(result(), &impostor).unwrap();
        assert!(!verifier.verify(&signed));
    }

    #[test]
    fn test_wrong_category_rejected() {
        let arbitrator = PrivilegedKey::generate();
        let verifier = verifier_for(&arbitrator);
        let mut fact = SignedDisputeResult::sign(result(), &arbitrator)
            .unwrap()
            .signed_fact();
        fact.category = FactCategory::Alert;
        assert!(!verifier.verify_fact(&fact));
    }

    #[test]
    fn test_summary_text_verification() {
        let arbitrator = PrivilegedKey::generate();
        let verifier = verifier_for(&arbitrator);
        let signed = SignedDisputeResult::sign(result(), &arbitrator).unwrap();
        let text = DisputeSummary::render(&signed);

        assert!(verifier.verify_summary(&text));
        assert!(verifier.verify_summary(&format!("{text}\n")));
        assert!(verifier.verify_summary(&text.replace('\n', "\r\n")));

        let edited = text.replace("Winner: BUYER", "Winner: SELLER");
        assert!(!verifier.verify_summary(&edited));
        assert!(!verifier.verify_summary(&result().summary_text()));
    }

    #[test]
    fn test_parse_recovers_payload() {
        let arbitrator = PrivilegedKey::generate();
        let signed = SignedDisputeResult::sign(result(), &arbitrator).unwrap();
        let fact = DisputeSummary::parse(&DisputeSummary::render(&signed)).unwrap();
        assert_eq!(fact, signed.signed_fact());
    }
}
