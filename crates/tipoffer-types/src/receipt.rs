//! Receipt types for the TipOffer audit trail.
//!
//! Every successful mutating call produces a [`Receipt`] committing to what
//! happened through a SHA-256 hash of a canonical payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Address, ReceiptId, TipId};

/// The type of action this receipt proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptType {
    /// A tip was funded and stored.
    TipCreated,
    /// One or more tips were collected by an attested subject.
    TipsCollected,
    /// The administrator replaced the attestor.
    AttestorRotated,
    /// The administrator replaced the settlement logic.
    LogicUpgraded,
}

impl std::fmt::Display for ReceiptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TipCreated => write!(f, "TIP_CREATED"),
            Self::TipsCollected => write!(f, "TIPS_COLLECTED"),
            Self::AttestorRotated => write!(f, "ATTESTOR_ROTATED"),
            Self::LogicUpgraded => write!(f, "LOGIC_UPGRADED"),
        }
    }
}

/// An append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub receipt_type: ReceiptType,
    /// Tips touched by the action (empty for admin actions).
    pub tip_ids: Vec<TipId>,
    /// Caller of the mutating entry point.
    pub actor: Address,
    /// SHA-256 of the canonical payload.
    pub payload_hash: [u8; 32],
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    /// Build a receipt, hashing `payload` under a type-specific domain tag.
    #[must_use]
    pub fn new(
        receipt_type: ReceiptType,
        tip_ids: Vec<TipId>,
        actor: Address,
        payload: &[u8],
        issued_at: DateTime<Utc>,
    ) -> Self {
        let payload_hash = Self::hash_payload(receipt_type, &tip_ids, actor, payload);
        Self {
            id: ReceiptId::new(),
            receipt_type,
            tip_ids,
            actor,
            payload_hash,
            issued_at,
        }
    }

    /// Recompute the hash and compare it with the stored one.
    #[must_use]
    pub fn verify_payload(&self, payload: &[u8]) -> bool {
        Self::hash_payload(self.receipt_type, &self.tip_ids, self.actor, payload)
            == self.payload_hash
    }

    /// Hex form of the payload hash.
    #[must_use]
    pub fn payload_hash_hex(&self) -> String {
        hex::encode(self.payload_hash)
    }

    fn hash_payload(
        receipt_type: ReceiptType,
        tip_ids: &[TipId],
        actor: Address,
        payload: &[u8],
    ) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"tipoffer:receipt:v1:");
        hasher.update(receipt_type.to_string().as_bytes());
        hasher.update((tip_ids.len() as u64).to_be_bytes());
        for id in tip_ids {
            hasher.update(id.0.to_be_bytes());
        }
        hasher.update(actor.as_bytes());
        hasher.update(payload);
        hasher.finalize().into()
    }
}
