//! # Tip: an escrowed bundle earmarked for an identifier
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐  collect (attested)  ┌───────────┐
//!   │ OPEN ├─────────────────────▶│ COMPLETED │
//!   └──────┘                      └───────────┘
//! ```
//!
//! - **Single-use**: OPEN → COMPLETED is irreversible, prevents double-claim
//! - **Immutable amounts**: nothing but `completed`/`payee` ever changes
//! - **Never deleted**: completed tips remain as historical record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, Asset, PaymentToken, TipId, TipOfferError};

/// A stored tip record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    /// Sequential id, assigned at creation.
    pub id: TipId,
    /// Account that funded the tip.
    pub offerer: Address,
    /// Real-world identity the tip is earmarked for (e.g. a social handle).
    pub identifier: String,
    /// Native currency held for this tip.
    #[serde(with = "crate::amount")]
    pub native_amount: u128,
    /// Token legs, in the order the funder supplied them.
    pub tokens: Vec<PaymentToken>,
    /// `false` at creation, flips to `true` exactly once.
    pub completed: bool,
    /// Account that received the assets; set on completion.
    pub payee: Option<Address>,
    /// When the tip was created.
    pub created_at: DateTime<Utc>,
    /// When the tip was collected.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Tip {
    /// Amount committed to `asset` by this tip (token legs for the same
    /// contract are summed). Returns `None` on overflow.
    #[must_use]
    pub fn committed(&self, asset: &Asset) -> Option<u128> {
        match asset {
            Asset::Native => Some(self.native_amount),
            Asset::Token(token) => self
                .tokens
                .iter()
                .filter(|pt| pt.token == *token)
                .try_fold(0u128, |acc, pt| acc.checked_add(pt.amount)),
        }
    }

    /// Whether this tip can still be collected.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.completed
    }

    /// Mark the tip collected by `payee`.
    ///
    /// # Errors
    /// Returns [`TipOfferError::TipAlreadyCompleted`] if the tip was already
    /// collected; the record is left untouched.
    pub fn mark_completed(&mut self, payee: Address, at: DateTime<Utc>) -> crate::Result<()> {
        if self.completed {
            return Err(TipOfferError::TipAlreadyCompleted(self.id));
        }
        self.completed = true;
        self.payee = Some(payee);
        self.completed_at = Some(at);
        Ok(())
    }

    /// Read-only projection handed to external callers.
    #[must_use]
    pub fn view(&self) -> TipView {
        TipView::from(self)
    }
}

/// External read view of a tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipView {
    pub offerer: Address,
    pub identifier: String,
    pub payee: Option<Address>,
    /// Native amount in the smallest unit.
    #[serde(with = "crate::amount")]
    pub wei_value: u128,
    pub payment_tokens: Vec<TokenAmount>,
    pub completed: bool,
}

/// A `(token, amount)` pair as exposed by [`TipView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token: Address,
    #[serde(with = "crate::amount")]
    pub amount: u128,
}

impl From<&Tip> for TipView {
    fn from(tip: &Tip) -> Self {
        Self {
            offerer: tip.offerer,
            identifier: tip.identifier.clone(),
            payee: tip.payee,
            wei_value: tip.native_amount,
            payment_tokens: tip
                .tokens
                .iter()
                .map(|pt| TokenAmount {
                    token: pt.token,
                    amount: pt.amount,
                })
                .collect(),
            completed: tip.completed,
        }
    }
}

/// Dummy Tip for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Tip {
    /// Create an open tip with random offerer and one random token leg.
    pub fn dummy(id: TipId, identifier: &str, native_amount: u128) -> Self {
        Self {
            id,
            offerer: Address::random(),
            identifier: identifier.to_string(),
            native_amount,
            tokens: vec![PaymentToken::new(
                Address::random(),
                u128::from(rand::random::<u64>()) + 1,
            )],
            completed: false,
            payee: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}
