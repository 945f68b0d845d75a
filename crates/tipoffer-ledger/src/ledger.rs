//! Tip creation and reads.
//!
//! Creation runs in two phases: every input check and every asset pull is
//! validated first, then the pulls execute as one [`TransferPlan`], and only
//! after all assets sit in custody is the tip stored. A failing token pull
//! therefore leaves neither a tip nor a moved balance behind.

use chrono::{DateTime, Utc};
use tipoffer_types::{
    Address, Asset, LedgerLimits, PaymentToken, Result, Tip, TipId, TipOfferError, TipView,
};

use crate::bank::AssetBank;
use crate::storage::LedgerStorage;
use crate::transfer::TransferPlan;

/// A funding instruction: what the caller sends along with `create_tip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipRequest {
    pub identifier: String,
    /// Native value attached to the call.
    pub native_amount: u128,
    /// Token legs pulled from the caller against allowances granted to
    /// custody.
    pub tokens: Vec<PaymentToken>,
}

impl TipRequest {
    #[must_use]
    pub fn new(identifier: impl Into<String>, native_amount: u128) -> Self {
        Self {
            identifier: identifier.into(),
            native_amount,
            tokens: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: Address, amount: u128) -> Self {
        self.tokens.push(PaymentToken::new(token, amount));
        self
    }
}

/// Creates and reads tip records.
#[derive(Debug, Clone)]
pub struct TipLedger {
    limits: LedgerLimits,
}

impl TipLedger {
    #[must_use]
    pub fn new(limits: LedgerLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> &LedgerLimits {
        &self.limits
    }

    /// Pull the request's assets into custody and store a new open tip.
    /// Returns a copy of the stored record.
    ///
    /// # Errors
    /// - `InvalidTip` if the identifier is empty or too long, there are too
    ///   many token legs, or a leg has a zero amount or zero token address
    /// - `TransferFailure` if any asset cannot be pulled; nothing moves
    pub fn create_tip<B: AssetBank + ?Sized>(
        &self,
        storage: &mut LedgerStorage,
        bank: &mut B,
        caller: Address,
        request: TipRequest,
        now: DateTime<Utc>,
    ) -> Result<Tip> {
        self.check_request(&request)?;

        let custody = storage.custody();
        let mut plan = TransferPlan::new();
        plan.push(caller, custody, Asset::Native, request.native_amount);
        for leg in &request.tokens {
            plan.pull(custody, caller, custody, leg.token, leg.amount);
        }
        plan.execute(bank)?;

        let tip = Tip {
            id: storage.next_tip_id(),
            offerer: caller,
            identifier: request.identifier,
            native_amount: request.native_amount,
            tokens: request.tokens,
            completed: false,
            payee: None,
            created_at: now,
            completed_at: None,
        };
        storage
            .insert_tip(tip.clone())
            .map_err(|err| TipOfferError::after_commit("assets escrowed but tip not stored", &err))?;

        tracing::info!(
            tip_id = %tip.id,
            offerer = %caller,
            native = %tip.native_amount,
            token_legs = tip.tokens.len(),
            "tip created"
        );
        Ok(tip)
    }

    fn check_request(&self, request: &TipRequest) -> Result<()> {
        let invalid = |reason: String| TipOfferError::InvalidTip { reason };
        if request.identifier.is_empty() {
            return Err(invalid("identifier must not be empty".into()));
        }
        if request.identifier.len() > self.limits.max_identifier_len {
            return Err(invalid(format!(
                "identifier is {} bytes, limit is {}",
                request.identifier.len(),
                self.limits.max_identifier_len
            )));
        }
        if request.tokens.len() > self.limits.max_tokens_per_tip {
            return Err(invalid(format!(
                "{} token legs, limit is {}",
                request.tokens.len(),
                self.limits.max_tokens_per_tip
            )));
        }
        for (i, leg) in request.tokens.iter().enumerate() {
            if leg.amount == 0 {
                return Err(invalid(format!("token leg {i} has zero amount")));
            }
            if leg.token.is_zero() {
                return Err(invalid(format!("token leg {i} has zero token address")));
            }
        }
        Ok(())
    }

    /// Read view of one tip.
    ///
    /// # Errors
    /// `TipNotFound` if `id` was never assigned.
    pub fn get_tip(&self, storage: &LedgerStorage, id: TipId) -> Result<TipView> {
        storage
            .tip(id)
            .map(Tip::view)
            .ok_or(TipOfferError::TipNotFound(id))
    }

    /// Read views of several tips, in the order given. Fails on the first
    /// unknown id.
    pub fn get_tips(&self, storage: &LedgerStorage, ids: &[TipId]) -> Result<Vec<TipView>> {
        ids.iter().map(|id| self.get_tip(storage, *id)).collect()
    }
}
