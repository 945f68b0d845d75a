//! Batched, attestation-gated collection.
//!
//! One `collect_tip` call settles any number of open tips earmarked for the
//! same identifier:
//! 1. Reject empty or oversized batches
//! 2. Verify the attestation once → (identifier, subject)
//! 3. Check every id in input order: exists, open, not repeated, same identifier
//! 4. Aggregate native and per-token amounts
//! 5. Split fees, then pay out through one [`TransferPlan`]
//! 6. Record retained fees and mark every tip completed with `payee = subject`
//!
//! Nothing is written before step 5 succeeds, so any failure leaves tips and
//! balances exactly as they were. A failure in step 6 comes after assets
//! moved and is reported as [`TipOfferError::InconsistentState`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tipoffer_attestation::AttestationVerifier;
use tipoffer_ledger::{AssetBank, LedgerStorage, TransferPlan};
use tipoffer_types::{Address, Asset, LedgerLimits, Result, TipId, TipOfferError};

use crate::fee::{FeeEngine, FeeSplit};

/// Per-token result of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayout {
    pub token: Address,
    #[serde(flatten)]
    pub split: FeeSplit,
}

/// What a successful collection moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectOutcome {
    /// Address the attestation binds the identifier to; received the payout.
    pub subject: Address,
    pub identifier: String,
    pub tip_ids: Vec<TipId>,
    pub native: FeeSplit,
    /// One entry per distinct token, ordered by token address.
    pub tokens: Vec<TokenPayout>,
}

impl CollectOutcome {
    /// Payout received by the subject in `asset`.
    #[must_use]
    pub fn payout(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Native => self.native.payout,
            Asset::Token(token) => self
                .tokens
                .iter()
                .find(|t| t.token == token)
                .map_or(0, |t| t.split.payout),
        }
    }
}

/// Executes collections against storage and a bank.
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    max_tips_per_collect: usize,
}

impl SettlementEngine {
    #[must_use]
    pub fn new(limits: &LedgerLimits) -> Self {
        Self {
            max_tips_per_collect: limits.max_tips_per_collect,
        }
    }

    /// Settle `tip_ids` to the subject of `attestation`.
    ///
    /// `caller` only submits the call; assets always go to the attested
    /// subject.
    ///
    /// # Errors
    /// - `InvalidRequest` for an empty or oversized batch
    /// - `InvalidAttestation` if the attestation does not verify
    /// - `NotYourTip` if any id is unknown, completed, repeated, or
    ///   earmarked for another identifier
    /// - `TransferFailure` if any payout cannot be made
    #[allow(clippy::too_many_arguments)]
    pub fn collect_tip<B: AssetBank + ?Sized>(
        &self,
        storage: &mut LedgerStorage,
        bank: &mut B,
        verifier: &AttestationVerifier,
        caller: Address,
        tip_ids: &[TipId],
        attestation: &[u8],
        now: DateTime<Utc>,
    ) -> Result<CollectOutcome> {
        // 1. Batch shape
        if tip_ids.is_empty() {
            return Err(TipOfferError::InvalidRequest {
                reason: "no tip ids given".into(),
            });
        }
        if tip_ids.len() > self.max_tips_per_collect {
            return Err(TipOfferError::InvalidRequest {
                reason: format!(
                    "{} tip ids, limit is {}",
                    tip_ids.len(),
                    self.max_tips_per_collect
                ),
            });
        }

        // 2. Attestation, exactly once
        let claim = verifier.verify(attestation, storage.issuer(), now)?;

        // 3 + 4. Validate every id before aggregating anything
        let mut seen = BTreeSet::new();
        let mut native_total: u128 = 0;
        let mut token_totals: BTreeMap<Address, u128> = BTreeMap::new();
        for &id in tip_ids {
            let not_yours = |reason: &str| {
                tracing::warn!(
                    tip_id = %id,
                    caller = %caller,
                    identifier = %claim.identifier,
                    reason,
                    "collect rejected"
                );
                TipOfferError::NotYourTip {
                    tip_id: id,
                    reason: reason.to_string(),
                }
            };
            if !seen.insert(id) {
                return Err(not_yours("repeated in batch"));
            }
            let tip = storage.tip(id).ok_or_else(|| not_yours("no such tip"))?;
            if tip.completed {
                return Err(not_yours("already collected"));
            }
            if tip.identifier != claim.identifier {
                return Err(not_yours("earmarked for another identifier"));
            }

            native_total = checked_sum(native_total, tip.native_amount, Asset::Native)?;
            for leg in &tip.tokens {
                let slot = token_totals.entry(leg.token).or_insert(0);
                *slot = checked_sum(*slot, leg.amount, leg.asset())?;
            }
        }

        // 5. Fees and payout
        let fees = FeeEngine::new(storage.fee());
        let native = fees.split(Asset::Native, native_total);
        let tokens: Vec<TokenPayout> = token_totals
            .into_iter()
            .map(|(token, amount)| TokenPayout {
                token,
                split: fees.split(Asset::Token(token), amount),
            })
            .collect();

        // Retained totals must stay representable once the payout is made.
        checked_sum(storage.retained_fee(Asset::Native), native.fee, Asset::Native)?;
        for t in &tokens {
            checked_sum(storage.retained_fee(Asset::Token(t.token)), t.split.fee, Asset::Token(t.token))?;
        }

        let custody = storage.custody();
        let mut plan = TransferPlan::new();
        plan.push(custody, claim.subject, Asset::Native, native.payout);
        for t in &tokens {
            plan.push(custody, claim.subject, Asset::Token(t.token), t.split.payout);
        }
        plan.execute(bank)?;

        // 6. Commit
        Self::commit(storage, claim.subject, tip_ids, &native, &tokens, now)
            .map_err(|err| TipOfferError::after_commit("payout made but ledger not updated", &err))?;

        tracing::info!(
            subject = %claim.subject,
            identifier = %claim.identifier,
            tips = tip_ids.len(),
            native = %native.payout,
            native_fee = %native.fee,
            token_legs = tokens.len(),
            "tips collected"
        );

        Ok(CollectOutcome {
            subject: claim.subject,
            identifier: claim.identifier,
            tip_ids: tip_ids.to_vec(),
            native,
            tokens,
        })
    }

    fn commit(
        storage: &mut LedgerStorage,
        subject: Address,
        tip_ids: &[TipId],
        native: &FeeSplit,
        tokens: &[TokenPayout],
        now: DateTime<Utc>,
    ) -> Result<()> {
        storage.retain_fee(Asset::Native, native.fee)?;
        for t in tokens {
            storage.retain_fee(Asset::Token(t.token), t.split.fee)?;
        }
        for &id in tip_ids {
            storage
                .tip_mut(id)
                .ok_or_else(|| TipOfferError::Internal(format!("{id} vanished during settlement")))?
                .mark_completed(subject, now)?;
        }
        Ok(())
    }
}

fn checked_sum(a: u128, b: u128, asset: Asset) -> Result<u128> {
    a.checked_add(b).ok_or_else(|| TipOfferError::AmountOverflow {
        context: format!("aggregating {asset}"),
    })
}
