//! Two-phase asset movement.
//!
//! A [`TransferPlan`] collects every leg a call needs, checks all of them
//! against the bank up front ([`TransferPlan::validate`]), and only then
//! moves anything ([`TransferPlan::execute`]). If a leg still fails during
//! execution, the legs already applied are reverted in reverse order so the
//! bank ends where it started. A revert that itself fails is reported as
//! [`TipOfferError::InconsistentState`].

use std::collections::BTreeMap;

use tipoffer_types::{Address, Asset, Result, TipOfferError};

use crate::bank::AssetBank;

/// How a leg moves its asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegKind {
    /// `from` sends directly (native value attached to a call, custody payouts).
    Push,
    /// `spender` pulls from `from` against a pre-authorised allowance.
    Pull { spender: Address },
}

/// One asset movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLeg {
    pub kind: LegKind,
    pub from: Address,
    pub to: Address,
    pub asset: Asset,
    pub amount: u128,
}

/// An ordered set of legs that either all happen or none do.
#[derive(Debug, Clone, Default)]
pub struct TransferPlan {
    legs: Vec<TransferLeg>,
}

impl TransferPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a direct transfer. Zero amounts are dropped.
    pub fn push(&mut self, from: Address, to: Address, asset: Asset, amount: u128) {
        if amount > 0 {
            self.legs.push(TransferLeg {
                kind: LegKind::Push,
                from,
                to,
                asset,
                amount,
            });
        }
    }

    /// Add an allowance-based pull of `token` from `owner` by `spender`.
    /// Zero amounts are dropped.
    pub fn pull(&mut self, spender: Address, owner: Address, to: Address, token: Address, amount: u128) {
        if amount > 0 {
            self.legs.push(TransferLeg {
                kind: LegKind::Pull { spender },
                from: owner,
                to,
                asset: Asset::Token(token),
                amount,
            });
        }
    }

    #[must_use]
    pub fn legs(&self) -> &[TransferLeg] {
        &self.legs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Check every leg against current bank state without moving anything.
    ///
    /// Debits, credits and allowance draws are summed per account before
    /// comparing, so two legs that each fit alone but not together are
    /// caught here. Credits are checked against the recipient's balance
    /// without netting debits, which bounds every intermediate balance.
    pub fn validate<B: AssetBank + ?Sized>(&self, bank: &B) -> Result<()> {
        let mut debits: BTreeMap<(Address, Asset), u128> = BTreeMap::new();
        let mut credits: BTreeMap<(Address, Asset), u128> = BTreeMap::new();
        let mut draws: BTreeMap<(Address, Address, Address), u128> = BTreeMap::new();

        for leg in &self.legs {
            if !bank.accepts(leg.to, leg.asset) {
                return Err(TipOfferError::TransferFailure {
                    asset: leg.asset.to_string(),
                    reason: format!("{} refuses incoming transfer", leg.to),
                });
            }
            add(&mut debits, (leg.from, leg.asset), leg.amount)?;
            add(&mut credits, (leg.to, leg.asset), leg.amount)?;
            if let (LegKind::Pull { spender }, Asset::Token(token)) = (leg.kind, leg.asset) {
                add(&mut draws, (leg.from, spender, token), leg.amount)?;
            }
        }

        for ((owner, asset), needed) in debits {
            let available = bank.balance_of(owner, asset);
            if available < needed {
                return Err(TipOfferError::TransferFailure {
                    asset: asset.to_string(),
                    reason: format!("insufficient balance: {owner} has {available}, needs {needed}"),
                });
            }
        }
        for ((recipient, asset), incoming) in credits {
            let held = bank.balance_of(recipient, asset);
            if held.checked_add(incoming).is_none() {
                return Err(TipOfferError::TransferFailure {
                    asset: asset.to_string(),
                    reason: format!(
                        "crediting {incoming} would overflow {recipient}'s balance of {held}"
                    ),
                });
            }
        }
        for ((owner, spender, token), needed) in draws {
            let allowed = bank.allowance(owner, spender, token);
            if allowed < needed {
                return Err(TipOfferError::TransferFailure {
                    asset: Asset::Token(token).to_string(),
                    reason: format!(
                        "insufficient allowance: {spender} may pull {allowed} from {owner}, needs {needed}"
                    ),
                });
            }
        }
        Ok(())
    }

    /// Validate, then apply every leg in order. On a mid-way failure the
    /// applied legs are reverted and the original error is returned.
    ///
    /// # Errors
    /// `InconsistentState` if the revert fails; earlier legs then stay
    /// applied.
    pub fn execute<B: AssetBank + ?Sized>(&self, bank: &mut B) -> Result<()> {
        self.validate(bank)?;
        for (applied, leg) in self.legs.iter().enumerate() {
            if let Err(err) = apply(bank, leg) {
                tracing::warn!(
                    asset = %leg.asset,
                    from = %leg.from,
                    to = %leg.to,
                    error = %err,
                    "transfer leg failed, reverting {applied} applied legs"
                );
                self.revert(bank, applied)?;
                return Err(err);
            }
        }
        Ok(())
    }

    fn revert<B: AssetBank + ?Sized>(&self, bank: &mut B, applied: usize) -> Result<()> {
        for leg in self.legs[..applied].iter().rev() {
            let undone = bank.transfer(leg.to, leg.from, leg.asset, leg.amount);
            if let Err(err) = undone {
                tracing::error!(
                    asset = %leg.asset,
                    from = %leg.to,
                    to = %leg.from,
                    error = %err,
                    "failed to revert transfer leg"
                );
                return Err(TipOfferError::InconsistentState {
                    reason: format!(
                        "revert of {} {} from {} to {} failed: {err}",
                        leg.amount, leg.asset, leg.to, leg.from
                    ),
                });
            }
            if let (LegKind::Pull { spender }, Asset::Token(token)) = (leg.kind, leg.asset) {
                bank.restore_allowance(leg.from, spender, token, leg.amount);
            }
        }
        Ok(())
    }
}

fn apply<B: AssetBank + ?Sized>(bank: &mut B, leg: &TransferLeg) -> Result<()> {
    match (leg.kind, leg.asset) {
        (LegKind::Pull { spender }, Asset::Token(token)) => {
            bank.transfer_from(spender, leg.from, leg.to, token, leg.amount)
        }
        (LegKind::Pull { .. }, Asset::Native) => Err(TipOfferError::Internal(
            "native currency cannot be pulled by allowance".into(),
        )),
        (LegKind::Push, asset) => bank.transfer(leg.from, leg.to, asset, leg.amount),
    }
}

fn add<K: Ord>(totals: &mut BTreeMap<K, u128>, key: K, amount: u128) -> Result<()> {
    let slot = totals.entry(key).or_insert(0);
    *slot = slot
        .checked_add(amount)
        .ok_or_else(|| TipOfferError::AmountOverflow {
            context: "summing transfer legs".into(),
        })?;
    Ok(())
}
