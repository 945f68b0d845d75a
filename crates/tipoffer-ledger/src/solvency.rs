//! Solvency invariant checker.
//!
//! ```text
//! ∀ asset: custody_balance(asset) ≥ Σ open tips' commitment(asset) + retained_fee(asset)
//! ```
//!
//! Escrowed assets only leave custody through settlement, so a violation
//! means the bank and the ledger disagree. Callers treat it as a critical
//! alert rather than a user error.

use std::collections::BTreeMap;

use tipoffer_types::{Asset, Result, TipOfferError};

use crate::bank::AssetBank;
use crate::storage::LedgerStorage;

/// Per-asset comparison of what custody holds against what it owes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetPosition {
    pub asset: Asset,
    pub held: u128,
    /// Committed to open tips.
    pub committed: u128,
    pub retained_fee: u128,
}

impl AssetPosition {
    /// Whether custody covers commitments plus retained fees.
    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.committed
            .checked_add(self.retained_fee)
            .is_some_and(|owed| self.held >= owed)
    }
}

/// Checks custody balances against ledger commitments.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolvencyCheck;

impl SolvencyCheck {
    /// Sum of every open tip's commitment, per asset.
    pub fn outstanding(storage: &LedgerStorage) -> Result<BTreeMap<Asset, u128>> {
        let mut totals: BTreeMap<Asset, u128> = BTreeMap::new();
        for tip in storage.tips().filter(|t| t.is_open()) {
            let legs = std::iter::once((Asset::Native, tip.native_amount))
                .chain(tip.tokens.iter().map(|pt| (pt.asset(), pt.amount)));
            for (asset, amount) in legs {
                let slot = totals.entry(asset).or_insert(0);
                *slot = slot
                    .checked_add(amount)
                    .ok_or_else(|| TipOfferError::AmountOverflow {
                        context: format!("summing outstanding {asset}"),
                    })?;
            }
        }
        Ok(totals)
    }

    /// Positions for every asset that is committed or has retained fees.
    pub fn positions<B: AssetBank + ?Sized>(
        storage: &LedgerStorage,
        bank: &B,
    ) -> Result<Vec<AssetPosition>> {
        let mut committed = Self::outstanding(storage)?;
        for asset in storage.retained_assets() {
            committed.entry(asset).or_insert(0);
        }
        let custody = storage.custody();
        Ok(committed
            .into_iter()
            .map(|(asset, committed)| AssetPosition {
                asset,
                held: bank.balance_of(custody, asset),
                committed,
                retained_fee: storage.retained_fee(asset),
            })
            .collect())
    }

    /// Verify the invariant for every asset.
    ///
    /// # Errors
    /// Returns [`TipOfferError::SolvencyViolation`] naming the first
    /// under-covered asset.
    pub fn verify<B: AssetBank + ?Sized>(storage: &LedgerStorage, bank: &B) -> Result<()> {
        for position in Self::positions(storage, bank)? {
            if !position.is_covered() {
                tracing::error!(
                    asset = %position.asset,
                    held = %position.held,
                    committed = %position.committed,
                    retained = %position.retained_fee,
                    "solvency invariant violated"
                );
                return Err(TipOfferError::SolvencyViolation {
                    reason: format!(
                        "{}: custody holds {}, owes {} to open tips and {} in retained fees",
                        position.asset, position.held, position.committed, position.retained_fee
                    ),
                });
            }
        }
        Ok(())
    }
}
