//! Asset custody.
//!
//! [`AssetBank`] is the boundary to whatever actually holds balances: native
//! currency and fungible tokens with owner → spender allowances. The escrow
//! only ever moves assets through this trait. [`MemoryBank`] is the
//! in-process implementation used by the engine's tests and by embedders
//! that keep balances in memory.

use std::collections::{BTreeMap, BTreeSet};

use tipoffer_types::{Address, Asset, Result, TipOfferError};

/// Balance holder the escrow pulls from and pays out of.
pub trait AssetBank {
    /// Current balance of `owner` in `asset`.
    fn balance_of(&self, owner: Address, asset: Asset) -> u128;

    /// Remaining amount of `token` that `spender` may pull from `owner`.
    fn allowance(&self, owner: Address, spender: Address, token: Address) -> u128;

    /// Whether `recipient` currently accepts incoming `asset`.
    fn accepts(&self, recipient: Address, asset: Asset) -> bool;

    /// Move `amount` of `asset` from `from` to `to`.
    fn transfer(&mut self, from: Address, to: Address, asset: Asset, amount: u128) -> Result<()>;

    /// Move `amount` of `token` from `owner` to `to`, consuming `spender`'s
    /// allowance.
    fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        token: Address,
        amount: u128,
    ) -> Result<()>;

    /// Give back allowance consumed by a reverted [`Self::transfer_from`].
    fn restore_allowance(&mut self, owner: Address, spender: Address, token: Address, amount: u128);
}

fn transfer_failure(asset: Asset, reason: impl Into<String>) -> TipOfferError {
    TipOfferError::TransferFailure {
        asset: asset.to_string(),
        reason: reason.into(),
    }
}

/// In-memory [`AssetBank`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBank {
    balances: BTreeMap<(Address, Asset), u128>,
    /// `(owner, spender, token)` → remaining allowance.
    allowances: BTreeMap<(Address, Address, Address), u128>,
    /// Recipients refusing a given asset.
    refusing: BTreeSet<(Address, Asset)>,
}

impl MemoryBank {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit native currency out of thin air (genesis / test funding).
    pub fn deposit_native(&mut self, owner: Address, amount: u128) -> Result<()> {
        self.credit(owner, Asset::Native, amount)
    }

    /// Mint `amount` of `token` to `owner`.
    pub fn mint_token(&mut self, token: Address, owner: Address, amount: u128) -> Result<()> {
        self.credit(owner, Asset::Token(token), amount)
    }

    /// Set the allowance `owner` grants `spender` over `token`.
    pub fn approve(&mut self, owner: Address, spender: Address, token: Address, amount: u128) {
        if amount == 0 {
            self.allowances.remove(&(owner, spender, token));
        } else {
            self.allowances.insert((owner, spender, token), amount);
        }
    }

    /// Make `recipient` refuse incoming `asset` until [`Self::accept_incoming`].
    pub fn refuse_incoming(&mut self, recipient: Address, asset: Asset) {
        self.refusing.insert((recipient, asset));
    }

    pub fn accept_incoming(&mut self, recipient: Address, asset: Asset) {
        self.refusing.remove(&(recipient, asset));
    }

    /// Sum of every account's balance in `asset`.
    #[must_use]
    pub fn total_supply(&self, asset: Asset) -> u128 {
        self.balances
            .iter()
            .filter(|((_, a), _)| *a == asset)
            .fold(0u128, |acc, (_, amount)| acc.saturating_add(*amount))
    }

    fn credit(&mut self, owner: Address, asset: Asset, amount: u128) -> Result<()> {
        let entry = self.balances.entry((owner, asset)).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| TipOfferError::AmountOverflow {
                context: format!("crediting {owner} with {asset}"),
            })?;
        Ok(())
    }

    fn debit(&mut self, owner: Address, asset: Asset, amount: u128) -> Result<()> {
        let available = self.balance_of(owner, asset);
        if available < amount {
            return Err(transfer_failure(
                asset,
                format!("insufficient balance: {owner} has {available}, needs {amount}"),
            ));
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(&(owner, asset));
        } else {
            self.balances.insert((owner, asset), remaining);
        }
        Ok(())
    }
}

impl AssetBank for MemoryBank {
    fn balance_of(&self, owner: Address, asset: Asset) -> u128 {
        self.balances.get(&(owner, asset)).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: Address, spender: Address, token: Address) -> u128 {
        self.allowances
            .get(&(owner, spender, token))
            .copied()
            .unwrap_or(0)
    }

    fn accepts(&self, recipient: Address, asset: Asset) -> bool {
        !self.refusing.contains(&(recipient, asset))
    }

    fn transfer(&mut self, from: Address, to: Address, asset: Asset, amount: u128) -> Result<()> {
        if !self.accepts(to, asset) {
            return Err(transfer_failure(asset, format!("{to} refuses incoming transfer")));
        }
        // Credit can only fail on overflow; check it before touching `from`.
        if self.balance_of(to, asset).checked_add(amount).is_none() && from != to {
            return Err(TipOfferError::AmountOverflow {
                context: format!("crediting {to} with {asset}"),
            });
        }
        self.debit(from, asset, amount)?;
        self.credit(to, asset, amount)
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        token: Address,
        amount: u128,
    ) -> Result<()> {
        let asset = Asset::Token(token);
        let allowed = self.allowance(owner, spender, token);
        if allowed < amount {
            return Err(transfer_failure(
                asset,
                format!("insufficient allowance: {spender} may pull {allowed} from {owner}, needs {amount}"),
            ));
        }
        self.transfer(owner, to, asset, amount)?;
        self.approve(owner, spender, token, allowed - amount);
        Ok(())
    }

    fn restore_allowance(&mut self, owner: Address, spender: Address, token: Address, amount: u128) {
        let current = self.allowance(owner, spender, token);
        self.approve(owner, spender, token, current.saturating_add(amount));
    }
}
