//! Fee computation.
//!
//! The fee factor is expressed in basis points. For an amount `a` and
//! factor `bps` the fee is `floor(a * bps / 10_000)`, computed without
//! forming the full product so every `u128` amount is accepted.

use serde::{Deserialize, Serialize};
use tipoffer_types::{Asset, FeeConfig, FeePolicy, constants};

/// An amount split into what is paid out and what custody retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeSplit {
    #[serde(with = "tipoffer_types::amount")]
    pub payout: u128,
    #[serde(with = "tipoffer_types::amount")]
    pub fee: u128,
}

impl FeeSplit {
    /// The whole amount paid out, nothing retained.
    #[must_use]
    pub fn untaxed(amount: u128) -> Self {
        Self {
            payout: amount,
            fee: 0,
        }
    }

    #[must_use]
    pub fn total(&self) -> u128 {
        self.payout + self.fee
    }
}

/// Pure fee calculator over a [`FeeConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEngine {
    config: FeeConfig,
}

impl FeeEngine {
    #[must_use]
    pub fn new(config: FeeConfig) -> Self {
        Self { config }
    }

    /// Fee factor in basis points.
    #[must_use]
    pub fn fee_factor(&self) -> u32 {
        self.config.fee_bps.min(constants::MAX_FEE_BPS)
    }

    #[must_use]
    pub fn policy(&self) -> FeePolicy {
        self.config.policy
    }

    /// Split `amount` by the fee factor.
    #[must_use]
    pub fn compute_fee(&self, amount: u128) -> FeeSplit {
        let bps = u128::from(self.fee_factor());
        let denominator = u128::from(constants::BPS_DENOMINATOR);
        let fee = (amount / denominator) * bps + (amount % denominator) * bps / denominator;
        FeeSplit {
            payout: amount - fee,
            fee,
        }
    }

    /// Split `amount` of `asset`, honouring the policy: under
    /// [`FeePolicy::NativeOnly`] token legs are paid out in full.
    #[must_use]
    pub fn split(&self, asset: Asset, amount: u128) -> FeeSplit {
        match (self.config.policy, asset) {
            (FeePolicy::NativeOnly, Asset::Token(_)) => FeeSplit::untaxed(amount),
            _ => self.compute_fee(amount),
        }
    }
}
