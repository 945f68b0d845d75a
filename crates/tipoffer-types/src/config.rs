//! Configuration types for a TipOffer deployment.

use serde::{Deserialize, Serialize};

use crate::{Address, Result, TipOfferError, constants};

/// Who administers the escrow and which attestor it currently trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// Administrator: the only caller allowed to rotate the attestor.
    pub admin: Address,
    /// Address of the issuer key whose attestations are accepted.
    pub attestor: Address,
}

impl IssuerConfig {
    /// Both roles must name a real account.
    pub fn validate(&self) -> Result<()> {
        if self.admin.is_zero() {
            return Err(TipOfferError::Configuration(
                "admin address must not be zero".into(),
            ));
        }
        if self.attestor.is_zero() {
            return Err(TipOfferError::Configuration(
                "attestor address must not be zero".into(),
            ));
        }
        Ok(())
    }
}

/// Which settlement legs the fee factor applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePolicy {
    /// Fee is deducted from the aggregated native amount only.
    #[default]
    NativeOnly,
    /// Fee is deducted from the native amount and every token leg.
    AllLegs,
}

impl std::fmt::Display for FeePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NativeOnly => write!(f, "NATIVE_ONLY"),
            Self::AllLegs => write!(f, "ALL_LEGS"),
        }
    }
}

/// Fee factor plus the legs it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Fee factor in basis points (1/10 000).
    pub fee_bps: u32,
    #[serde(default)]
    pub policy: FeePolicy,
}

impl FeeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fee_bps > constants::MAX_FEE_BPS {
            return Err(TipOfferError::Configuration(format!(
                "fee_bps {} exceeds maximum {}",
                self.fee_bps,
                constants::MAX_FEE_BPS
            )));
        }
        Ok(())
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            fee_bps: constants::DEFAULT_FEE_BPS,
            policy: FeePolicy::default(),
        }
    }
}

/// Input limits applied by the ledger and the settlement engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLimits {
    pub max_identifier_len: usize,
    pub max_tokens_per_tip: usize,
    pub max_tips_per_collect: usize,
}

impl Default for LedgerLimits {
    fn default() -> Self {
        Self {
            max_identifier_len: constants::DEFAULT_MAX_IDENTIFIER_LEN,
            max_tokens_per_tip: constants::DEFAULT_MAX_TOKENS_PER_TIP,
            max_tips_per_collect: constants::DEFAULT_MAX_TIPS_PER_COLLECT,
        }
    }
}

/// Everything needed to initialise a TipOffer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipOfferConfig {
    /// Account that holds escrowed assets (the contract's own address).
    pub custody: Address,
    /// Administrator and initial attestor.
    pub issuer: IssuerConfig,
    #[serde(default)]
    pub fee: FeeConfig,
    #[serde(default)]
    pub limits: LedgerLimits,
}

impl TipOfferConfig {
    /// Config with default fee and limits.
    #[must_use]
    pub fn new(custody: Address, admin: Address, attestor: Address) -> Self {
        Self {
            custody,
            issuer: IssuerConfig { admin, attestor },
            fee: FeeConfig::default(),
            limits: LedgerLimits::default(),
        }
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TipOfferError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.fee.validate()?;
        if self.custody.is_zero() {
            return Err(TipOfferError::Configuration(
                "custody address must not be zero".into(),
            ));
        }
        self.issuer.validate()?;
        let limits = &self.limits;
        if limits.max_identifier_len == 0
            || limits.max_tokens_per_tip == 0
            || limits.max_tips_per_collect == 0
        {
            return Err(TipOfferError::Configuration(
                "ledger limits must be non-zero".into(),
            ));
        }
        if limits.max_identifier_len > usize::from(u16::MAX) {
            return Err(TipOfferError::Configuration(format!(
                "max_identifier_len {} does not fit an attestation",
                limits.max_identifier_len
            )));
        }
        Ok(())
    }
}
