//! Versioned persistent state.
//!
//! [`LedgerStorage`] is the only state that outlives a logic replacement:
//! the tip id counter, every tip record, the issuer configuration, the fee
//! configuration and retained fees. Its layout is versioned by
//! [`constants::STORAGE_SCHEMA_VERSION`]; snapshots written under any other
//! version are refused.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tipoffer_types::{
    Address, Asset, FeeConfig, IssuerConfig, Result, Tip, TipId, TipOfferConfig, TipOfferError,
    constants,
};

/// Persistent ledger state, schema version 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStorage {
    schema_version: u32,
    /// Account holding every escrowed asset.
    custody: Address,
    next_tip_id: TipId,
    /// Tip `n` lives at index `n - 1`.
    tips: Vec<Tip>,
    issuer: IssuerConfig,
    fee: FeeConfig,
    #[serde(with = "tipoffer_types::amount")]
    retained_native: u128,
    #[serde(with = "tipoffer_types::amount::map")]
    retained_tokens: BTreeMap<Address, u128>,
}

impl LedgerStorage {
    /// Empty storage initialised from `config`.
    #[must_use]
    pub fn new(config: &TipOfferConfig) -> Self {
        Self {
            schema_version: constants::STORAGE_SCHEMA_VERSION,
            custody: config.custody,
            next_tip_id: TipId::FIRST,
            tips: Vec::new(),
            issuer: config.issuer,
            fee: config.fee,
            retained_native: 0,
            retained_tokens: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    #[must_use]
    pub fn custody(&self) -> Address {
        self.custody
    }

    /// Id the next created tip will receive.
    #[must_use]
    pub fn next_tip_id(&self) -> TipId {
        self.next_tip_id
    }

    #[must_use]
    pub fn tip_count(&self) -> usize {
        self.tips.len()
    }

    // -----------------------------------------------------------------------
    // Tips
    // -----------------------------------------------------------------------

    /// Append `tip`, which must carry [`Self::next_tip_id`], and advance the
    /// counter.
    pub fn insert_tip(&mut self, tip: Tip) -> Result<TipId> {
        if tip.id != self.next_tip_id {
            return Err(TipOfferError::Internal(format!(
                "tip inserted as {} but next id is {}",
                tip.id, self.next_tip_id
            )));
        }
        let id = tip.id;
        self.tips.push(tip);
        self.next_tip_id = id.next();
        Ok(id)
    }

    #[must_use]
    pub fn tip(&self, id: TipId) -> Option<&Tip> {
        Self::index(id).and_then(|i| self.tips.get(i))
    }

    pub fn tip_mut(&mut self, id: TipId) -> Option<&mut Tip> {
        Self::index(id).and_then(|i| self.tips.get_mut(i))
    }

    /// All tips in id order.
    pub fn tips(&self) -> impl Iterator<Item = &Tip> {
        self.tips.iter()
    }

    fn index(id: TipId) -> Option<usize> {
        id.0.checked_sub(1).and_then(|i| usize::try_from(i).ok())
    }

    // -----------------------------------------------------------------------
    // Issuer / fee configuration
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn issuer(&self) -> &IssuerConfig {
        &self.issuer
    }

    pub fn set_attestor(&mut self, attestor: Address) {
        self.issuer.attestor = attestor;
    }

    #[must_use]
    pub fn fee(&self) -> FeeConfig {
        self.fee
    }

    // -----------------------------------------------------------------------
    // Retained fees
    // -----------------------------------------------------------------------

    /// Add `amount` to the fees retained in custody for `asset`.
    pub fn retain_fee(&mut self, asset: Asset, amount: u128) -> Result<()> {
        let slot = match asset {
            Asset::Native => &mut self.retained_native,
            Asset::Token(token) => self.retained_tokens.entry(token).or_insert(0),
        };
        *slot = slot
            .checked_add(amount)
            .ok_or_else(|| TipOfferError::AmountOverflow {
                context: format!("retaining fee in {asset}"),
            })?;
        Ok(())
    }

    /// Total fees retained for `asset` since genesis.
    #[must_use]
    pub fn retained_fee(&self, asset: Asset) -> u128 {
        match asset {
            Asset::Native => self.retained_native,
            Asset::Token(token) => self.retained_tokens.get(&token).copied().unwrap_or(0),
        }
    }

    /// Every asset with a non-zero retained fee.
    pub fn retained_assets(&self) -> impl Iterator<Item = Asset> + '_ {
        let native = (self.retained_native > 0).then_some(Asset::Native);
        native.into_iter().chain(
            self.retained_tokens
                .iter()
                .filter(|(_, amount)| **amount > 0)
                .map(|(token, _)| Asset::Token(*token)),
        )
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Serialize the full state as a JSON document.
    pub fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load state from a snapshot, refusing other schema versions,
    /// configuration a fresh instance would reject, and inconsistent tip
    /// tables.
    pub fn restore_json(json: &str) -> Result<Self> {
        let storage: Self = serde_json::from_str(json)?;
        if storage.schema_version != constants::STORAGE_SCHEMA_VERSION {
            return Err(TipOfferError::StorageVersionMismatch {
                expected: constants::STORAGE_SCHEMA_VERSION,
                actual: storage.schema_version,
            });
        }
        if storage.custody.is_zero() {
            return Err(TipOfferError::Configuration(
                "custody address must not be zero".into(),
            ));
        }
        storage.issuer.validate()?;
        storage.fee.validate()?;
        for (i, tip) in storage.tips.iter().enumerate() {
            if Self::index(tip.id) != Some(i) {
                return Err(TipOfferError::Serialization(format!(
                    "tip table out of order: {} stored at position {}",
                    tip.id,
                    i + 1
                )));
            }
        }
        let expected_next = TipId(storage.tips.len() as u64 + 1);
        if storage.next_tip_id != expected_next {
            return Err(TipOfferError::Serialization(format!(
                "next tip id {} does not follow {} stored tips",
                storage.next_tip_id,
                storage.tips.len()
            )));
        }
        Ok(storage)
    }
}
