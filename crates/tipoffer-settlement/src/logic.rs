//! Swappable behaviour over fixed storage.
//!
//! Everything a TipOffer instance *does* sits behind [`TipOfferLogic`];
//! everything it *remembers* sits in [`LedgerStorage`]. Replacing the logic
//! object leaves the storage untouched, so tip ids, tip records, and the
//! issuer configuration carry over with identical meaning.

use chrono::{DateTime, Utc};
use tipoffer_attestation::AttestationVerifier;
use tipoffer_ledger::{AccessControl, AssetBank, LedgerStorage, TipLedger, TipRequest};
use tipoffer_types::{Address, LedgerLimits, Result, Tip, TipId, TipView};

use crate::engine::{CollectOutcome, SettlementEngine};
use crate::fee::FeeEngine;

/// Behaviour module of a TipOffer instance.
pub trait TipOfferLogic: Send {
    /// Monotonic version of this logic, recorded on upgrade.
    fn version(&self) -> u32;

    fn create_tip(
        &self,
        storage: &mut LedgerStorage,
        bank: &mut dyn AssetBank,
        caller: Address,
        request: TipRequest,
        now: DateTime<Utc>,
    ) -> Result<Tip>;

    fn collect_tip(
        &self,
        storage: &mut LedgerStorage,
        bank: &mut dyn AssetBank,
        caller: Address,
        tip_ids: &[TipId],
        attestation: &[u8],
        now: DateTime<Utc>,
    ) -> Result<CollectOutcome>;

    /// Returns the previous attestor.
    fn set_attestor(
        &self,
        storage: &mut LedgerStorage,
        caller: Address,
        attestor: Address,
    ) -> Result<Address>;

    fn get_tip(&self, storage: &LedgerStorage, id: TipId) -> Result<TipView>;

    fn get_tips(&self, storage: &LedgerStorage, ids: &[TipId]) -> Result<Vec<TipView>>;

    /// Fee factor in basis points.
    fn fee_factor(&self, storage: &LedgerStorage) -> u32 {
        FeeEngine::new(storage.fee()).fee_factor()
    }
}

/// The first logic version: ledger, settlement engine, and verifier wired
/// together.
#[derive(Debug, Clone)]
pub struct TipOfferV1 {
    ledger: TipLedger,
    engine: SettlementEngine,
    verifier: AttestationVerifier,
}

impl TipOfferV1 {
    #[must_use]
    pub fn new(limits: LedgerLimits, verifier: AttestationVerifier) -> Self {
        Self {
            ledger: TipLedger::new(limits),
            engine: SettlementEngine::new(&limits),
            verifier,
        }
    }

    #[must_use]
    pub fn verifier(&self) -> &AttestationVerifier {
        &self.verifier
    }
}

impl TipOfferLogic for TipOfferV1 {
    fn version(&self) -> u32 {
        1
    }

    fn create_tip(
        &self,
        storage: &mut LedgerStorage,
        bank: &mut dyn AssetBank,
        caller: Address,
        request: TipRequest,
        now: DateTime<Utc>,
    ) -> Result<Tip> {
        self.ledger.create_tip(storage, bank, caller, request, now)
    }

    fn collect_tip(
        &self,
        storage: &mut LedgerStorage,
        bank: &mut dyn AssetBank,
        caller: Address,
        tip_ids: &[TipId],
        attestation: &[u8],
        now: DateTime<Utc>,
    ) -> Result<CollectOutcome> {
        self.engine
            .collect_tip(storage, bank, &self.verifier, caller, tip_ids, attestation, now)
    }

    fn set_attestor(
        &self,
        storage: &mut LedgerStorage,
        caller: Address,
        attestor: Address,
    ) -> Result<Address> {
        AccessControl::set_attestor(storage, caller, attestor)
    }

    fn get_tip(&self, storage: &LedgerStorage, id: TipId) -> Result<TipView> {
        self.ledger.get_tip(storage, id)
    }

    fn get_tips(&self, storage: &LedgerStorage, ids: &[TipId]) -> Result<Vec<TipView>> {
        self.ledger.get_tips(storage, ids)
    }
}
