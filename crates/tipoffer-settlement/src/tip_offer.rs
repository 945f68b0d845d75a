//! The serialized TipOffer facade.
//!
//! [`TipOffer`] owns the storage, the asset bank, the current logic module
//! and the receipt log behind one mutex. Every entry point takes the lock
//! for its whole duration, so calls are strictly serialized and each
//! mutating call either fully applies or leaves no trace.
//!
//! If a call reports [`TipOfferError::InconsistentState`] the bank and the
//! ledger disagree. The instance then halts: every later mutating call
//! fails with [`TipOfferError::Halted`], while reads keep working so the
//! state can be inspected and reconciled.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tipoffer_attestation::AttestationVerifier;
use tipoffer_ledger::{AccessControl, AssetBank, LedgerStorage, SolvencyCheck, TipRequest};
use tipoffer_types::{
    Address, Asset, Receipt, ReceiptType, Result, TipId, TipOfferConfig, TipOfferError, TipView,
    constants,
};

use crate::engine::CollectOutcome;
use crate::logic::{TipOfferLogic, TipOfferV1};

struct State<B> {
    storage: LedgerStorage,
    bank: B,
    logic: Box<dyn TipOfferLogic>,
    receipts: Vec<Receipt>,
    /// Set once an inconsistency is detected.
    halted: Option<String>,
}

/// An attestation-gated tip escrow.
pub struct TipOffer<B: AssetBank> {
    state: Mutex<State<B>>,
}

impl<B: AssetBank> TipOffer<B> {
    /// New instance trusting the hard-coded root authority.
    pub fn new(config: TipOfferConfig, bank: B) -> Result<Self> {
        Self::with_verifier(config, bank, AttestationVerifier::hard_coded()?)
    }

    /// New instance trusting an explicit root authority.
    pub fn with_verifier(
        config: TipOfferConfig,
        bank: B,
        verifier: AttestationVerifier,
    ) -> Result<Self> {
        config.validate()?;
        let logic = TipOfferV1::new(config.limits, verifier);
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            custody = %config.custody,
            admin = %config.issuer.admin,
            attestor = %config.issuer.attestor,
            fee_bps = config.fee.fee_bps,
            fee_policy = %config.fee.policy,
            "tip offer initialised"
        );
        Ok(Self::from_parts(LedgerStorage::new(&config), bank, Box::new(logic)))
    }

    /// Rebuild an instance from a storage snapshot, a bank, and a logic
    /// module.
    pub fn restore(snapshot: &str, bank: B, logic: Box<dyn TipOfferLogic>) -> Result<Self> {
        let storage = LedgerStorage::restore_json(snapshot)?;
        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            tips = storage.tip_count(),
            next_tip_id = %storage.next_tip_id(),
            logic_version = logic.version(),
            "tip offer restored"
        );
        Ok(Self::from_parts(storage, bank, logic))
    }

    fn from_parts(storage: LedgerStorage, bank: B, logic: Box<dyn TipOfferLogic>) -> Self {
        Self {
            state: Mutex::new(State {
                storage,
                bank,
                logic,
                receipts: Vec::new(),
                halted: None,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State<B>>> {
        self.state
            .lock()
            .map_err(|_| TipOfferError::Internal("state lock poisoned".into()))
    }

    /// Run a mutating call under the lock, refusing it once halted and
    /// halting on an inconsistency.
    fn mutate<R>(&self, call: impl FnOnce(&mut State<B>) -> Result<R>) -> Result<R> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        if let Some(reason) = &state.halted {
            return Err(TipOfferError::Halted {
                reason: reason.clone(),
            });
        }
        let result = call(state);
        if let Some(err) = result.as_ref().err().filter(|err| err.is_fatal()) {
            tracing::error!(error = %err, "ledger and bank out of step, halting");
            state.halted = Some(err.to_string());
        }
        result
    }

    // -----------------------------------------------------------------------
    // Mutating entry points
    // -----------------------------------------------------------------------

    /// Escrow the request's assets for its identifier.
    pub fn create_tip(&self, caller: Address, request: TipRequest) -> Result<TipId> {
        self.mutate(|state| {
            let now = Utc::now();
            let tip = state
                .logic
                .create_tip(&mut state.storage, &mut state.bank, caller, request, now)?;
            state.receipts.push(Receipt::new(
                ReceiptType::TipCreated,
                vec![tip.id],
                caller,
                &receipt_payload(&tip.view()),
                now,
            ));
            Ok(tip.id)
        })
    }

    /// Settle `tip_ids` to the subject bound by `attestation`.
    pub fn collect_tip(
        &self,
        caller: Address,
        tip_ids: &[TipId],
        attestation: &[u8],
    ) -> Result<CollectOutcome> {
        self.mutate(|state| {
            let now = Utc::now();
            let outcome = state.logic.collect_tip(
                &mut state.storage,
                &mut state.bank,
                caller,
                tip_ids,
                attestation,
                now,
            )?;
            state.receipts.push(Receipt::new(
                ReceiptType::TipsCollected,
                outcome.tip_ids.clone(),
                caller,
                &receipt_payload(&outcome),
                now,
            ));
            Ok(outcome)
        })
    }

    /// Replace the trusted attestor (administrator only).
    pub fn set_attestor(&self, caller: Address, attestor: Address) -> Result<()> {
        self.mutate(|state| {
            state.logic.set_attestor(&mut state.storage, caller, attestor)?;
            state.receipts.push(Receipt::new(
                ReceiptType::AttestorRotated,
                Vec::new(),
                caller,
                attestor.as_bytes(),
                Utc::now(),
            ));
            Ok(())
        })
    }

    /// Swap the logic module (administrator only). Storage is untouched.
    pub fn upgrade_logic(&self, caller: Address, logic: Box<dyn TipOfferLogic>) -> Result<()> {
        self.mutate(|state| {
            AccessControl::ensure_admin(&state.storage, caller)?;
            let from = state.logic.version();
            let to = logic.version();
            state.logic = logic;
            tracing::info!(from, to, "logic upgraded");
            state.receipts.push(Receipt::new(
                ReceiptType::LogicUpgraded,
                Vec::new(),
                caller,
                &to.to_be_bytes(),
                Utc::now(),
            ));
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get_tip(&self, id: TipId) -> Result<TipView> {
        let state = self.lock()?;
        state.logic.get_tip(&state.storage, id)
    }

    pub fn get_tips(&self, ids: &[TipId]) -> Result<Vec<TipView>> {
        let state = self.lock()?;
        state.logic.get_tips(&state.storage, ids)
    }

    pub fn get_admin(&self) -> Result<Address> {
        Ok(AccessControl::admin(&self.lock()?.storage))
    }

    pub fn get_attestor(&self) -> Result<Address> {
        Ok(AccessControl::attestor(&self.lock()?.storage))
    }

    /// Fee factor in basis points.
    pub fn get_tip_fee_factor(&self) -> Result<u32> {
        let state = self.lock()?;
        Ok(state.logic.fee_factor(&state.storage))
    }

    /// Fees retained in custody for `asset` since genesis.
    pub fn retained_fee(&self, asset: Asset) -> Result<u128> {
        Ok(self.lock()?.storage.retained_fee(asset))
    }

    /// Bank balance of `owner` in `asset`.
    pub fn balance_of(&self, owner: Address, asset: Asset) -> Result<u128> {
        Ok(self.lock()?.bank.balance_of(owner, asset))
    }

    pub fn logic_version(&self) -> Result<u32> {
        Ok(self.lock()?.logic.version())
    }

    /// Why the instance stopped accepting mutations, if it did.
    pub fn halt_reason(&self) -> Result<Option<String>> {
        Ok(self.lock()?.halted.clone())
    }

    /// Every receipt issued by this instance, oldest first.
    pub fn receipts(&self) -> Result<Vec<Receipt>> {
        Ok(self.lock()?.receipts.clone())
    }

    /// Check that custody covers every open tip plus retained fees.
    pub fn verify_solvency(&self) -> Result<()> {
        let state = self.lock()?;
        SolvencyCheck::verify(&state.storage, &state.bank)
    }

    /// JSON snapshot of the persistent storage.
    pub fn snapshot(&self) -> Result<String> {
        self.lock()?.storage.snapshot_json()
    }

    /// Tear down and hand back the storage snapshot and the bank.
    pub fn into_parts(self) -> Result<(String, B)> {
        let state = self
            .state
            .into_inner()
            .map_err(|_| TipOfferError::Internal("state lock poisoned".into()))?;
        Ok((state.storage.snapshot_json()?, state.bank))
    }
}

/// Receipt payload for a committed call. The call already took effect, so a
/// serialization failure is logged and hashed as an empty payload.
fn receipt_payload<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|err| {
        tracing::error!(error = %err, "receipt payload not serializable");
        Vec::new()
    })
}
