//! End-to-end tests across the attestation, ledger, and settlement crates.
//!
//! These drive the public [`TipOffer`] facade the way funders, claimants,
//! relayers, and the administrator would: fund tips for identifiers,
//! collect them with signed attestations, rotate the attestor, replace the
//! logic module, and move storage between instances.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tipoffer_attestation::{RootAuthority, SignedAttestation, fixtures::TestAuthority};
use tipoffer_ledger::{AssetBank, LedgerStorage, MemoryBank, TipRequest};
use tipoffer_settlement::{CollectOutcome, TipOffer, TipOfferLogic, TipOfferV1};
use tipoffer_types::*;

const ETHER: u128 = 1_000_000_000_000_000_000;
const HANDLE: &str = "https://twitter.com/zhangweiwu 205521676";
const OTHER_HANDLE: &str = "hekatonchires 777";

/// `whole + hundredths / 100` ether, in wei.
fn ether(whole: u128, hundredths: u128) -> u128 {
    whole * ETHER + hundredths * ETHER / 100
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Handle to a bank the escrow shares with the outside world, so token
/// holders can grant allowances and refuse transfers while it runs.
#[derive(Clone, Default)]
struct SharedBank(Arc<Mutex<MemoryBank>>);

impl SharedBank {
    fn with<R>(&self, f: impl FnOnce(&mut MemoryBank) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }
}

impl AssetBank for SharedBank {
    fn balance_of(&self, owner: Address, asset: Asset) -> u128 {
        self.with(|bank| bank.balance_of(owner, asset))
    }
    fn allowance(&self, owner: Address, spender: Address, token: Address) -> u128 {
        self.with(|bank| bank.allowance(owner, spender, token))
    }
    fn accepts(&self, recipient: Address, asset: Asset) -> bool {
        self.with(|bank| bank.accepts(recipient, asset))
    }
    fn transfer(&mut self, from: Address, to: Address, asset: Asset, amount: u128) -> Result<()> {
        self.with(|bank| bank.transfer(from, to, asset, amount))
    }
    fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        token: Address,
        amount: u128,
    ) -> Result<()> {
        self.with(|bank| bank.transfer_from(spender, owner, to, token, amount))
    }
    fn restore_allowance(&mut self, owner: Address, spender: Address, token: Address, amount: u128) {
        self.with(|bank| bank.restore_allowance(owner, spender, token, amount));
    }
}

/// A deployed escrow plus the actors that use it.
struct Deployment {
    offer: TipOffer<SharedBank>,
    bank: SharedBank,
    authority: TestAuthority,
    admin: Address,
    custody: Address,
    funder: Address,
    relayer: Address,
    subject: Address,
    stable_coin: Address,
}

impl Deployment {
    fn new(fee: FeeConfig) -> Self {
        init_tracing();
        let authority = TestAuthority::new().unwrap();
        let admin = Address::random();
        let custody = Address::random();
        let mut config = TipOfferConfig::new(custody, admin, authority.attestor_address());
        config.fee = fee;

        let funder = Address::random();
        let stable_coin = Address::random();
        let bank = SharedBank::default();
        bank.with(|b| {
            b.deposit_native(funder, 100 * ETHER).unwrap();
            b.mint_token(stable_coin, funder, 50 * ETHER).unwrap();
        });

        let offer = TipOffer::with_verifier(config, bank.clone(), authority.verifier()).unwrap();
        Self {
            offer,
            bank,
            authority,
            admin,
            custody,
            funder,
            relayer: Address::random(),
            subject: Address::random(),
            stable_coin,
        }
    }

    /// Approve exactly the token amount, then create the tip.
    fn tip(&self, identifier: &str, native: u128, token: u128) -> TipId {
        let mut request = TipRequest::new(identifier, native);
        if token > 0 {
            let (funder, custody, coin) = (self.funder, self.custody, self.stable_coin);
            self.bank.with(|bank| bank.approve(funder, custody, coin, token));
            request = request.with_token(self.stable_coin, token);
        }
        self.offer.create_tip(self.funder, request).unwrap()
    }

    fn attestation(&self, identifier: &str) -> Vec<u8> {
        self.authority.attest(identifier, self.subject).unwrap()
    }

    fn collect(&self, ids: &[TipId]) -> Result<CollectOutcome> {
        self.offer
            .collect_tip(self.relayer, ids, &self.attestation(HANDLE))
    }

    fn balance(&self, owner: Address, asset: Asset) -> u128 {
        self.offer.balance_of(owner, asset).unwrap()
    }

    fn subject_native(&self) -> u128 {
        self.balance(self.subject, Asset::Native)
    }

    fn subject_tokens(&self) -> u128 {
        self.balance(self.subject, Asset::Token(self.stable_coin))
    }

    fn is_completed(&self, id: TipId) -> bool {
        self.offer.get_tip(id).unwrap().completed
    }
}

/// Logic module standing in for a redeployed implementation.
struct UpgradedLogic(TipOfferV1);

impl TipOfferLogic for UpgradedLogic {
    fn version(&self) -> u32 {
        2
    }

    fn create_tip(
        &self,
        storage: &mut LedgerStorage,
        bank: &mut dyn AssetBank,
        caller: Address,
        request: TipRequest,
        now: DateTime<Utc>,
    ) -> Result<Tip> {
        self.0.create_tip(storage, bank, caller, request, now)
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
        self.0
            .collect_tip(storage, bank, caller, tip_ids, attestation, now)
    }

    fn set_attestor(
        &self,
        storage: &mut LedgerStorage,
        caller: Address,
        attestor: Address,
    ) -> Result<Address> {
        self.0.set_attestor(storage, caller, attestor)
    }

    fn get_tip(&self, storage: &LedgerStorage, id: TipId) -> Result<TipView> {
        self.0.get_tip(storage, id)
    }

    fn get_tips(&self, storage: &LedgerStorage, ids: &[TipId]) -> Result<Vec<TipView>> {
        self.0.get_tips(storage, ids)
    }
}

// ===========================================================================
// Regression run
// ===========================================================================

/// Seven tips for one handle, one for another, collected in three batches,
/// then three more after a logic upgrade.
#[test]
fn reference_run_with_upgrade() {
    let d = Deployment::new(FeeConfig::default());

    // Tip 1: native only.
    let t1 = d.tip(HANDLE, ether(0, 10), 0);
    assert_eq!(t1, TipId(1));
    let view = d.offer.get_tip(t1).unwrap();
    assert_eq!(view.offerer, d.funder);
    assert_eq!(view.identifier, HANDLE);
    assert_eq!(view.wei_value, ether(0, 10));
    d.collect(&[t1]).unwrap();
    assert_eq!(d.subject_native(), ether(0, 10));
    assert_eq!(d.offer.get_tip(t1).unwrap().payee, Some(d.subject));

    // Tip 2: native + stable coin; a forged attestation cannot collect it.
    let t2 = d.tip(HANDLE, ether(0, 20), ether(1, 30));
    assert_eq!(d.balance(d.custody, Asset::Token(d.stable_coin)), ether(1, 30));
    let rogue = RootAuthority::from_seed([0x66; 32])
        .issuer(
            ed25519_dalek::SigningKey::from_bytes(&[0x22; 32]),
            1,
            Utc::now() - chrono::Duration::days(1),
            None,
        )
        .unwrap();
    let fake = rogue
        .issue_unlimited(HANDLE, d.subject, Utc::now())
        .unwrap();
    let err = d.offer.collect_tip(d.relayer, &[t2], &fake).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAttestation);
    assert!(!d.is_completed(t2));

    // Tip 3, then collect 2 and 3 together.
    let t3 = d.tip(HANDLE, ether(1, 10), ether(4, 10));
    let outcome = d.collect(&[t2, t3]).unwrap();
    assert_eq!(outcome.native.payout, ether(1, 30));
    assert_eq!(outcome.payout(Asset::Token(d.stable_coin)), ether(5, 40));
    assert_eq!(d.subject_tokens(), ether(5, 40));

    // Tips 4, 5 for the handle and 6 for someone else: the mixed batch fails.
    let t4 = d.tip(HANDLE, ether(1, 10), ether(4, 10));
    let t5 = d.tip(HANDLE, ether(3, 0), ether(6, 20));
    let t6 = d.tip(OTHER_HANDLE, ether(3, 0), ether(3, 20));
    let err = d.collect(&[t4, t5, t6]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotYourTip);
    assert!(!d.is_completed(t4));
    assert!(!d.is_completed(t5));
    assert_eq!(d.subject_native(), ether(1, 40));

    // Tip 7, then collect 4, 5, 7.
    let t7 = d.tip(HANDLE, ether(0, 1), ether(2, 20));
    d.collect(&[t4, t5, t7]).unwrap();

    assert_eq!(d.subject_native(), 5_510_000_000_000_000_000);
    assert_eq!(d.subject_tokens(), 17_900_000_000_000_000_000);
    assert!(!d.is_completed(t6));
    d.offer.verify_solvency().unwrap();

    // Replace the logic; ids and records carry over.
    let upgraded = UpgradedLogic(TipOfferV1::new(
        LedgerLimits::default(),
        d.authority.verifier(),
    ));
    d.offer.upgrade_logic(d.admin, Box::new(upgraded)).unwrap();
    assert_eq!(d.offer.logic_version().unwrap(), 2);
    assert_eq!(d.offer.get_tip(t7).unwrap().payee, Some(d.subject));
    assert_eq!(d.offer.get_tip(t6).unwrap().identifier, OTHER_HANDLE);

    let t8 = d.tip(HANDLE, ether(1, 10), ether(4, 10));
    let t9 = d.tip(HANDLE, ether(3, 0), ether(6, 20));
    let t10 = d.tip(HANDLE, ether(0, 1), ether(2, 20));
    assert_eq!((t8, t9, t10), (TipId(8), TipId(9), TipId(10)));
    d.collect(&[t8, t9, t10]).unwrap();

    assert_eq!(d.subject_native(), 5_510_000_000_000_000_000 + ether(4, 11));
    assert_eq!(d.subject_tokens(), 17_900_000_000_000_000_000 + ether(12, 50));

    // Only tip 6 is still held in custody.
    assert_eq!(d.balance(d.custody, Asset::Native), ether(3, 0));
    assert_eq!(d.balance(d.custody, Asset::Token(d.stable_coin)), ether(3, 20));
    d.offer.verify_solvency().unwrap();
}

// ===========================================================================
// Attestation failures
// ===========================================================================

#[test]
fn imposter_binding_is_invalid_attestation_not_not_your_tip() {
    let d = Deployment::new(FeeConfig::default());
    let id = d.tip(HANDLE, ether(1, 0), 0);

    // A genuine attestation for the imposter's own handle, re-labelled.
    let genuine = d.authority.attest("https://twitter.com/imposter 1", d.subject).unwrap();
    let mut forged = SignedAttestation::decode(&genuine).unwrap();
    forged.statement.identifier = HANDLE.to_string();
    let forged = forged.encode().unwrap();

    let err = d.offer.collect_tip(d.relayer, &[id], &forged).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAttestation);
    assert!(!d.is_completed(id));
    assert_eq!(d.subject_native(), 0);
}

#[test]
fn attestation_for_other_identifier_is_not_your_tip() {
    let d = Deployment::new(FeeConfig::default());
    let id = d.tip(HANDLE, ether(1, 0), 0);
    let blob = d.attestation(OTHER_HANDLE);
    let err = d.offer.collect_tip(d.relayer, &[id], &blob).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotYourTip);
}

#[test]
fn attestor_rotation_applies_to_later_collections() {
    let d = Deployment::new(FeeConfig::default());
    let first = d.tip(HANDLE, ether(1, 0), 0);
    let second = d.tip(HANDLE, ether(2, 0), 0);
    let old_blob = d.attestation(HANDLE);
    d.offer.collect_tip(d.relayer, &[first], &old_blob).unwrap();

    let next = d.authority.second_issuer([0x33; 32]).unwrap();
    let err = d.offer.set_attestor(d.relayer, next.address()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    d.offer.set_attestor(d.admin, next.address()).unwrap();
    assert_eq!(d.offer.get_attestor().unwrap(), next.address());
    assert_eq!(d.offer.get_admin().unwrap(), d.admin);

    // The completed tip stays completed; the old attestor no longer works.
    assert!(d.is_completed(first));
    let err = d.offer.collect_tip(d.relayer, &[second], &old_blob).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAttestation);

    let new_blob = next.issue_unlimited(HANDLE, d.subject, Utc::now()).unwrap();
    d.offer.collect_tip(d.relayer, &[second], &new_blob).unwrap();
    assert_eq!(d.subject_native(), ether(3, 0));
}

// ===========================================================================
// Atomicity
// ===========================================================================

#[test]
fn refused_transfer_changes_nothing() {
    let d = Deployment::new(FeeConfig::default());
    let a = d.tip(HANDLE, ether(1, 0), ether(2, 0));
    let b = d.tip(HANDLE, ether(1, 0), 0);
    let (subject, coin) = (d.subject, d.stable_coin);
    d.bank.with(|bank| bank.refuse_incoming(subject, Asset::Token(coin)));

    let err = d.collect(&[a, b]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransferFailure);
    assert!(!d.is_completed(a));
    assert!(!d.is_completed(b));
    assert_eq!(d.subject_native(), 0);
    assert_eq!(d.balance(d.custody, Asset::Native), ether(2, 0));
    assert_eq!(d.offer.receipts().unwrap().len(), 2);

    d.bank.with(|bank| bank.accept_incoming(subject, Asset::Token(coin)));
    d.collect(&[a, b]).unwrap();
    assert_eq!(d.subject_tokens(), ether(2, 0));
}

#[test]
fn failed_funding_creates_no_tip() {
    let d = Deployment::new(FeeConfig::default());
    // No allowance granted for the token leg.
    let request = TipRequest::new(HANDLE, ether(1, 0)).with_token(d.stable_coin, ether(1, 0));
    let err = d.offer.create_tip(d.funder, request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransferFailure);
    assert_eq!(d.balance(d.funder, Asset::Native), 100 * ETHER);
    assert!(matches!(
        d.offer.get_tip(TipId(1)),
        Err(TipOfferError::TipNotFound(TipId(1)))
    ));
    assert_eq!(d.tip(HANDLE, 1, 0), TipId(1));
}

#[test]
fn double_collect_rejected() {
    let d = Deployment::new(FeeConfig::default());
    let id = d.tip(HANDLE, ether(1, 0), ether(1, 0));
    d.collect(&[id]).unwrap();
    let err = d.collect(&[id]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotYourTip);
    assert_eq!(d.subject_native(), ether(1, 0));
    assert_eq!(d.subject_tokens(), ether(1, 0));
}

// ===========================================================================
// Fees
// ===========================================================================

#[test]
fn native_only_fee_policy() {
    let d = Deployment::new(FeeConfig {
        fee_bps: 250,
        policy: FeePolicy::NativeOnly,
    });
    assert_eq!(d.offer.get_tip_fee_factor().unwrap(), 250);
    let a = d.tip(HANDLE, ether(1, 0), ether(2, 0));
    let b = d.tip(HANDLE, ether(3, 0), 0);
    d.collect(&[a, b]).unwrap();

    // 2.5% of 4 ether
    assert_eq!(d.subject_native(), ether(3, 90));
    assert_eq!(d.subject_tokens(), ether(2, 0));
    assert_eq!(d.offer.retained_fee(Asset::Native).unwrap(), ether(0, 10));
    assert_eq!(d.balance(d.custody, Asset::Native), ether(0, 10));
    d.offer.verify_solvency().unwrap();
}

#[test]
fn all_legs_fee_policy() {
    let d = Deployment::new(FeeConfig {
        fee_bps: 500,
        policy: FeePolicy::AllLegs,
    });
    let id = d.tip(HANDLE, ether(2, 0), ether(4, 0));
    let outcome = d.collect(&[id]).unwrap();
    assert_eq!(outcome.native.fee, ether(0, 10));
    assert_eq!(d.subject_tokens(), ether(3, 80));
    assert_eq!(
        d.offer.retained_fee(Asset::Token(d.stable_coin)).unwrap(),
        ether(0, 20)
    );
    d.offer.verify_solvency().unwrap();
}

// ===========================================================================
// Storage portability
// ===========================================================================

#[test]
fn storage_moves_between_instances() {
    let d = Deployment::new(FeeConfig::default());
    let a = d.tip(HANDLE, ether(1, 0), ether(1, 0));
    let b = d.tip(OTHER_HANDLE, ether(2, 0), 0);
    d.collect(&[a]).unwrap();
    let before = d.offer.get_tips(&[a, b]).unwrap();
    let snapshot = d.offer.snapshot().unwrap();
    assert!(snapshot.contains("\"schema_version\":1"));

    let Deployment {
        offer,
        authority,
        funder,
        ..
    } = d;
    let (_, bank) = offer.into_parts().unwrap();
    let logic = Box::new(TipOfferV1::new(LedgerLimits::default(), authority.verifier()));
    let restored = TipOffer::restore(&snapshot, bank, logic).unwrap();

    assert_eq!(restored.get_tips(&[a, b]).unwrap(), before);
    restored.verify_solvency().unwrap();
    let next = restored
        .create_tip(funder, TipRequest::new(HANDLE, 1))
        .unwrap();
    assert_eq!(next, TipId(3));
}
