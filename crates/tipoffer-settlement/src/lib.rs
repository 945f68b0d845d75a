//! # tipoffer-settlement
//!
//! **Settlement plane**: fees, batched attestation-gated collection, the
//! swappable logic module, and the serialized [`TipOffer`] facade.
//!
//! ## Architecture
//!
//! 1. **FeeEngine**: splits an amount into payout and retained fee (basis points)
//! 2. **SettlementEngine**: verifies one attestation, validates every tip,
//!    pays the aggregate to the attested subject, marks tips completed
//! 3. **TipOfferLogic**: behaviour behind a trait so it can be replaced
//!    without touching storage ([`TipOfferV1`] is the first version)
//! 4. **TipOffer**: one mutex around storage, bank, logic, and receipts
//!
//! ## Collection Flow
//!
//! ```text
//! collect_tip(ids, blob) → AttestationVerifier.verify → per-id checks
//!     → aggregate → FeeEngine.split → TransferPlan.execute → mark completed
//! ```

pub mod engine;
pub mod fee;
pub mod logic;
pub mod tip_offer;

pub use engine::{CollectOutcome, SettlementEngine, TokenPayout};
pub use fee::{FeeEngine, FeeSplit};
pub use logic::{TipOfferLogic, TipOfferV1};
pub use tip_offer::TipOffer;
