//! # tipoffer-ledger
//!
//! **Escrow ledger**: tip storage, asset custody, and access control for
//! the TipOffer escrow.
//!
//! ## Architecture
//!
//! 1. **LedgerStorage**: versioned persistent state (tip table, id counter,
//!    issuer and fee config, retained fees)
//! 2. **AssetBank**: boundary to whatever holds balances; [`MemoryBank`] in process
//! 3. **TransferPlan**: validate-all-then-move asset legs with revert on failure
//! 4. **TipLedger**: creates tips (pulls assets into custody) and serves reads
//! 5. **AccessControl**: admin-only attestor rotation
//! 6. **SolvencyCheck**: custody balance ≥ open commitments + retained fees
//!
//! ## Funding Flow
//!
//! ```text
//! TipRequest → TipLedger.check → TransferPlan.validate → TransferPlan.execute
//!            → LedgerStorage.insert_tip → TipId
//! ```

pub mod access;
pub mod bank;
pub mod ledger;
pub mod solvency;
pub mod storage;
pub mod transfer;

pub use access::AccessControl;
pub use bank::{AssetBank, MemoryBank};
pub use ledger::{TipLedger, TipRequest};
pub use solvency::{AssetPosition, SolvencyCheck};
pub use storage::LedgerStorage;
pub use transfer::{LegKind, TransferLeg, TransferPlan};
