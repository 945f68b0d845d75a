//! # tipoffer-types
//!
//! Shared types, errors, and configuration for the **TipOffer** escrow.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`TipId`], [`Address`], [`ReceiptId`]
//! - **Asset model**: [`Asset`], [`PaymentToken`]
//! - **Tip model**: [`Tip`], [`TipView`]
//! - **Attestation claims**: [`Attestation`]
//! - **Receipt model**: [`Receipt`], [`ReceiptType`]
//! - **Configuration**: [`TipOfferConfig`], [`IssuerConfig`], [`FeeConfig`], [`FeePolicy`], [`LedgerLimits`]
//! - **Errors**: [`TipOfferError`] with `TO_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod amount;
pub mod asset;
pub mod attestation;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod receipt;
pub mod tip;

// Re-export all primary types at crate root for ergonomic imports:
//   use tipoffer_types::{Tip, TipId, Address, ...};

pub use asset::*;
pub use attestation::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use receipt::*;
pub use tip::*;

// Constants are accessed via `tipoffer_types::constants::FOO`
// (not re-exported to avoid name collisions).
