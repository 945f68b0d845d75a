//! Error types for the TipOffer escrow.
//!
//! All errors use the `TO_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Attestation errors
//! - 2xx: Tip errors
//! - 3xx: Asset / transfer errors
//! - 4xx: Access control errors
//! - 5xx: Storage / configuration errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{Address, TipId};

/// Central error enum for all TipOffer operations.
#[derive(Debug, Error)]
pub enum TipOfferError {
    // =================================================================
    // Attestation Errors (1xx)
    // =================================================================
    /// The attestation blob is malformed, a signature in its chain fails,
    /// the issuer is not the configured attestor, or it is outside its
    /// validity window.
    #[error("TO_ERR_100: Invalid attestation: {reason}")]
    InvalidAttestation { reason: String },

    // =================================================================
    // Tip Errors (2xx)
    // =================================================================
    /// A referenced tip is missing, already completed, earmarked for a
    /// different identifier, or repeated within the batch.
    #[error("TO_ERR_200: Not your tip: {tip_id} ({reason})")]
    NotYourTip { tip_id: TipId, reason: String },

    /// A read referenced a tip id that was never assigned.
    #[error("TO_ERR_201: Tip not found: {0}")]
    TipNotFound(TipId),

    /// The tip being created failed validation.
    #[error("TO_ERR_202: Invalid tip: {reason}")]
    InvalidTip { reason: String },

    /// A completed tip cannot be completed again.
    #[error("TO_ERR_203: Tip already completed: {0}")]
    TipAlreadyCompleted(TipId),

    /// The request itself is unusable (empty batch, too many ids, ...).
    #[error("TO_ERR_204: Invalid request: {reason}")]
    InvalidRequest { reason: String },

    // =================================================================
    // Asset / Transfer Errors (3xx)
    // =================================================================
    /// An asset leg could not be moved (insufficient balance or
    /// allowance, or the recipient rejected it).
    #[error("TO_ERR_300: Transfer failed for {asset}: {reason}")]
    TransferFailure { asset: String, reason: String },

    /// Summing amounts overflowed 128 bits.
    #[error("TO_ERR_301: Amount overflow while {context}")]
    AmountOverflow { context: String },

    /// Custody holds less than outstanding commitments (critical alert).
    #[error("TO_ERR_302: Solvency invariant violation: {reason}")]
    SolvencyViolation { reason: String },

    // =================================================================
    // Access Control Errors (4xx)
    // =================================================================
    /// The caller is not the administrator.
    #[error("TO_ERR_400: Unauthorized caller {caller}")]
    Unauthorized { caller: Address },

    // =================================================================
    // Storage / Configuration Errors (5xx)
    // =================================================================
    /// A snapshot was written by an incompatible storage layout.
    #[error("TO_ERR_500: Storage schema version mismatch: expected {expected}, got {actual}")]
    StorageVersionMismatch { expected: u32, actual: u32 },

    /// Serialization / deserialization error.
    #[error("TO_ERR_501: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("TO_ERR_502: Configuration error: {0}")]
    Configuration(String),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TO_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Assets moved but the ledger could not be brought back in line with
    /// the bank (a failed revert, or a failed write after transfers
    /// committed). The instance must stop accepting mutations.
    #[error("TO_ERR_901: Inconsistent state: {reason}")]
    InconsistentState { reason: String },

    /// The instance was halted by an earlier inconsistency.
    #[error("TO_ERR_902: Instance halted: {reason}")]
    Halted { reason: String },
}

/// Contract-level classification of a [`TipOfferError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAttestation,
    NotYourTip,
    TransferFailure,
    Unauthorized,
    InvalidRequest,
    Internal,
}

impl TipOfferError {
    /// Classify this error into the kinds surfaced to callers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAttestation { .. } => ErrorKind::InvalidAttestation,
            Self::NotYourTip { .. } | Self::TipAlreadyCompleted(_) => ErrorKind::NotYourTip,
            Self::TransferFailure { .. } | Self::AmountOverflow { .. } => {
                ErrorKind::TransferFailure
            }
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::TipNotFound(_) | Self::InvalidTip { .. } | Self::InvalidRequest { .. } => {
                ErrorKind::InvalidRequest
            }
            Self::SolvencyViolation { .. }
            | Self::StorageVersionMismatch { .. }
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Internal(_)
            | Self::InconsistentState { .. }
            | Self::Halted { .. } => ErrorKind::Internal,
        }
    }

    /// Whether this error leaves ledger and bank out of step.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InconsistentState { .. })
    }

    /// Wrap an error raised after assets already moved.
    pub fn after_commit(context: &str, err: &Self) -> Self {
        Self::InconsistentState {
            reason: format!("{context}: {err}"),
        }
    }

    /// Shorthand for building an [`TipOfferError::InvalidAttestation`].
    pub fn invalid_attestation(reason: impl Into<String>) -> Self {
        Self::InvalidAttestation {
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TipOfferError>;

impl From<serde_json::Error> for TipOfferError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
