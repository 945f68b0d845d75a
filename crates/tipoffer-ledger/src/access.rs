//! Administrator-gated configuration.
//!
//! The administrator is fixed at initialisation. The only thing it can
//! change is which attestor the escrow trusts; the change applies to
//! verifications made after it and never to tips already collected.

use tipoffer_types::{Address, Result, TipOfferError};

use crate::storage::LedgerStorage;

/// Access checks over the issuer configuration held in storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessControl;

impl AccessControl {
    /// Fail with `Unauthorized` unless `caller` is the administrator.
    pub fn ensure_admin(storage: &LedgerStorage, caller: Address) -> Result<()> {
        if caller == storage.issuer().admin {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, "admin-only call rejected");
            Err(TipOfferError::Unauthorized { caller })
        }
    }

    /// Replace the trusted attestor. Returns the previous one.
    ///
    /// # Errors
    /// - `Unauthorized` if `caller` is not the administrator
    /// - `InvalidRequest` if `attestor` is the zero address
    pub fn set_attestor(
        storage: &mut LedgerStorage,
        caller: Address,
        attestor: Address,
    ) -> Result<Address> {
        Self::ensure_admin(storage, caller)?;
        if attestor.is_zero() {
            return Err(TipOfferError::InvalidRequest {
                reason: "attestor must not be the zero address".into(),
            });
        }
        let previous = storage.issuer().attestor;
        storage.set_attestor(attestor);
        tracing::info!(previous = %previous, attestor = %attestor, "attestor rotated");
        Ok(previous)
    }

    #[must_use]
    pub fn admin(storage: &LedgerStorage) -> Address {
        storage.issuer().admin
    }

    #[must_use]
    pub fn attestor(storage: &LedgerStorage) -> Address {
        storage.issuer().attestor
    }
}
