//! Verified attestation claims.
//!
//! An [`Attestation`] is what remains of an attestation blob after its
//! signature chain has been checked: the identifier, the address it is
//! bound to, who issued it, and when it is valid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Address;

/// The verified content of an identifier attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// Real-world identity being attested (e.g. `"https://twitter.com/handle 1234"`).
    pub identifier: String,
    /// Address the identity is bound to; settlement pays this address.
    pub subject: Address,
    /// Address of the issuer key that signed the statement.
    pub issuer: Address,
    /// Start of the validity window (inclusive).
    pub not_before: DateTime<Utc>,
    /// End of the validity window (inclusive).
    pub not_after: DateTime<Utc>,
}

impl Attestation {
    /// Whether `now` lies within `[not_before, not_after]`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }
}
