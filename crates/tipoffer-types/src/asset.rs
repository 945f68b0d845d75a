//! Asset model: native currency and fungible tokens named by contract address.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Address;

/// Something the escrow can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Asset {
    /// The chain's native currency, counted in its smallest unit.
    Native,
    /// A fungible token identified by its contract address.
    Token(Address),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Token(address) => write!(f, "token:{address}"),
        }
    }
}

/// One token leg of a tip: contract, amount, and opaque auxiliary data
/// supplied by the funder (carried through, never interpreted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentToken {
    /// Token contract address.
    pub token: Address,
    /// Amount in the token's smallest unit. Always > 0 once stored.
    #[serde(with = "crate::amount")]
    pub amount: u128,
    /// Auxiliary bytes (authorisation blob in the funding instruction).
    #[serde(default)]
    pub aux_data: Vec<u8>,
}

impl PaymentToken {
    #[must_use]
    pub fn new(token: Address, amount: u128) -> Self {
        Self {
            token,
            amount,
            aux_data: vec![0x00],
        }
    }

    #[must_use]
    pub fn asset(&self) -> Asset {
        Asset::Token(self.token)
    }
}
