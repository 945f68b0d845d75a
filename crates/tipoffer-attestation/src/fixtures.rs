//! Deterministic attestation chain for tests and local tooling.
//!
//! Only compiled with `cfg(test)` or the `test-helpers` feature.

use chrono::{Duration, Utc};
use ed25519_dalek::SigningKey;
use tipoffer_types::{Address, Result};

use crate::{AttestationIssuer, AttestationVerifier, RootAuthority};

const ROOT_SEED: [u8; 32] = [0x11; 32];
const ISSUER_SEED: [u8; 32] = [0x22; 32];

/// A root authority plus one certified issuer, both from fixed seeds.
#[derive(Debug)]
pub struct TestAuthority {
    pub root: RootAuthority,
    pub issuer: AttestationIssuer,
}

impl TestAuthority {
    pub fn new() -> Result<Self> {
        let root = RootAuthority::from_seed(ROOT_SEED);
        let issuer = root.issuer(
            SigningKey::from_bytes(&ISSUER_SEED),
            1,
            Utc::now() - Duration::days(1),
            None,
        )?;
        Ok(Self { root, issuer })
    }

    /// Another issuer certified by the same root, for rotation tests.
    pub fn second_issuer(&self, seed: [u8; 32]) -> Result<AttestationIssuer> {
        self.root.issuer(
            SigningKey::from_bytes(&seed),
            2,
            Utc::now() - Duration::days(1),
            None,
        )
    }

    /// Verifier anchored at this authority's root.
    #[must_use]
    pub fn verifier(&self) -> AttestationVerifier {
        AttestationVerifier::with_root(self.root.verifying_key())
    }

    #[must_use]
    pub fn attestor_address(&self) -> Address {
        self.issuer.address()
    }

    /// Unlimited attestation binding `identifier` to `subject`, valid from
    /// one minute ago.
    pub fn attest(&self, identifier: &str, subject: Address) -> Result<Vec<u8>> {
        self.issuer
            .issue_unlimited(identifier, subject, Utc::now() - Duration::minutes(1))
    }
}
