//! # tipoffer-attestation
//!
//! Identifier attestations for the **TipOffer** escrow.
//!
//! An attestation is a two-level signature chain:
//!
//! ```text
//! root authority ──signs──▶ issuer certificate (issuer key, validity)
//!                                   │
//!                  issuer key ──signs──▶ statement (identifier, subject, validity)
//! ```
//!
//! The escrow trusts a single hard-coded root key and, at any time, exactly
//! one issuer address (the configured attestor). [`AttestationVerifier`]
//! checks the chain and yields the verified [`tipoffer_types::Attestation`].
//!
//! All signatures are ed25519 over domain-separated payloads.

pub mod codec;
pub mod issuer;
pub mod verifier;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fixtures;

pub use codec::{IdentifierStatement, IssuerCertificate, SignedAttestation};
pub use issuer::{AttestationIssuer, RootAuthority, unlimited_validity};
pub use verifier::AttestationVerifier;
