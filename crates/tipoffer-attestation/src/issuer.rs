//! Issuing side of the attestation chain.
//!
//! [`RootAuthority`] certifies issuer keys; an [`AttestationIssuer`] holds a
//! certified key and signs identifier statements with it. Production only
//! ever ships the root's public half, so these types exist for operators
//! running an attestation service and for tests.

use chrono::{DateTime, SubsecRound, Utc};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use tipoffer_types::{Address, Result, TipOfferError, constants};

use crate::codec::{IdentifierStatement, IssuerCertificate, SignedAttestation};

/// Far-future timestamp standing in for "no expiry".
pub fn unlimited_validity() -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(constants::UNLIMITED_VALIDITY_SECS, 0)
        .ok_or_else(|| TipOfferError::Internal("unlimited validity out of range".into()))
}

// ---------------------------------------------------------------------------
// RootAuthority
// ---------------------------------------------------------------------------

/// The trust anchor. Signs issuer certificates.
pub struct RootAuthority {
    signing_key: SigningKey,
    issuer_name: String,
}

impl RootAuthority {
    /// Root authority from a 32-byte ed25519 seed.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
            issuer_name: constants::DEFAULT_ISSUER_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_issuer_name(mut self, name: impl Into<String>) -> Self {
        self.issuer_name = name.into();
        self
    }

    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    #[must_use]
    pub fn address(&self) -> Address {
        Address::from_public_key(self.signing_key.verifying_key().as_bytes())
    }

    /// Sign a certificate for `issuer_key`. `not_after = None` means
    /// unlimited validity.
    pub fn certify(
        &self,
        issuer_key: &VerifyingKey,
        serial: u64,
        not_before: DateTime<Utc>,
        not_after: Option<DateTime<Utc>>,
    ) -> Result<IssuerCertificate> {
        let not_after = match not_after {
            Some(t) => t.trunc_subsecs(0),
            None => unlimited_validity()?,
        };
        let mut cert = IssuerCertificate {
            serial,
            issuer_name: self.issuer_name.clone(),
            issuer_key: issuer_key.to_bytes(),
            not_before: not_before.trunc_subsecs(0),
            not_after,
            root_signature: [0u8; 64],
        };
        cert.root_signature = self.signing_key.sign(&cert.signing_payload()?).to_bytes();
        tracing::info!(
            serial,
            issuer = %cert.issuer_address(),
            not_after = %cert.not_after,
            "issuer certificate signed"
        );
        Ok(cert)
    }

    /// Certify `signing_key` and wrap it as a ready-to-use issuer.
    pub fn issuer(
        &self,
        signing_key: SigningKey,
        serial: u64,
        not_before: DateTime<Utc>,
        not_after: Option<DateTime<Utc>>,
    ) -> Result<AttestationIssuer> {
        let certificate =
            self.certify(&signing_key.verifying_key(), serial, not_before, not_after)?;
        AttestationIssuer::new(signing_key, certificate)
    }
}

impl std::fmt::Debug for RootAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootAuthority")
            .field("address", &self.address())
            .field("issuer_name", &self.issuer_name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// AttestationIssuer
// ---------------------------------------------------------------------------

/// A certified issuer key that signs identifier statements.
pub struct AttestationIssuer {
    signing_key: SigningKey,
    certificate: IssuerCertificate,
}

impl AttestationIssuer {
    /// Pair a signing key with its certificate. The certificate must be for
    /// this key.
    pub fn new(signing_key: SigningKey, certificate: IssuerCertificate) -> Result<Self> {
        if signing_key.verifying_key().to_bytes() != certificate.issuer_key {
            return Err(TipOfferError::Configuration(
                "certificate does not certify this signing key".into(),
            ));
        }
        Ok(Self {
            signing_key,
            certificate,
        })
    }

    /// Attestor address to configure on the escrow.
    #[must_use]
    pub fn address(&self) -> Address {
        self.certificate.issuer_address()
    }

    #[must_use]
    pub fn certificate(&self) -> &IssuerCertificate {
        &self.certificate
    }

    /// Bind `identifier` to `subject` for `[not_before, not_after]` and
    /// return the encoded blob. Times are truncated to whole seconds.
    pub fn issue(
        &self,
        identifier: &str,
        subject: Address,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Result<Vec<u8>> {
        let mut statement = IdentifierStatement {
            identifier: identifier.to_string(),
            subject,
            not_before: not_before.trunc_subsecs(0),
            not_after: not_after.trunc_subsecs(0),
            issuer_signature: [0u8; 64],
        };
        statement.issuer_signature = self
            .signing_key
            .sign(&statement.signing_payload()?)
            .to_bytes();
        tracing::debug!(
            identifier,
            subject = %subject,
            issuer = %self.address(),
            "attestation issued"
        );
        SignedAttestation {
            certificate: self.certificate.clone(),
            statement,
        }
        .encode()
    }

    /// Issue with no expiry.
    pub fn issue_unlimited(
        &self,
        identifier: &str,
        subject: Address,
        not_before: DateTime<Utc>,
    ) -> Result<Vec<u8>> {
        self.issue(identifier, subject, not_before, unlimited_validity()?)
    }
}

impl std::fmt::Debug for AttestationIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationIssuer")
            .field("address", &self.address())
            .field("serial", &self.certificate.serial)
            .finish_non_exhaustive()
    }
}
