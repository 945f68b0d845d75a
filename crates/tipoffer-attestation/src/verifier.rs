//! Attestation verification.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. Structure: the blob decodes ([`SignedAttestation::decode`])
//! 2. Root signature: the issuer certificate is signed by the hard-coded root
//! 3. Certificate window: `now` lies within the certificate's validity
//! 4. Attestor: the certified issuer key is the currently configured attestor
//! 5. Issuer signature: the statement is signed by the certified issuer key
//! 6. Statement window: `now` lies within the statement's validity
//!
//! Every failure is reported as [`TipOfferError::InvalidAttestation`].

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, VerifyingKey};
use tipoffer_types::{Address, Attestation, IssuerConfig, Result, TipOfferError, constants};

use crate::codec::SignedAttestation;

/// Verifies identifier attestations against a fixed root authority.
#[derive(Debug, Clone)]
pub struct AttestationVerifier {
    root: VerifyingKey,
}

impl AttestationVerifier {
    /// Verifier anchored at the production root authority
    /// ([`constants::ROOT_AUTHORITY_KEY_HEX`]).
    pub fn hard_coded() -> Result<Self> {
        let raw = hex::decode(constants::ROOT_AUTHORITY_KEY_HEX)
            .map_err(|e| TipOfferError::Configuration(format!("root authority key: {e}")))?;
        let bytes: [u8; 32] = raw.try_into().map_err(|_| {
            TipOfferError::Configuration("root authority key must be 32 bytes".into())
        })?;
        let root = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| TipOfferError::Configuration(format!("root authority key: {e}")))?;
        Ok(Self { root })
    }

    /// Verifier anchored at an explicit root key.
    #[must_use]
    pub fn with_root(root: VerifyingKey) -> Self {
        Self { root }
    }

    /// The root key this verifier trusts.
    #[must_use]
    pub fn root_key(&self) -> &VerifyingKey {
        &self.root
    }

    /// Parse and verify `blob` for the attestor configured in `issuer`.
    ///
    /// # Errors
    /// Returns [`TipOfferError::InvalidAttestation`] if any check fails.
    pub fn verify(
        &self,
        blob: &[u8],
        issuer: &IssuerConfig,
        now: DateTime<Utc>,
    ) -> Result<Attestation> {
        let result = self.verify_inner(blob, issuer, now);
        match &result {
            Ok(att) => tracing::debug!(
                identifier = %att.identifier,
                subject = %att.subject,
                issuer = %att.issuer,
                "attestation verified"
            ),
            Err(err) => tracing::warn!(
                attestor = %issuer.attestor,
                error = %err,
                "attestation rejected"
            ),
        }
        result
    }

    fn verify_inner(
        &self,
        blob: &[u8],
        issuer: &IssuerConfig,
        now: DateTime<Utc>,
    ) -> Result<Attestation> {
        let SignedAttestation {
            certificate,
            statement,
        } = SignedAttestation::decode(blob)?;

        // 2. Root signature over the issuer certificate.
        let root_signature = Signature::from_bytes(&certificate.root_signature);
        self.root
            .verify_strict(&certificate.signing_payload()?, &root_signature)
            .map_err(|_| {
                TipOfferError::invalid_attestation("issuer certificate not signed by root authority")
            })?;

        // 3. Certificate window.
        if now < certificate.not_before || now > certificate.not_after {
            return Err(TipOfferError::invalid_attestation(format!(
                "issuer certificate not valid at {now} (window {} .. {})",
                certificate.not_before, certificate.not_after
            )));
        }

        // 4. Certified key must be the configured attestor.
        let issuer_address = certificate.issuer_address();
        if issuer_address != issuer.attestor {
            return Err(TipOfferError::invalid_attestation(format!(
                "issued by {issuer_address}, expected attestor {}",
                issuer.attestor
            )));
        }

        // 5. Issuer signature over the statement.
        let issuer_key = VerifyingKey::from_bytes(&certificate.issuer_key)
            .map_err(|_| TipOfferError::invalid_attestation("issuer key is not a valid point"))?;
        let issuer_signature = Signature::from_bytes(&statement.issuer_signature);
        issuer_key
            .verify_strict(&statement.signing_payload()?, &issuer_signature)
            .map_err(|_| {
                TipOfferError::invalid_attestation("identifier statement signature does not verify")
            })?;

        // 6. Statement window.
        let attestation = Attestation {
            identifier: statement.identifier,
            subject: statement.subject,
            issuer: issuer_address,
            not_before: statement.not_before,
            not_after: statement.not_after,
        };
        if !attestation.is_valid_at(now) {
            return Err(TipOfferError::invalid_attestation(format!(
                "attestation not valid at {now} (window {} .. {})",
                attestation.not_before, attestation.not_after
            )));
        }

        Ok(attestation)
    }

    /// Address of the root key (for diagnostics).
    #[must_use]
    pub fn root_address(&self) -> Address {
        Address::from_public_key(self.root.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use ed25519_dalek::SigningKey;

    use super::*;
    use crate::issuer::{AttestationIssuer, RootAuthority};

    const HANDLE: &str = "https://twitter.com/zhangweiwu 205521676";

    struct Fixture {
        root: RootAuthority,
        issuer: AttestationIssuer,
        verifier: AttestationVerifier,
        config: IssuerConfig,
        subject: Address,
    }

    fn fixture() -> Fixture {
        let root = RootAuthority::from_seed([1u8; 32]);
        let issuer_key = SigningKey::from_bytes(&[2u8; 32]);
        let issuer = root.issuer(issuer_key, 1, Utc::now() - Duration::days(1), None).unwrap();
        let verifier = AttestationVerifier::with_root(root.verifying_key());
        let config = IssuerConfig {
            admin: Address::random(),
            attestor: issuer.address(),
        };
        Fixture {
            root,
            issuer,
            verifier,
            config,
            subject: Address::random(),
        }
    }

    fn expect_invalid(result: Result<Attestation>, needle: &str) {
        match result {
            Err(TipOfferError::InvalidAttestation { reason }) => {
                assert!(reason.contains(needle), "reason {reason:?} lacks {needle:?}");
            }
            other => panic!("Expected InvalidAttestation, got: {other:?}"),
        }
    }

    #[test]
    fn hard_coded_root_parses() {
        let verifier = AttestationVerifier::hard_coded().unwrap();
        assert_eq!(
            hex::encode(verifier.root_key().as_bytes()),
            constants::ROOT_AUTHORITY_KEY_HEX
        );
        assert!(!verifier.root_address().is_zero());
    }

    #[test]
    fn valid_attestation_verifies() {
        let f = fixture();
        let blob = f.issuer.issue_unlimited(HANDLE, f.subject, Utc::now()).unwrap();
        let att = f.verifier.verify(&blob, &f.config, Utc::now()).unwrap();
        assert_eq!(att.identifier, HANDLE);
        assert_eq!(att.subject, f.subject);
        assert_eq!(att.issuer, f.config.attestor);
    }

    #[test]
    fn garbage_is_malformed() {
        let f = fixture();
        expect_invalid(f.verifier.verify(b"\x30\x82\x02\x6a", &f.config, Utc::now()), "malformed");
    }

    #[test]
    fn tampered_identifier_fails_issuer_signature() {
        // Correct chain, but the identifier was swapped for an imposter's.
        let f = fixture();
        let blob = f.issuer.issue_unlimited(HANDLE, f.subject, Utc::now()).unwrap();
        let mut att = SignedAttestation::decode(&blob).unwrap();
        att.statement.identifier = "https://twitter.com/zhangweiwu 205521677".into();
        let forged = att.encode().unwrap();
        expect_invalid(f.verifier.verify(&forged, &f.config, Utc::now()), "statement signature");
    }

    #[test]
    fn tampered_subject_fails_issuer_signature() {
        let f = fixture();
        let blob = f.issuer.issue_unlimited(HANDLE, f.subject, Utc::now()).unwrap();
        let mut att = SignedAttestation::decode(&blob).unwrap();
        att.statement.subject = Address::random();
        let forged = att.encode().unwrap();
        expect_invalid(f.verifier.verify(&forged, &f.config, Utc::now()), "statement signature");
    }

    #[test]
    fn self_signed_certificate_rejected() {
        // An issuer that certifies itself instead of going through the root.
        let f = fixture();
        let rogue_root = RootAuthority::from_seed([9u8; 32]);
        let rogue = rogue_root
            .issuer(SigningKey::from_bytes(&[2u8; 32]), 1, Utc::now() - Duration::days(1), None)
            .unwrap();
        let blob = rogue.issue_unlimited(HANDLE, f.subject, Utc::now()).unwrap();
        expect_invalid(f.verifier.verify(&blob, &f.config, Utc::now()), "root authority");
    }

    #[test]
    fn wrong_attestor_rejected() {
        let f = fixture();
        let other = f
            .root
            .issuer(SigningKey::from_bytes(&[3u8; 32]), 2, Utc::now() - Duration::days(1), None)
            .unwrap();
        let blob = other.issue_unlimited(HANDLE, f.subject, Utc::now()).unwrap();
        expect_invalid(f.verifier.verify(&blob, &f.config, Utc::now()), "expected attestor");
    }

    #[test]
    fn rotated_attestor_accepted() {
        let f = fixture();
        let other = f
            .root
            .issuer(SigningKey::from_bytes(&[3u8; 32]), 2, Utc::now() - Duration::days(1), None)
            .unwrap();
        let config = IssuerConfig {
            admin: f.config.admin,
            attestor: other.address(),
        };
        let blob = other.issue_unlimited(HANDLE, f.subject, Utc::now()).unwrap();
        assert!(f.verifier.verify(&blob, &config, Utc::now()).is_ok());
        // The previous attestor's attestations stop verifying.
        let old = f.issuer.issue_unlimited(HANDLE, f.subject, Utc::now()).unwrap();
        expect_invalid(f.verifier.verify(&old, &config, Utc::now()), "expected attestor");
    }

    #[test]
    fn expired_statement_rejected() {
        let f = fixture();
        let now = Utc::now();
        let blob = f
            .issuer
            .issue(HANDLE, f.subject, now - Duration::hours(2), now - Duration::hours(1))
            .unwrap();
        expect_invalid(f.verifier.verify(&blob, &f.config, now), "attestation not valid");
    }

    #[test]
    fn not_yet_valid_statement_rejected() {
        let f = fixture();
        let now = Utc::now();
        let blob = f
            .issuer
            .issue(HANDLE, f.subject, now + Duration::hours(1), now + Duration::hours(2))
            .unwrap();
        expect_invalid(f.verifier.verify(&blob, &f.config, now), "attestation not valid");
        // The same blob becomes valid once its window opens.
        assert!(
            f.verifier
                .verify(&blob, &f.config, now + Duration::minutes(90))
                .is_ok()
        );
    }

    #[test]
    fn expired_certificate_rejected() {
        let f = fixture();
        let now = Utc::now();
        let short_lived = f
            .root
            .issuer(
                SigningKey::from_bytes(&[2u8; 32]),
                3,
                now - Duration::days(10),
                Some(now - Duration::days(1)),
            )
            .unwrap();
        let blob = short_lived.issue_unlimited(HANDLE, f.subject, now - Duration::days(5)).unwrap();
        expect_invalid(f.verifier.verify(&blob, &f.config, now), "issuer certificate not valid");
    }
}
