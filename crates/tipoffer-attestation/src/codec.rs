//! Attestation wire format.
//!
//! The envelope is protobuf, encoded with `prost`:
//!
//! ```text
//! message Attestation {
//!   bytes  magic       = 1;  // "TOAT"
//!   uint32 version     = 2;
//!   IssuerCertificate certificate = 3;
//!   IdentifierStatement statement = 4;
//! }
//! message IssuerCertificate {
//!   uint64 serial = 1; string issuer_name = 2; bytes issuer_key = 3;   // 32 bytes
//!   int64 not_before = 4; int64 not_after = 5; bytes root_signature = 6; // 64 bytes
//! }
//! message IdentifierStatement {
//!   string identifier = 1; bytes subject = 2;                           // 20 bytes
//!   int64 not_before = 3; int64 not_after = 4; bytes issuer_signature = 5; // 64 bytes
//! }
//! ```
//!
//! Signatures never cover protobuf bytes. They cover the canonical,
//! domain-tagged body built by `signing_payload`:
//!
//! ```text
//! cert_body = serial u64 | issuer_name str16 | issuer_key[32] | not_before i64 | not_after i64
//! stmt_body = identifier str16 | subject[20] | not_before i64 | not_after i64
//! str16     = len u16 | utf-8
//! ```
//!
//! Decoding is strict: the blob must be the canonical encoding of its own
//! decoded envelope, so unknown fields, duplicates and trailing bytes are
//! rejected. Decoding only checks structure; signatures are checked by
//! [`crate::AttestationVerifier`].

use chrono::{DateTime, Utc};
use prost::Message;
use tipoffer_types::{Address, Result, TipOfferError, constants};

// ---------------------------------------------------------------------------
// Protobuf envelope
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
struct AttestationProto {
    #[prost(bytes = "vec", tag = "1")]
    magic: Vec<u8>,
    #[prost(uint32, tag = "2")]
    version: u32,
    #[prost(message, optional, tag = "3")]
    certificate: Option<CertificateProto>,
    #[prost(message, optional, tag = "4")]
    statement: Option<StatementProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct CertificateProto {
    #[prost(uint64, tag = "1")]
    serial: u64,
    #[prost(string, tag = "2")]
    issuer_name: String,
    #[prost(bytes = "vec", tag = "3")]
    issuer_key: Vec<u8>,
    #[prost(int64, tag = "4")]
    not_before: i64,
    #[prost(int64, tag = "5")]
    not_after: i64,
    #[prost(bytes = "vec", tag = "6")]
    root_signature: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct StatementProto {
    #[prost(string, tag = "1")]
    identifier: String,
    #[prost(bytes = "vec", tag = "2")]
    subject: Vec<u8>,
    #[prost(int64, tag = "3")]
    not_before: i64,
    #[prost(int64, tag = "4")]
    not_after: i64,
    #[prost(bytes = "vec", tag = "5")]
    issuer_signature: Vec<u8>,
}

/// Issuer certificate: the root authority vouching for an issuer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerCertificate {
    pub serial: u64,
    pub issuer_name: String,
    /// Raw ed25519 public key of the issuer.
    pub issuer_key: [u8; 32],
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Root authority's ed25519 signature over [`Self::signing_payload`].
    pub root_signature: [u8; 64],
}

impl IssuerCertificate {
    /// Canonical body bytes covered by the root signature.
    pub fn body_bytes(&self) -> Result<Vec<u8>> {
        let mut w = Writer::default();
        w.u64(self.serial);
        w.str16(&self.issuer_name)?;
        w.bytes(&self.issuer_key);
        w.i64(self.not_before.timestamp());
        w.i64(self.not_after.timestamp());
        Ok(w.finish())
    }

    /// `"tipoffer:issuer-cert:v1:" || body`.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let mut payload = constants::ISSUER_CERT_DOMAIN.to_vec();
        payload.extend_from_slice(&self.body_bytes()?);
        Ok(payload)
    }

    /// Address derived from the certified issuer key.
    #[must_use]
    pub fn issuer_address(&self) -> Address {
        Address::from_public_key(&self.issuer_key)
    }

    fn to_proto(&self) -> CertificateProto {
        CertificateProto {
            serial: self.serial,
            issuer_name: self.issuer_name.clone(),
            issuer_key: self.issuer_key.to_vec(),
            not_before: self.not_before.timestamp(),
            not_after: self.not_after.timestamp(),
            root_signature: self.root_signature.to_vec(),
        }
    }

    fn from_proto(proto: CertificateProto) -> Result<Self> {
        Ok(Self {
            serial: proto.serial,
            issuer_name: proto.issuer_name,
            issuer_key: fixed(&proto.issuer_key, "issuer_key")?,
            not_before: timestamp(proto.not_before)?,
            not_after: timestamp(proto.not_after)?,
            root_signature: fixed(&proto.root_signature, "root_signature")?,
        })
    }
}

/// Leaf statement: the issuer binding an identifier to a subject address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierStatement {
    pub identifier: String,
    pub subject: Address,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Issuer's ed25519 signature over [`Self::signing_payload`].
    pub issuer_signature: [u8; 64],
}

impl IdentifierStatement {
    /// Canonical body bytes covered by the issuer signature.
    pub fn body_bytes(&self) -> Result<Vec<u8>> {
        let mut w = Writer::default();
        w.str16(&self.identifier)?;
        w.bytes(self.subject.as_bytes());
        w.i64(self.not_before.timestamp());
        w.i64(self.not_after.timestamp());
        Ok(w.finish())
    }

    /// `"tipoffer:identifier-attestation:v1:" || body`.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let mut payload = constants::IDENTIFIER_STATEMENT_DOMAIN.to_vec();
        payload.extend_from_slice(&self.body_bytes()?);
        Ok(payload)
    }

    fn to_proto(&self) -> StatementProto {
        StatementProto {
            identifier: self.identifier.clone(),
            subject: self.subject.as_bytes().to_vec(),
            not_before: self.not_before.timestamp(),
            not_after: self.not_after.timestamp(),
            issuer_signature: self.issuer_signature.to_vec(),
        }
    }

    fn from_proto(proto: StatementProto) -> Result<Self> {
        Ok(Self {
            identifier: proto.identifier,
            subject: Address(fixed(&proto.subject, "subject")?),
            not_before: timestamp(proto.not_before)?,
            not_after: timestamp(proto.not_after)?,
            issuer_signature: fixed(&proto.issuer_signature, "issuer_signature")?,
        })
    }
}

/// A complete attestation: certificate chain plus leaf statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAttestation {
    pub certificate: IssuerCertificate,
    pub statement: IdentifierStatement,
}

impl SignedAttestation {
    /// Encode to the wire format.
    ///
    /// # Errors
    /// Fails if a string field is too long to appear in a signing payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.certificate.body_bytes()?;
        self.statement.body_bytes()?;
        Ok(self.to_proto().encode_to_vec())
    }

    /// Decode from the wire format.
    ///
    /// # Errors
    /// Returns [`TipOfferError::InvalidAttestation`] for any structural
    /// problem: protobuf decode failure, bad magic or version, a missing
    /// section, wrong fixed-size field lengths, out-of-range timestamps, or
    /// a non-canonical encoding.
    pub fn decode(blob: &[u8]) -> Result<Self> {
        let proto = AttestationProto::decode(blob).map_err(malformed)?;
        if proto.encode_to_vec() != blob {
            return Err(malformed("non-canonical encoding"));
        }
        if proto.magic != constants::ATTESTATION_MAGIC {
            return Err(malformed("bad magic"));
        }
        if proto.version != u32::from(constants::ATTESTATION_WIRE_VERSION) {
            return Err(malformed(format!("unsupported version {}", proto.version)));
        }
        let certificate = proto
            .certificate
            .ok_or_else(|| malformed("missing certificate"))?;
        let statement = proto
            .statement
            .ok_or_else(|| malformed("missing statement"))?;
        Ok(Self {
            certificate: IssuerCertificate::from_proto(certificate)?,
            statement: IdentifierStatement::from_proto(statement)?,
        })
    }

    fn to_proto(&self) -> AttestationProto {
        AttestationProto {
            magic: constants::ATTESTATION_MAGIC.to_vec(),
            version: u32::from(constants::ATTESTATION_WIRE_VERSION),
            certificate: Some(self.certificate.to_proto()),
            statement: Some(self.statement.to_proto()),
        }
    }
}

fn malformed(reason: impl std::fmt::Display) -> TipOfferError {
    TipOfferError::invalid_attestation(format!("malformed blob: {reason}"))
}

fn fixed<const N: usize>(raw: &[u8], field: &str) -> Result<[u8; N]> {
    <[u8; N]>::try_from(raw)
        .map_err(|_| malformed(format!("{field} is {} bytes, expected {N}", raw.len())))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| malformed(format!("timestamp {secs} out of range")))
}

// ---------------------------------------------------------------------------
// Signing-payload writer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    fn str16(&mut self, s: &str) -> Result<()> {
        let len = u16::try_from(s.len())
            .map_err(|_| malformed(format!("string of {} bytes exceeds u16", s.len())))?;
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn sample() -> SignedAttestation {
        SignedAttestation {
            certificate: IssuerCertificate {
                serial: 1,
                issuer_name: constants::DEFAULT_ISSUER_NAME.into(),
                issuer_key: [3u8; 32],
                not_before: ts(1_632_530_000),
                not_after: ts(constants::UNLIMITED_VALIDITY_SECS),
                root_signature: [4u8; 64],
            },
            statement: IdentifierStatement {
                identifier: "https://twitter.com/zhangweiwu 205521676".into(),
                subject: "0x7a181cb7250776e16783f9d3c9166de0f95ab283".parse().unwrap(),
                not_before: ts(1_632_530_000),
                not_after: ts(constants::UNLIMITED_VALIDITY_SECS),
                issuer_signature: [5u8; 64],
            },
        }
    }

    fn assert_malformed(blob: &[u8]) {
        let err = SignedAttestation::decode(blob).unwrap_err();
        assert!(
            matches!(&err, TipOfferError::InvalidAttestation { reason } if reason.starts_with("malformed")),
            "Expected malformed InvalidAttestation, got: {err:?}"
        );
    }

    #[test]
    fn encode_then_decode() {
        let att = sample();
        let blob = att.encode().unwrap();
        // field 1, length 4, magic
        assert_eq!(&blob[..6], b"\x0a\x04TOAT");
        assert_eq!(SignedAttestation::decode(&blob).unwrap(), att);
    }

    #[test]
    fn empty_blob_rejected() {
        assert_malformed(&[]);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut blob = sample().encode().unwrap();
        blob[2] = b'X';
        assert_malformed(&blob);
    }

    #[test]
    fn unknown_version_rejected() {
        let mut blob = sample().encode().unwrap();
        // field 2 varint follows the magic
        assert_eq!(blob[6], 0x10);
        blob[7] = 9;
        assert_malformed(&blob);
    }

    #[test]
    fn every_truncation_rejected() {
        let blob = sample().encode().unwrap();
        for len in 0..blob.len() {
            assert_malformed(&blob[..len]);
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut blob = sample().encode().unwrap();
        blob.push(0);
        assert_malformed(&blob);
    }

    #[test]
    fn unknown_trailing_field_rejected() {
        let mut blob = sample().encode().unwrap();
        // field 15, varint 1: skipped by a lenient decoder
        blob.extend_from_slice(&[0x78, 0x01]);
        assert_malformed(&blob);
    }

    #[test]
    fn duplicated_statement_rejected() {
        let att = sample();
        let mut blob = att.encode().unwrap();
        let extra = AttestationProto {
            statement: Some(att.statement.to_proto()),
            ..AttestationProto::default()
        };
        blob.extend_from_slice(&extra.encode_to_vec());
        assert_malformed(&blob);
    }

    #[test]
    fn missing_statement_rejected() {
        let mut proto = sample().to_proto();
        proto.statement = None;
        assert_malformed(&proto.encode_to_vec());
    }

    #[test]
    fn swapped_sections_rejected() {
        let mut proto = sample().to_proto();
        proto.certificate = None;
        let mut blob = proto.encode_to_vec();
        let tail = AttestationProto {
            certificate: Some(sample().certificate.to_proto()),
            ..AttestationProto::default()
        };
        blob.extend_from_slice(&tail.encode_to_vec());
        assert_malformed(&blob);
    }

    #[test]
    fn short_issuer_key_rejected() {
        let mut proto = sample().to_proto();
        if let Some(cert) = proto.certificate.as_mut() {
            cert.issuer_key.pop();
        }
        assert_malformed(&proto.encode_to_vec());
    }

    #[test]
    fn long_subject_rejected() {
        let mut proto = sample().to_proto();
        if let Some(statement) = proto.statement.as_mut() {
            statement.subject.push(0);
        }
        assert_malformed(&proto.encode_to_vec());
    }

    #[test]
    fn out_of_range_timestamp_rejected() {
        let mut proto = sample().to_proto();
        if let Some(statement) = proto.statement.as_mut() {
            statement.not_after = i64::MAX;
        }
        assert_malformed(&proto.encode_to_vec());
    }

    #[test]
    fn invalid_utf8_identifier_rejected() {
        let mut att = sample();
        att.statement.identifier = "ab".into();
        let mut blob = att.encode().unwrap();
        let pos = blob
            .windows(2)
            .rposition(|w| w == b"ab")
            .expect("identifier bytes present");
        blob[pos] = 0xff;
        assert_malformed(&blob);
    }

    #[test]
    fn signing_payloads_are_domain_separated() {
        let att = sample();
        let cert = att.certificate.signing_payload().unwrap();
        let stmt = att.statement.signing_payload().unwrap();
        assert!(cert.starts_with(constants::ISSUER_CERT_DOMAIN));
        assert!(stmt.starts_with(constants::IDENTIFIER_STATEMENT_DOMAIN));
    }

    #[test]
    fn oversized_identifier_cannot_be_encoded() {
        let mut att = sample();
        att.statement.identifier = "x".repeat(usize::from(u16::MAX) + 1);
        assert!(att.encode().is_err());
    }
}
