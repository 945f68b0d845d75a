//! System-wide constants for the TipOffer escrow.

/// Denominator for fee factors expressed in basis points.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Highest accepted fee factor (100%).
pub const MAX_FEE_BPS: u32 = BPS_DENOMINATOR;

/// Fee factor applied when the configuration does not set one.
pub const DEFAULT_FEE_BPS: u32 = 0;

/// Maximum identifier length in bytes (fits the attestation `str16` field).
pub const DEFAULT_MAX_IDENTIFIER_LEN: usize = 1024;

/// Maximum token entries accepted in a single tip.
pub const DEFAULT_MAX_TOKENS_PER_TIP: usize = 32;

/// Maximum tip ids accepted in a single collect call.
pub const DEFAULT_MAX_TIPS_PER_COLLECT: usize = 256;

/// Current version of the persisted ledger layout.
pub const STORAGE_SCHEMA_VERSION: u32 = 1;

/// Magic prefix of every encoded attestation.
pub const ATTESTATION_MAGIC: &[u8; 4] = b"TOAT";

/// Attestation wire format version.
pub const ATTESTATION_WIRE_VERSION: u8 = 1;

/// Domain tag for root signatures over issuer certificates.
pub const ISSUER_CERT_DOMAIN: &[u8] = b"tipoffer:issuer-cert:v1:";

/// Domain tag for issuer signatures over identifier statements.
pub const IDENTIFIER_STATEMENT_DOMAIN: &[u8] = b"tipoffer:identifier-attestation:v1:";

/// Public key of the root authority that certifies attestor keys.
pub const ROOT_AUTHORITY_KEY_HEX: &str =
    "c85e5898a0f6635bb66250ccc78414a07d7647088e162483d67ef0d85f29f3ac";

/// Issuer name carried in certificates minted by the root authority.
pub const DEFAULT_ISSUER_NAME: &str = "CN=attestation.id";

/// Unix timestamp of 9999-12-31T23:59:59Z, used as "no expiry".
pub const UNLIMITED_VALIDITY_SECS: i64 = 253_402_300_799;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "TipOffer";
