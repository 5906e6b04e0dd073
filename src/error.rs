//! Error types.
//!
//! One [`Error`] enum covers the whole client. Errors raised while talking
//! to an agent carry its address where it is known; failures inside the
//! codec and the USM layer carry a small `*ErrorKind` naming what went wrong.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::oid::Oid;

pub type Result<T> = std::result::Result<T, Error>;

/// Why a v3 message failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Recomputed HMAC differs from the one received.
    HmacMismatch,
    /// msgAuthenticationParameters is not the protocol's MAC length.
    WrongMacLength { expected: usize, actual: usize },
    AuthParamsNotFound,
    /// Reply came back at a lower security level than the request.
    SecurityLevelDowngrade,
    /// Report: `usmStatsWrongDigests`.
    WrongDigest,
    /// Report: `usmStatsUnknownUserNames`.
    UnknownUser,
    /// Report: `usmStatsUnsupportedSecLevels`.
    UnsupportedSecurityLevel,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HmacMismatch => f.write_str("message digest does not match"),
            Self::WrongMacLength { expected, actual } => {
                write!(f, "authentication parameters are {actual} bytes, want {expected}")
            }
            Self::AuthParamsNotFound => f.write_str("msgAuthenticationParameters not found"),
            Self::SecurityLevelDowngrade => f.write_str("reply security level below request"),
            Self::WrongDigest => f.write_str("agent rejected our digest (wrong password?)"),
            Self::UnknownUser => f.write_str("agent does not know this user"),
            Self::UnsupportedSecurityLevel => {
                f.write_str("agent does not support this security level")
            }
        }
    }
}

/// Why privacy (encryption or decryption) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorKind {
    /// Encrypted reply but no privacy passphrase configured.
    NoPrivKey,
    InvalidKeyLength,
    /// msgPrivacyParameters must be exactly the salt length.
    InvalidPrivParamsLength { expected: usize, actual: usize },
    InvalidCiphertextLength { length: usize, block_size: usize },
    /// Report: `usmStatsDecryptionErrors`, or our own plaintext did not decode.
    AgentDecryptionError,
}

impl fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPrivKey => f.write_str("no privacy key configured"),
            Self::InvalidKeyLength => f.write_str("localized key too short for cipher"),
            Self::InvalidPrivParamsLength { expected, actual } => {
                write!(f, "privacy parameters are {actual} bytes, want {expected}")
            }
            Self::InvalidCiphertextLength { length, block_size } => {
                write!(f, "ciphertext of {length} bytes is not a multiple of {block_size}")
            }
            Self::AgentDecryptionError => f.write_str("decryption error"),
        }
    }
}

/// What the BER decoder rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    UnexpectedTag { expected: u8, actual: u8 },
    TruncatedData,
    IndefiniteLength,
    /// INTEGER longer than 4 octets, unsigned longer than 5, Counter64 longer than 9.
    IntegerOverflow,
    ZeroLengthInteger,
    InvalidOidEncoding,
    UnknownVersion(i32),
    UnknownPduType(u8),
    UnknownValueType(u8),
    ConstructedOctetString,
    /// Privacy flag set without authentication.
    InvalidMsgFlags,
    UnknownSecurityModel(i32),
    /// RFC 3412 puts the floor at 484 octets.
    MsgMaxSizeTooSmall { value: i32, minimum: i32 },
    InvalidNull,
    UnexpectedEncryption,
    ExpectedEncryption,
    InvalidIpAddressLength { length: usize },
    /// More than 4 length octets.
    LengthTooLong { octets: usize },
    LengthExceedsMax { length: usize, max: usize },
    InsufficientData { needed: usize, available: usize },
    /// Bytes left inside a constructed value, or after the envelope.
    TrailingData { count: usize },
    NegativeValue,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "tag 0x{actual:02X} where 0x{expected:02X} was expected")
            }
            Self::TruncatedData => f.write_str("truncated"),
            Self::IndefiniteLength => f.write_str("indefinite length"),
            Self::IntegerOverflow => f.write_str("integer too wide"),
            Self::ZeroLengthInteger => f.write_str("empty integer"),
            Self::InvalidOidEncoding => f.write_str("malformed OID"),
            Self::UnknownVersion(v) => write!(f, "SNMP version {v} not supported"),
            Self::UnknownPduType(t) => write!(f, "PDU tag 0x{t:02X} not recognised"),
            Self::UnknownValueType(t) => write!(f, "value tag 0x{t:02X} not recognised"),
            Self::ConstructedOctetString => f.write_str("constructed OCTET STRING"),
            Self::InvalidMsgFlags => f.write_str("msgFlags request privacy without authentication"),
            Self::UnknownSecurityModel(m) => write!(f, "security model {m} not supported"),
            Self::MsgMaxSizeTooSmall { value, minimum } => {
                write!(f, "msgMaxSize {value} below {minimum}")
            }
            Self::InvalidNull => f.write_str("NULL with content"),
            Self::UnexpectedEncryption => f.write_str("scoped PDU is encrypted"),
            Self::ExpectedEncryption => f.write_str("scoped PDU is not encrypted"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IpAddress of {length} bytes")
            }
            Self::LengthTooLong { octets } => write!(f, "length field of {octets} octets"),
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {length} above limit {max}")
            }
            Self::InsufficientData { needed, available } => {
                write!(f, "{needed} bytes needed, {available} left")
            }
            Self::TrailingData { count } => write!(f, "{count} bytes of trailing data"),
            Self::NegativeValue => f.write_str("negative value"),
        }
    }
}

/// What stopped a request from being serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    NoSecurityConfig,
    KeysNotDerived,
    MissingAuthParams,
}

impl fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoSecurityConfig => "no v3 security configured",
            Self::KeysNotDerived => "keys not localized yet",
            Self::MissingAuthParams => "authentication placeholder missing from encoded message",
        })
    }
}

/// Why a dotted or BER OID was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    Empty,
    /// Arc is not a decimal `u32`.
    InvalidArc,
    InvalidFirstArc(u32),
    InvalidSecondArc { first: u32, second: u32 },
    TooShort,
    TooManyArcs { count: usize, max: usize },
}

impl fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::InvalidArc => f.write_str("arc is not a number"),
            Self::InvalidFirstArc(v) => write!(f, "first arc {v} is not 0, 1 or 2"),
            Self::InvalidSecondArc { first, second } => {
                write!(f, "second arc {second} not allowed under {first}")
            }
            Self::TooShort => f.write_str("fewer than two arcs"),
            Self::TooManyArcs { count, max } => write!(f, "{count} arcs, limit is {max}"),
        }
    }
}

/// SNMP error status codes (RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Unknown/future error status code.
    Unknown(i32),
}

const STATUS_NAMES: [(ErrorStatus, &str); 19] = [
    (ErrorStatus::NoError, "noError"),
    (ErrorStatus::TooBig, "tooBig"),
    (ErrorStatus::NoSuchName, "noSuchName"),
    (ErrorStatus::BadValue, "badValue"),
    (ErrorStatus::ReadOnly, "readOnly"),
    (ErrorStatus::GenErr, "genErr"),
    (ErrorStatus::NoAccess, "noAccess"),
    (ErrorStatus::WrongType, "wrongType"),
    (ErrorStatus::WrongLength, "wrongLength"),
    (ErrorStatus::WrongEncoding, "wrongEncoding"),
    (ErrorStatus::WrongValue, "wrongValue"),
    (ErrorStatus::NoCreation, "noCreation"),
    (ErrorStatus::InconsistentValue, "inconsistentValue"),
    (ErrorStatus::ResourceUnavailable, "resourceUnavailable"),
    (ErrorStatus::CommitFailed, "commitFailed"),
    (ErrorStatus::UndoFailed, "undoFailed"),
    (ErrorStatus::AuthorizationError, "authorizationError"),
    (ErrorStatus::NotWritable, "notWritable"),
    (ErrorStatus::InconsistentName, "inconsistentName"),
];

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        usize::try_from(value)
            .ok()
            .and_then(|i| STATUS_NAMES.get(i))
            .map(|(status, _)| *status)
            .unwrap_or(Self::Unknown(value))
    }

    /// Convert to raw status code.
    pub fn as_i32(&self) -> i32 {
        if let Self::Unknown(code) = self {
            return *code;
        }
        STATUS_NAMES
            .iter()
            .position(|(status, _)| status == self)
            .map(|i| i as i32)
            .unwrap_or(-1)
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown({})", code),
            known => {
                let name = STATUS_NAMES
                    .iter()
                    .find(|(status, _)| status == known)
                    .map(|(_, name)| *name)
                    .unwrap_or("unknown");
                f.write_str(name)
            }
        }
    }
}

fn peer(target: &Option<SocketAddr>, prep: &str) -> String {
    target.map(|t| format!(" {prep} {t}")).unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Socket bind, send or receive failed.
    #[error("I/O error{}: {source}", peer(target, "talking to"))]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// Every attempt went unanswered. `request_id` is the id of the last one.
    #[error("no reply{} after {attempts} attempts in {elapsed:?} (last request id {request_id})", peer(target, "from"))]
    Timeout {
        target: Option<SocketAddr>,
        elapsed: Duration,
        request_id: i32,
        attempts: u32,
    },

    /// The agent answered with a non-zero error-status. `index` is 1-based;
    /// `oid` is the binding it points at, when there is one.
    #[error("agent{} returned {status} (index {index})", peer(target, "at"))]
    Snmp {
        target: Option<SocketAddr>,
        status: ErrorStatus,
        index: u32,
        oid: Option<Oid>,
    },

    #[error("invalid OID{}: {kind}", input.as_ref().map(|i| format!(" {i:?}")).unwrap_or_default())]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>,
    },

    #[error("cannot decode at byte {offset}: {kind}")]
    Decode { offset: usize, kind: DecodeErrorKind },

    #[error("cannot encode request: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// A reply matched the request but was not a Response (or Report for v3).
    #[error("unexpected PDU 0x{actual:02X}{}", peer(target, "from"))]
    UnexpectedPdu {
        target: Option<SocketAddr>,
        actual: u8,
    },

    #[error("request of {size} bytes is larger than {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// Report: `usmStatsUnknownEngineIDs` after discovery.
    #[error("agent{} does not recognise our engine id", peer(target, "at"))]
    UnknownEngineId { target: Option<SocketAddr> },

    /// Report: `usmStatsNotInTimeWindows`; retried after resynchronising.
    #[error("request outside the agent's time window{}", peer(target, "at"))]
    NotInTimeWindow { target: Option<SocketAddr> },

    #[error("authentication failed{}: {kind}", peer(target, "with"))]
    AuthenticationFailed {
        target: Option<SocketAddr>,
        kind: AuthErrorKind,
    },

    #[error("decryption failed{}: {kind}", peer(target, "with"))]
    DecryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    #[error("encryption failed: {kind}")]
    EncryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// The agent returned an OID at or before the walk cursor; following it
    /// could loop forever.
    #[error("walk went backwards: {current} does not follow {previous}")]
    NonIncreasingOid { previous: Oid, current: Oid },

    /// A sample could not be read as a number.
    #[error("cannot collect {key}: {reason}")]
    Collect { key: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    pub fn auth(target: Option<SocketAddr>, kind: AuthErrorKind) -> Self {
        Self::AuthenticationFailed { target, kind }
    }

    pub fn decrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::DecryptionFailed { target, kind }
    }

    pub fn encrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::EncryptionFailed { target, kind }
    }

    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Like [`Error::invalid_oid`], keeping the text that failed to parse.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    pub fn collect(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Collect {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// The agent this error concerns, if any.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Io { target, .. }
            | Self::Timeout { target, .. }
            | Self::Snmp { target, .. }
            | Self::UnexpectedPdu { target, .. }
            | Self::UnknownEngineId { target }
            | Self::NotInTimeWindow { target }
            | Self::AuthenticationFailed { target, .. }
            | Self::DecryptionFailed { target, .. }
            | Self::EncryptionFailed { target, .. } => *target,
            _ => None,
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
