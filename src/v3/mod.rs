//! User-based Security Model (RFC 3414, RFC 3826, RFC 7860).
//!
//! Protocol selection lives here; the parameter codec, key localization,
//! HMAC, ciphers and engine bookkeeping live in the submodules.

pub mod auth;
mod engine;
mod privacy;
mod usm;

use std::fmt;
use std::str::FromStr;

pub use auth::LocalizedKey;
pub use engine::{EngineState, ReportKind, classify_report};
pub use privacy::{PrivKey, SaltCounter};
pub use usm::{UsmSecurityParams, find_auth_params_offset};

/// A protocol name that is not one of the supported spellings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProtocolError {
    input: String,
    what: &'static str,
    accepted: &'static str,
}

impl fmt::Display for ParseProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown {} protocol '{}' (accepted: {})",
            self.what, self.input, self.accepted
        )
    }
}

impl std::error::Error for ParseProtocolError {}

/// Case-insensitive lookup in a spelling table.
fn lookup<P: Copy>(
    table: &[(&str, P)],
    input: &str,
    what: &'static str,
    accepted: &'static str,
) -> Result<P, ParseProtocolError> {
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(input))
        .map(|(_, protocol)| *protocol)
        .ok_or_else(|| ParseProtocolError {
            input: input.to_string(),
            what,
            accepted,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    /// HMAC-MD5-96
    Md5,
    /// HMAC-SHA-96
    Sha1,
    /// HMAC-SHA-256-192
    Sha256,
}

const AUTH_NAMES: &[(&str, AuthProtocol)] = &[
    ("MD5", AuthProtocol::Md5),
    ("SHA", AuthProtocol::Sha1),
    ("SHA1", AuthProtocol::Sha1),
    ("SHA-1", AuthProtocol::Sha1),
    ("SHA256", AuthProtocol::Sha256),
    ("SHA-256", AuthProtocol::Sha256),
];

impl AuthProtocol {
    /// Hash output length; localized keys have this length too.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Truncated HMAC carried in msgAuthenticationParameters.
    pub fn mac_len(self) -> usize {
        match self {
            Self::Md5 | Self::Sha1 => 12,
            Self::Sha256 => 24,
        }
    }
}

impl fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA",
            Self::Sha256 => "SHA-256",
        })
    }
}

impl FromStr for AuthProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(AUTH_NAMES, s, "authentication", "MD5, SHA, SHA-256")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocol {
    /// DES-CBC. Still the default on older DSM releases.
    Des,
    /// AES-128-CFB
    Aes128,
}

const PRIV_NAMES: &[(&str, PrivProtocol)] = &[
    ("DES", PrivProtocol::Des),
    ("AES", PrivProtocol::Aes128),
    ("AES128", PrivProtocol::Aes128),
    ("AES-128", PrivProtocol::Aes128),
];

impl PrivProtocol {
    /// Localized key octets consumed. DES splits them into key and pre-IV.
    pub fn key_len(self) -> usize {
        16
    }

    /// msgPrivacyParameters length.
    pub fn salt_len(self) -> usize {
        8
    }
}

impl fmt::Display for PrivProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Des => "DES",
            Self::Aes128 => "AES",
        })
    }
}

impl FromStr for PrivProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(PRIV_NAMES, s, "privacy", "DES, AES")
    }
}
