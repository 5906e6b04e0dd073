//! SNMP protocol version.

use crate::error::{Error, Result};

/// Wire version of a message. The BER value is `version - 1` for v1/v2c.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// SNMPv1 (RFC 1157). The exporter's default.
    #[default]
    V1,
    /// SNMPv2c (RFC 1901)
    V2c,
    /// SNMPv3 (RFC 3411-3418)
    V3,
}

impl Version {
    pub const fn as_i32(self) -> i32 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
            Version::V3 => 3,
        }
    }

    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Version::V1),
            1 => Some(Version::V2c),
            3 => Some(Version::V3),
            _ => None,
        }
    }

    /// GETBULK exists from v2c on; v1 walks with GETNEXT.
    pub const fn supports_bulk(self) -> bool {
        !matches!(self, Version::V1)
    }
}

impl std::str::FromStr for Version {
    type Err = Error;

    /// Accepts `1`, `2c` and `3`, with or without a `v` prefix.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        match lower.strip_prefix('v').unwrap_or(&lower) {
            "1" => Ok(Version::V1),
            "2c" | "2" => Ok(Version::V2c),
            "3" => Ok(Version::V3),
            _ => Err(Error::Config(format!("unknown SNMP version {s:?}"))),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::V1 => write!(f, "SNMPv1"),
            Version::V2c => write!(f, "SNMPv2c"),
            Version::V3 => write!(f, "SNMPv3"),
        }
    }
}
