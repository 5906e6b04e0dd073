//! SNMP message wrappers.
//!
//! - [`CommunityMessage`]: v1/v2c with a community string
//! - [`V3Message`]: v3 with USM security parameters

mod community;
mod v3;

pub use community::CommunityMessage;
pub use v3::{
    MsgFlags, MsgGlobalData, SECURITY_MODEL_USM, ScopedPdu, SecurityLevel, V3Message,
    V3MessageData,
};

use crate::ber::Decoder;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::version::Version;
use bytes::Bytes;

/// Largest message sent or accepted: the UDP payload limit over IPv4.
pub const MSG_MAX_SIZE: usize = 65507;

/// Decoded SNMP message of any version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Community(CommunityMessage),
    V3(V3Message),
}

impl Message {
    pub fn version(&self) -> Version {
        match self {
            Message::Community(m) => m.version,
            Message::V3(_) => Version::V3,
        }
    }

    /// The PDU, or `None` while a v3 payload is still encrypted.
    pub fn pdu(&self) -> Option<&Pdu> {
        match self {
            Message::Community(m) => Some(&m.pdu),
            Message::V3(m) => m.scoped_pdu().map(|s| &s.pdu),
        }
    }

    /// Decode one datagram.
    ///
    /// The outer SEQUENCE must span the buffer exactly: a declared length
    /// shorter or longer than the datagram is an error.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        decoder.finish()?;

        let version_offset = seq.offset();
        let version_num = seq.read_integer()?;
        let version = Version::from_i32(version_num).ok_or_else(|| {
            Error::decode(version_offset, DecodeErrorKind::UnknownVersion(version_num))
        })?;

        let msg = match version {
            Version::V1 | Version::V2c => {
                Message::Community(CommunityMessage::decode_from_sequence(&mut seq, version)?)
            }
            Version::V3 => Message::V3(V3Message::decode_from_sequence(&mut seq)?),
        };
        seq.finish()?;
        Ok(msg)
    }
}

impl From<CommunityMessage> for Message {
    fn from(msg: CommunityMessage) -> Self {
        Message::Community(msg)
    }
}

impl From<V3Message> for Message {
    fn from(msg: V3Message) -> Self {
        Message::V3(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn sample() -> Vec<u8> {
        CommunityMessage::new(
            Version::V2c,
            Bytes::from_static(b"public"),
            Pdu::get_request(5, &[oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)]),
        )
        .encode()
        .to_vec()
    }

    #[test]
    fn envelope_longer_than_buffer_is_rejected() {
        let mut bytes = sample();
        bytes[1] += 1;
        assert!(Message::decode(Bytes::from(bytes)).is_err());
    }

    #[test]
    fn envelope_shorter_than_buffer_is_rejected() {
        let mut bytes = sample();
        bytes.push(0x00);
        assert!(matches!(
            Message::decode(Bytes::from(bytes)).unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::TrailingData { count: 1 },
                ..
            }
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = sample();
        bytes[4] = 2;
        assert!(matches!(
            Message::decode(Bytes::from(bytes)).unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::UnknownVersion(2),
                ..
            }
        ));
    }

    #[test]
    fn truncated_input_never_panics() {
        let bytes = sample();
        for end in 0..bytes.len() {
            assert!(Message::decode(Bytes::copy_from_slice(&bytes[..end])).is_err());
        }
    }
}
