//! SNMPv3 message format (RFC 3412).
//!
//! ```text
//! SEQUENCE {
//!     INTEGER version (3)
//!     SEQUENCE msgGlobalData { msgID, msgMaxSize, msgFlags, msgSecurityModel }
//!     OCTET STRING msgSecurityParameters (USM, see crate::v3::usm)
//!     ScopedPDU, or OCTET STRING holding an encrypted ScopedPDU
//! }
//! ```

use bytes::Bytes;

use super::MSG_MAX_SIZE;
use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::v3::UsmSecurityParams;

/// User-based Security Model (RFC 3414); the only model spoken here.
pub const SECURITY_MODEL_USM: i32 = 3;

/// Smallest msgMaxSize any engine may advertise (RFC 3412).
const MSG_MAX_SIZE_MINIMUM: i32 = 484;

const FLAG_AUTH: u8 = 0x01;
const FLAG_PRIV: u8 = 0x02;
const FLAG_REPORTABLE: u8 = 0x04;

/// SNMPv3 security level, ordered from least to most secure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    /// Decode the auth/priv bits. Privacy without authentication is invalid.
    pub fn from_flags(flags: u8) -> Option<Self> {
        match (flags & FLAG_AUTH != 0, flags & FLAG_PRIV != 0) {
            (false, false) => Some(Self::NoAuthNoPriv),
            (true, false) => Some(Self::AuthNoPriv),
            (true, true) => Some(Self::AuthPriv),
            (false, true) => None,
        }
    }

    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0,
            Self::AuthNoPriv => FLAG_AUTH,
            Self::AuthPriv => FLAG_AUTH | FLAG_PRIV,
        }
    }

    pub fn requires_auth(self) -> bool {
        self >= Self::AuthNoPriv
    }

    pub fn requires_priv(self) -> bool {
        self == Self::AuthPriv
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoAuthNoPriv => "noAuthNoPriv",
            Self::AuthNoPriv => "authNoPriv",
            Self::AuthPriv => "authPriv",
        })
    }
}

impl std::str::FromStr for SecurityLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "noauthnopriv" => Ok(Self::NoAuthNoPriv),
            "authnopriv" => Ok(Self::AuthNoPriv),
            "authpriv" => Ok(Self::AuthPriv),
            _ => Err(Error::Config(format!("unknown security level {s:?}"))),
        }
    }
}

/// msgFlags (RFC 3412 §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    /// Whether the receiver may answer with a Report PDU.
    pub reportable: bool,
}

impl MsgFlags {
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut flags = self.security_level.to_flags();
        if self.reportable {
            flags |= FLAG_REPORTABLE;
        }
        flags
    }
}

/// msgGlobalData header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgGlobalData {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub msg_flags: MsgFlags,
}

impl MsgGlobalData {
    pub fn new(msg_id: i32, msg_flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size: MSG_MAX_SIZE as i32,
            msg_flags,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(SECURITY_MODEL_USM);
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let start = seq.offset();

        let msg_id = seq.read_integer()?;
        if msg_id < 0 {
            return Err(Error::decode(start, DecodeErrorKind::NegativeValue));
        }

        let size_offset = seq.offset();
        let msg_max_size = seq.read_integer()?;
        if msg_max_size < MSG_MAX_SIZE_MINIMUM {
            return Err(Error::decode(
                size_offset,
                DecodeErrorKind::MsgMaxSizeTooSmall {
                    value: msg_max_size,
                    minimum: MSG_MAX_SIZE_MINIMUM,
                },
            ));
        }

        let flags_offset = seq.offset();
        let flags = seq.read_octet_string()?;
        let security_level = match flags.as_ref() {
            [byte] => SecurityLevel::from_flags(*byte),
            _ => None,
        }
        .ok_or_else(|| Error::decode(flags_offset, DecodeErrorKind::InvalidMsgFlags))?;
        let msg_flags = MsgFlags::new(security_level, flags[0] & FLAG_REPORTABLE != 0);

        let model_offset = seq.offset();
        let model = seq.read_integer()?;
        if model != SECURITY_MODEL_USM {
            return Err(Error::decode(
                model_offset,
                DecodeErrorKind::UnknownSecurityModel(model),
            ));
        }
        seq.finish()?;

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags,
        })
    }
}

/// contextEngineID, contextName and the PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedPdu {
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: Pdu,
}

impl ScopedPdu {
    pub fn new(context_engine_id: Bytes, pdu: Pdu) -> Self {
        Self {
            context_engine_id,
            context_name: Bytes::new(),
            pdu,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    /// Standalone encoding, the plaintext that gets encrypted for authPriv.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        seq.finish()?;
        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }

    /// Decode decrypted plaintext.
    ///
    /// DES pads to the block size, so octets after the SEQUENCE are
    /// tolerated here and nowhere else.
    pub fn decode_decrypted(plaintext: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(plaintext);
        Self::decode(&mut decoder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum V3MessageData {
    Plaintext(ScopedPdu),
    /// Ciphertext of a ScopedPDU (authPriv).
    Encrypted(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Message {
    pub global_data: MsgGlobalData,
    /// Encoded USM parameters.
    pub security_params: Bytes,
    pub data: V3MessageData,
}

impl V3Message {
    pub fn new(global_data: MsgGlobalData, security_params: Bytes, scoped_pdu: ScopedPdu) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Plaintext(scoped_pdu),
        }
    }

    pub fn new_encrypted(global_data: MsgGlobalData, security_params: Bytes, encrypted: Bytes) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Encrypted(encrypted),
        }
    }

    /// Engine discovery request (RFC 3414 §4): noAuthNoPriv, reportable,
    /// empty USM parameters and an empty GET.
    pub fn discovery_request(msg_id: i32) -> Self {
        Self::new(
            MsgGlobalData::new(msg_id, MsgFlags::new(SecurityLevel::NoAuthNoPriv, true)),
            UsmSecurityParams::empty().encode(),
            ScopedPdu::new(Bytes::new(), Pdu::get_request(msg_id, &[])),
        )
    }

    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.global_data.msg_flags.security_level
    }

    pub fn scoped_pdu(&self) -> Option<&ScopedPdu> {
        match &self.data {
            V3MessageData::Plaintext(scoped) => Some(scoped),
            V3MessageData::Encrypted(_) => None,
        }
    }

    /// Serialize. Authenticated messages must already carry a zero-filled
    /// authentication field in `security_params`; the digest is spliced in
    /// afterwards.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(512);
        buf.push_sequence(|buf| {
            match &self.data {
                V3MessageData::Plaintext(scoped) => scoped.encode(buf),
                V3MessageData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }
            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(3);
        });
        buf.finish()
    }

    /// Decode the fields after the version, from the message sequence.
    pub(crate) fn decode_from_sequence(seq: &mut Decoder) -> Result<Self> {
        let global_data = MsgGlobalData::decode(seq)?;
        let security_params = seq.read_octet_string()?;

        let data_offset = seq.offset();
        let data = match (global_data.msg_flags.security_level.requires_priv(), seq.peek_tag()) {
            (true, Some(crate::ber::tag::universal::OCTET_STRING)) => {
                V3MessageData::Encrypted(seq.read_octet_string()?)
            }
            (true, _) => {
                return Err(Error::decode(data_offset, DecodeErrorKind::ExpectedEncryption));
            }
            (false, Some(crate::ber::tag::universal::OCTET_STRING)) => {
                return Err(Error::decode(data_offset, DecodeErrorKind::UnexpectedEncryption));
            }
            (false, _) => V3MessageData::Plaintext(ScopedPdu::decode(seq)?),
        };

        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }
}
