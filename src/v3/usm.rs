//! USM security parameters (RFC 3414 §2.4).
//!
//! Carried as an OCTET STRING wrapping:
//!
//! ```text
//! SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING (SIZE(0..32)),
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{AuthErrorKind, DecodeErrorKind, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsmSecurityParams {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub username: Bytes,
    /// Truncated HMAC, or empty for noAuthNoPriv.
    pub auth_params: Bytes,
    /// Salt, or empty without privacy.
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32, username: Bytes) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            username,
            ..Self::default()
        }
    }

    /// All-empty parameters for the discovery request.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Zero-filled authentication field of the protocol's MAC length,
    /// overwritten once the whole message is serialized.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    pub fn with_priv_params(mut self, priv_params: Bytes) -> Self {
        self.priv_params = priv_params;
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(96);
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_integer(clamp_to_i32(self.engine_time));
            buf.push_integer(clamp_to_i32(self.engine_boots));
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut outer = Decoder::new(data);
        let mut seq = outer.read_sequence()?;
        outer.finish()?;

        let engine_id = seq.read_octet_string()?;
        let engine_boots = read_non_negative(&mut seq)?;
        let engine_time = read_non_negative(&mut seq)?;
        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;
        seq.finish()?;

        Ok(Self {
            engine_id,
            engine_boots,
            engine_time,
            username,
            auth_params,
            priv_params,
        })
    }
}

fn clamp_to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn read_non_negative(seq: &mut Decoder) -> Result<u32> {
    let offset = seq.offset();
    let value = seq.read_integer()?;
    u32::try_from(value).map_err(|_| Error::decode(offset, DecodeErrorKind::NegativeValue))
}

/// Locate msgAuthenticationParameters inside a whole serialized v3 message.
///
/// Returns the absolute offset and length of the field's contents, which
/// is where the HMAC is spliced in on send and read back on receive.
pub fn find_auth_params_offset(message: &[u8]) -> Result<(usize, usize)> {
    let not_found = |_| Error::auth(None, AuthErrorKind::AuthParamsNotFound);

    let mut outer = Decoder::from_slice(message);
    let mut msg = outer.read_sequence().map_err(not_found)?;
    msg.skip_tlv().map_err(not_found)?; // msgVersion
    msg.skip_tlv().map_err(not_found)?; // msgGlobalData

    let params_len = msg.expect_tag(tag::universal::OCTET_STRING).map_err(not_found)?;
    let mut params = msg.sub_decoder(params_len).map_err(not_found)?;
    let mut usm = params.read_sequence().map_err(not_found)?;
    for _ in 0..4 {
        usm.skip_tlv().map_err(not_found)?;
    }
    let len = usm.expect_tag(tag::universal::OCTET_STRING).map_err(not_found)?;
    let offset = usm.offset();
    if offset + len > message.len() {
        return Err(Error::auth(None, AuthErrorKind::AuthParamsNotFound));
    }
    Ok((offset, len))
}
