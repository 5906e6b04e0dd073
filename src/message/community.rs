//! SNMPv1/v2c community message.
//!
//! ```text
//! SEQUENCE { INTEGER version, OCTET STRING community, PDU }
//! ```

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::pdu::Pdu;
use crate::version::Version;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityMessage {
    /// V1 or V2c.
    pub version: Version,
    /// Sent in clear; it is the only credential v1/v2c have.
    pub community: Bytes,
    pub pdu: Pdu,
}

impl CommunityMessage {
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });
        buf.finish()
    }

    /// Decode the fields after the version, from the message sequence.
    pub(crate) fn decode_from_sequence(seq: &mut Decoder, version: Version) -> Result<Self> {
        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(seq)?;
        Ok(Self {
            version,
            community,
            pdu,
        })
    }

    pub fn into_pdu(self) -> Pdu {
        self.pdu
    }
}
