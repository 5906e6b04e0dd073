//! Protocol Data Units.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type, identified on the wire by its context-specific tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    TrapV1,
    GetBulkRequest,
    InformRequest,
    TrapV2,
    Report,
}

impl PduType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            tag::pdu::GET_REQUEST => Self::GetRequest,
            tag::pdu::GET_NEXT_REQUEST => Self::GetNextRequest,
            tag::pdu::RESPONSE => Self::Response,
            tag::pdu::SET_REQUEST => Self::SetRequest,
            tag::pdu::TRAP_V1 => Self::TrapV1,
            tag::pdu::GET_BULK_REQUEST => Self::GetBulkRequest,
            tag::pdu::INFORM_REQUEST => Self::InformRequest,
            tag::pdu::TRAP_V2 => Self::TrapV2,
            tag::pdu::REPORT => Self::Report,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        match self {
            Self::GetRequest => tag::pdu::GET_REQUEST,
            Self::GetNextRequest => tag::pdu::GET_NEXT_REQUEST,
            Self::Response => tag::pdu::RESPONSE,
            Self::SetRequest => tag::pdu::SET_REQUEST,
            Self::TrapV1 => tag::pdu::TRAP_V1,
            Self::GetBulkRequest => tag::pdu::GET_BULK_REQUEST,
            Self::InformRequest => tag::pdu::INFORM_REQUEST,
            Self::TrapV2 => tag::pdu::TRAP_V2,
            Self::Report => tag::pdu::REPORT,
        }
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::SetRequest => "SetRequest",
            Self::TrapV1 => "Trap",
            Self::GetBulkRequest => "GetBulkRequest",
            Self::InformRequest => "InformRequest",
            Self::TrapV2 => "SNMPv2-Trap",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// A request or response PDU.
///
/// GETBULK shares the layout of every other PDU: its non-repeaters and
/// max-repetitions travel in the error-status and error-index slots.
/// The v1 Trap-PDU has a different layout and is never built or parsed
/// here; its tag is recognised only so it can be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    fn request(pdu_type: PduType, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetRequest, request_id, oids)
    }

    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetNextRequest, request_id, oids)
    }

    pub fn get_bulk(request_id: i32, non_repeaters: u8, max_repetitions: u8, oids: &[Oid]) -> Self {
        Self {
            error_status: i32::from(non_repeaters),
            error_index: i32::from(max_repetitions),
            ..Self::request(PduType::GetBulkRequest, request_id, oids)
        }
    }

    /// Non-repeaters, for a GETBULK.
    pub fn non_repeaters(&self) -> Option<i32> {
        (self.pdu_type == PduType::GetBulkRequest).then_some(self.error_status)
    }

    /// Max-repetitions, for a GETBULK.
    pub fn max_repetitions(&self) -> Option<i32> {
        (self.pdu_type == PduType::GetBulkRequest).then_some(self.error_index)
    }

    pub fn is_error(&self) -> bool {
        self.pdu_type != PduType::GetBulkRequest && self.error_status != 0
    }

    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// OID of the binding named by a 1-based error-index, if in range.
    pub fn error_oid(&self) -> Option<Oid> {
        let index = usize::try_from(self.error_index).ok()?.checked_sub(1)?;
        self.varbinds.get(index).map(|vb| vb.oid.clone())
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let start = decoder.offset();
        let tag = decoder.read_tag()?;
        let pdu_type = PduType::from_tag(tag)
            .filter(|t| *t != PduType::TrapV1)
            .ok_or_else(|| Error::decode(start, DecodeErrorKind::UnknownPduType(tag)))?;
        let len = decoder.read_length()?;
        let mut body = decoder.sub_decoder(len)?;

        let request_id = body.read_integer()?;
        let error_status = body.read_integer()?;
        let error_index = body.read_integer()?;
        let varbinds = decode_varbind_list(&mut body)?;
        body.finish()?;

        Ok(Self {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}
