//! Tag octets used by SNMP messages.
//!
//! Only single-octet tags occur in SNMP, so every tag is a plain `u8`:
//! class in bits 7-6, constructed flag in bit 5, number in bits 4-0.

/// Class bits.
pub mod class {
    pub const UNIVERSAL: u8 = 0x00;
    pub const APPLICATION: u8 = 0x40;
    pub const CONTEXT_SPECIFIC: u8 = 0x80;
}

/// Constructed flag.
pub const CONSTRUCTED: u8 = 0x20;

/// ASN.1 universal types.
pub mod universal {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    /// Segmented OCTET STRING. SNMP agents never send it; the decoder rejects it.
    pub const OCTET_STRING_CONSTRUCTED: u8 = 0x24;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
}

/// SMI application types (RFC 2578).
pub mod application {
    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    /// Gauge32 and Unsigned32 share a tag.
    pub const GAUGE32: u8 = 0x42;
    pub const TIMETICKS: u8 = 0x43;
    pub const OPAQUE: u8 = 0x44;
    pub const COUNTER64: u8 = 0x46;
}

/// Varbind exception markers (RFC 3416).
pub mod context {
    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;
}

/// PDU tags: context-specific, constructed, numbered 0..=8.
pub mod pdu {
    use super::CONSTRUCTED;
    use super::class::CONTEXT_SPECIFIC;

    pub const GET_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED;
    pub const GET_NEXT_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x01;
    pub const RESPONSE: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x02;
    pub const SET_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x03;
    pub const TRAP_V1: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x04;
    pub const GET_BULK_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x05;
    pub const INFORM_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x06;
    pub const TRAP_V2: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x07;
    pub const REPORT: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x08;
}

/// Class bits of a tag.
#[inline]
pub const fn tag_class(tag: u8) -> u8 {
    tag & 0xC0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdu_tags_match_wire_values() {
        assert_eq!(pdu::GET_REQUEST, 0xA0);
        assert_eq!(pdu::GET_NEXT_REQUEST, 0xA1);
        assert_eq!(pdu::RESPONSE, 0xA2);
        assert_eq!(pdu::GET_BULK_REQUEST, 0xA5);
        assert_eq!(pdu::REPORT, 0xA8);
    }

    #[test]
    fn class_of_application_and_context_tags() {
        assert_eq!(tag_class(application::COUNTER64), class::APPLICATION);
        assert_eq!(tag_class(context::END_OF_MIB_VIEW), class::CONTEXT_SPECIFIC);
        assert_eq!(tag_class(universal::SEQUENCE), class::UNIVERSAL);
    }
}
