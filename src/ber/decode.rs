//! BER decoding.
//!
//! The decoder borrows from a shared `Bytes` buffer, so octet strings and
//! nested sequences are zero-copy slices of the received datagram.

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// Cursor over a BER buffer.
///
/// Sub-decoders returned by [`read_sequence`](Self::read_sequence) and
/// friends remember where their slice began, so [`offset`](Self::offset)
/// is always absolute within the outermost buffer. USM uses that to locate
/// the authentication parameters inside a whole message.
pub struct Decoder {
    data: Bytes,
    pos: usize,
    base: usize,
}

impl Decoder {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Absolute offset of the next unread octet.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn fail(&self, kind: DecodeErrorKind) -> Error {
        tracing::debug!(target: "syno_snmp::ber", { snmp.offset = self.offset(), %kind }, "decode error");
        Error::decode(self.offset(), kind)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let Some(&byte) = self.data.get(self.pos) else {
            return Err(self.fail(DecodeErrorKind::TruncatedData));
        };
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_tag(&mut self) -> Result<u8> {
        self.read_byte()
    }

    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.pos..], self.offset())?;
        self.pos += consumed;
        Ok(len)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if len > self.remaining() {
            return Err(self.fail(DecodeErrorKind::InsufficientData {
                needed: len,
                available: self.remaining(),
            }));
        }
        let bytes = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(bytes)
    }

    /// Read a tag, check it, and return the following length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let actual = self.read_tag()?;
        if actual != expected {
            self.pos -= 1;
            if actual == tag::universal::OCTET_STRING_CONSTRUCTED
                && expected == tag::universal::OCTET_STRING
            {
                return Err(self.fail(DecodeErrorKind::ConstructedOctetString));
            }
            return Err(self.fail(DecodeErrorKind::UnexpectedTag { expected, actual }));
        }
        self.read_length()
    }

    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Contents of an INTEGER whose header is already consumed.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        match len {
            0 => return Err(self.fail(DecodeErrorKind::ZeroLengthInteger)),
            1..=4 => {}
            _ => return Err(self.fail(DecodeErrorKind::IntegerOverflow)),
        }
        let bytes = self.read_bytes(len)?;
        let init: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        Ok(bytes
            .iter()
            .fold(init, |acc, &b| (acc << 8) | i32::from(b)))
    }

    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        let len = self.expect_tag(expected_tag)?;
        self.read_unsigned32_value(len)
    }

    /// Contents of a Counter32/Gauge32/TimeTicks. Five octets are allowed
    /// only when the first is the 0x00 sign pad.
    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        let value = self.read_unsigned_value(len, 4)?;
        Ok(value as u32)
    }

    pub fn read_counter64_value(&mut self, len: usize) -> Result<u64> {
        self.read_unsigned_value(len, 8)
    }

    fn read_unsigned_value(&mut self, len: usize, width: usize) -> Result<u64> {
        if len == 0 {
            return Err(self.fail(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > width + 1 {
            return Err(self.fail(DecodeErrorKind::IntegerOverflow));
        }
        let start = self.offset();
        let bytes = self.read_bytes(len)?;
        if len == width + 1 && bytes[0] != 0 {
            return Err(Error::decode(start, DecodeErrorKind::IntegerOverflow));
        }
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }

    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(self.fail(DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let start = self.offset();
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes).map_err(|e| match e {
            Error::Decode { offset, kind } => Error::decode(start + offset, kind),
            other => other,
        })
    }

    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read a constructed value and return a decoder over its contents.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        self.sub_decoder(len)
    }

    /// Decoder over the next `len` octets.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let base = self.offset();
        let data = self.read_bytes(len)?;
        Ok(Decoder { data, pos: 0, base })
    }

    /// Skip one complete TLV of any type.
    pub fn skip_tlv(&mut self) -> Result<()> {
        self.read_tag()?;
        let len = self.read_length()?;
        self.read_bytes(len)?;
        Ok(())
    }

    /// Require that every octet was consumed.
    pub fn finish(&self) -> Result<()> {
        if !self.is_empty() {
            return Err(self.fail(DecodeErrorKind::TrailingData {
                count: self.remaining(),
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        let cases: &[(&[u8], i32)] = &[
            (&[0x02, 0x01, 0x00], 0),
            (&[0x02, 0x01, 0x7F], 127),
            (&[0x02, 0x02, 0x00, 0x80], 128),
            (&[0x02, 0x02, 0x01, 0x2C], 300),
            (&[0x02, 0x01, 0xFF], -1),
            (&[0x02, 0x02, 0xFF, 0x7F], -129),
        ];
        for (bytes, expected) in cases {
            let mut dec = Decoder::from_slice(bytes);
            assert_eq!(dec.read_integer().unwrap(), *expected);
            assert!(dec.is_empty());
        }
    }

    #[test]
    fn integer_longer_than_four_octets_is_rejected() {
        let mut dec = Decoder::from_slice(&[0x02, 0x05, 0x01, 0x00, 0x00, 0x00, 0x00]);
        let err = dec.read_integer().unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::IntegerOverflow,
                ..
            }
        ));
    }

    #[test]
    fn unsigned_with_sign_pad() {
        let mut dec = Decoder::from_slice(&[0x41, 0x05, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            dec.read_unsigned32(tag::application::COUNTER32).unwrap(),
            u32::MAX
        );

        let mut dec = Decoder::from_slice(&[0x41, 0x05, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(dec.read_unsigned32(tag::application::COUNTER32).is_err());
    }

    #[test]
    fn nested_offsets_are_absolute() {
        // SEQUENCE { OCTET STRING "ab" }
        let mut outer = Decoder::from_slice(&[0x30, 0x04, 0x04, 0x02, b'a', b'b']);
        let mut seq = outer.read_sequence().unwrap();
        assert_eq!(seq.offset(), 2);
        seq.expect_tag(tag::universal::OCTET_STRING).unwrap();
        assert_eq!(seq.offset(), 4);
    }

    #[test]
    fn declared_length_past_end_is_rejected() {
        let mut dec = Decoder::from_slice(&[0x04, 0x05, b'a', b'b']);
        assert!(matches!(
            dec.read_octet_string().unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::InsufficientData {
                    needed: 5,
                    available: 2
                },
                ..
            }
        ));
    }

    #[test]
    fn finish_reports_trailing_garbage() {
        let mut dec = Decoder::from_slice(&[0x05, 0x00, 0xDE, 0xAD]);
        dec.read_null().unwrap();
        assert!(matches!(
            dec.finish().unwrap_err(),
            Error::Decode {
                offset: 2,
                kind: DecodeErrorKind::TrailingData { count: 2 }
            }
        ));
    }

    #[test]
    fn constructed_octet_string_is_rejected() {
        let mut dec = Decoder::from_slice(&[0x24, 0x03, 0x04, 0x01, 0x41]);
        assert!(matches!(
            dec.read_octet_string().unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::ConstructedOctetString,
                ..
            }
        ));
    }

    #[test]
    fn null_with_content_is_rejected() {
        let mut dec = Decoder::from_slice(&[0x05, 0x01, 0x00]);
        assert!(dec.read_null().is_err());
    }
}
