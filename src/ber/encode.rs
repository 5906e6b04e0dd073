//! BER encoding.
//!
//! Content is written back to front so that each constructed value's length
//! is known by the time its header is written.

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;
use bytes::Bytes;

/// Reverse-writing encode buffer.
///
/// Callers push fields in *reverse* order: the last field of a SEQUENCE
/// first, then the one before it, and so on. [`finish`](Self::finish)
/// flips the buffer into wire order.
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Prepend raw octets, keeping their order in the final output.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    pub fn push_length(&mut self, len: usize) {
        let (bytes, count) = encode_length(len);
        self.buf.extend_from_slice(&bytes[..count]);
    }

    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Wrap whatever `f` pushes in a constructed TLV with the given tag.
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let start = self.len();
        f(self);
        let content_len = self.len() - start;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// INTEGER in minimal two's complement.
    pub fn push_integer(&mut self, value: i32) {
        let (arr, len) = minimal_signed(value);
        self.push_bytes(&arr[4 - len..]);
        self.push_length(len);
        self.push_tag(tag::universal::INTEGER);
    }

    /// Non-negative 32-bit value under an application tag (Counter32, Gauge32,
    /// TimeTicks), or under INTEGER for USM boots/time.
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let (arr, len) = minimal_unsigned(&value.to_be_bytes());
        self.push_bytes(&arr[arr.len() - len..]);
        self.push_length(len);
        self.push_tag(tag);
    }

    pub fn push_counter64(&mut self, value: u64) {
        let (arr, len) = minimal_unsigned(&value.to_be_bytes());
        self.push_bytes(&arr[arr.len() - len..]);
        self.push_length(len);
        self.push_tag(tag::application::COUNTER64);
    }

    /// Primitive value with caller-chosen tag and raw contents.
    pub fn push_tagged_bytes(&mut self, tag: u8, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag);
    }

    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_tagged_bytes(tag::universal::OCTET_STRING, data);
    }

    pub fn push_null(&mut self) {
        self.push_empty(tag::universal::NULL);
    }

    /// Zero-length primitive (NULL and the varbind exception markers).
    pub fn push_empty(&mut self, tag: u8) {
        self.push_length(0);
        self.push_tag(tag);
    }

    pub fn push_oid(&mut self, oid: &Oid) {
        let ber = oid.to_ber_smallvec();
        self.push_tagged_bytes(tag::universal::OBJECT_IDENTIFIER, &ber);
    }

    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_tagged_bytes(tag::application::IP_ADDRESS, &addr);
    }

    /// Flip into wire order.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal two's-complement octets of `value`; valid bytes are the last `len`.
#[inline]
fn minimal_signed(value: i32) -> ([u8; 4], usize) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 3 {
        let redundant = if value >= 0 {
            bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0
        } else {
            bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0
        };
        if !redundant {
            break;
        }
        start += 1;
    }
    (bytes, 4 - start)
}

/// Minimal unsigned octets with a 0x00 prefix when the top bit would read
/// as a sign. The result array is one octet longer than the input so the
/// prefix always fits; valid bytes are the last `len`.
#[inline]
fn minimal_unsigned<const N: usize>(bytes: &[u8; N]) -> ([u8; 9], usize) {
    let mut out = [0u8; 9];
    out[9 - N..].copy_from_slice(bytes);

    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(N - 1);
    let mut len = N - first_nonzero;
    if bytes[first_nonzero] & 0x80 != 0 {
        len += 1;
    }
    (out, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integer(value: i32) -> Vec<u8> {
        let mut buf = EncodeBuf::new();
        buf.push_integer(value);
        buf.finish().to_vec()
    }

    fn unsigned(value: u32) -> Vec<u8> {
        let mut buf = EncodeBuf::new();
        buf.push_unsigned32(tag::application::GAUGE32, value);
        buf.finish().to_vec()
    }

    #[test]
    fn integer_300_is_two_octets() {
        assert_eq!(integer(300), vec![0x02, 0x02, 0x01, 0x2C]);
    }

    #[test]
    fn integer_boundaries() {
        assert_eq!(integer(0), vec![0x02, 0x01, 0x00]);
        assert_eq!(integer(127), vec![0x02, 0x01, 0x7F]);
        assert_eq!(integer(128), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(integer(-1), vec![0x02, 0x01, 0xFF]);
        assert_eq!(integer(-128), vec![0x02, 0x01, 0x80]);
        assert_eq!(integer(-129), vec![0x02, 0x02, 0xFF, 0x7F]);
        assert_eq!(
            integer(i32::MIN),
            vec![0x02, 0x04, 0x80, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn unsigned_gets_sign_pad() {
        assert_eq!(unsigned(0), vec![0x42, 0x01, 0x00]);
        assert_eq!(unsigned(255), vec![0x42, 0x02, 0x00, 0xFF]);
        assert_eq!(unsigned(256), vec![0x42, 0x02, 0x01, 0x00]);
        assert_eq!(
            unsigned(u32::MAX),
            vec![0x42, 0x05, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn counter64_max() {
        let mut buf = EncodeBuf::new();
        buf.push_counter64(u64::MAX);
        let bytes = buf.finish();
        assert_eq!(bytes[0], 0x46);
        assert_eq!(bytes[1], 9);
        assert_eq!(bytes[2], 0x00);
        assert!(bytes[3..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn sequence_keeps_field_order() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_integer(2);
            buf.push_integer(1);
        });
        assert_eq!(
            &buf.finish()[..],
            &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]
        );
    }

    #[test]
    fn long_octet_string_uses_long_form_length() {
        let data = vec![0xAB; 130];
        let mut buf = EncodeBuf::new();
        buf.push_octet_string(&data);
        let bytes = buf.finish();
        assert_eq!(&bytes[..3], &[0x04, 0x81, 0x82]);
        assert_eq!(bytes.len(), 3 + 130);
    }
}
