//! Definite-form length octets.
//!
//! Short form holds lengths up to 127 in one octet. Long form sets the high bit
//! of the first octet to the count of big-endian length octets that follow.

use crate::error::{DecodeErrorKind, Error, Result};

/// Largest content length the decoder accepts.
///
/// Responses are bounded by msgMaxSize (65507 over UDP), so anything much
/// larger is corruption rather than data.
pub const MAX_LENGTH: usize = 2 * 1024 * 1024;

/// Encode a length for the reverse-writing [`EncodeBuf`](super::EncodeBuf).
///
/// Returns the octets in reverse order together with how many are valid.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut out = [0u8; 5];
    if len <= 0x7F {
        out[0] = len as u8;
        return (out, 1);
    }

    let mut remaining = len;
    let mut count = 0;
    while remaining > 0 && count < 4 {
        out[count] = (remaining & 0xFF) as u8;
        remaining >>= 8;
        count += 1;
    }
    out[count] = 0x80 | count as u8;
    (out, count + 1)
}

/// Decode a length starting at `data[0]`.
///
/// `offset` is the absolute position of `data[0]`, used only for error
/// reporting. Returns `(length, octets consumed)`.
pub fn decode_length(data: &[u8], offset: usize) -> Result<(usize, usize)> {
    let Some(&first) = data.first() else {
        return Err(Error::decode(offset, DecodeErrorKind::TruncatedData));
    };

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let octets = (first & 0x7F) as usize;
    if octets == 0 {
        tracing::debug!(target: "syno_snmp::ber", { snmp.offset = offset }, "indefinite length rejected");
        return Err(Error::decode(offset, DecodeErrorKind::IndefiniteLength));
    }
    if octets > 4 {
        return Err(Error::decode(
            offset,
            DecodeErrorKind::LengthTooLong { octets },
        ));
    }
    if data.len() < 1 + octets {
        return Err(Error::decode(offset, DecodeErrorKind::TruncatedData));
    }

    let len = data[1..=octets]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    if len > MAX_LENGTH {
        return Err(Error::decode(
            offset,
            DecodeErrorKind::LengthExceedsMax {
                length: len,
                max: MAX_LENGTH,
            },
        ));
    }

    Ok((len, 1 + octets))
}
