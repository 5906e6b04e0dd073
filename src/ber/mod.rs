//! BER (Basic Encoding Rules) codec for the subset of X.690 that SNMP uses.
//!
//! Decoding is strict: definite lengths only, minimal-width integers, and no
//! octets left over inside a value.

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::{MAX_LENGTH, decode_length, encode_length};
