//! Variable bindings.
//!
//! A VarBind pairs an OID with a value. Lists keep insertion order, which
//! is also transmission order.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::oid::Oid;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

impl VarBind {
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// Request binding: the OID with a NULL placeholder.
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.value.encode(buf);
            buf.push_oid(&self.oid);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let oid = seq.read_oid()?;
        let value = Value::decode(&mut seq)?;
        seq.finish()?;
        Ok(VarBind { oid, value })
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

pub fn encode_varbind_list(buf: &mut EncodeBuf, varbinds: &[VarBind]) {
    buf.push_sequence(|buf| {
        for vb in varbinds.iter().rev() {
            vb.encode(buf);
        }
    });
}

pub fn decode_varbind_list(decoder: &mut Decoder) -> Result<Vec<VarBind>> {
    let mut seq = decoder.read_sequence()?;
    let mut varbinds = Vec::new();
    while !seq.is_empty() {
        varbinds.push(VarBind::decode(&mut seq)?);
    }
    Ok(varbinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn null_binding_bytes() {
        let mut buf = EncodeBuf::new();
        VarBind::null(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).encode(&mut buf);
        assert_eq!(
            &buf.finish()[..],
            &[
                0x30, 0x0C, 0x06, 0x08, 0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, 0x05,
                0x00
            ]
        );
    }

    #[test]
    fn list_preserves_order() {
        let list = vec![
            VarBind::new(oid!(1, 3, 6, 1, 9), Value::Integer(1)),
            VarBind::new(oid!(1, 3, 6, 1, 2), Value::EndOfMibView),
            VarBind::new(oid!(1, 3, 6, 1, 5), Value::from("x")),
        ];
        let mut buf = EncodeBuf::new();
        encode_varbind_list(&mut buf, &list);
        let mut dec = Decoder::new(buf.finish());
        assert_eq!(decode_varbind_list(&mut dec).unwrap(), list);
        assert!(dec.is_empty());
    }

    #[test]
    fn empty_list() {
        let mut buf = EncodeBuf::new();
        encode_varbind_list(&mut buf, &[]);
        let bytes = buf.finish();
        assert_eq!(&bytes[..], &[0x30, 0x00]);
        assert!(decode_varbind_list(&mut Decoder::new(bytes)).unwrap().is_empty());
    }

    #[test]
    fn trailing_bytes_inside_binding_are_rejected() {
        // SEQUENCE { OID 1.3, NULL, NULL }
        let bytes = [0x30, 0x07, 0x06, 0x01, 0x2B, 0x05, 0x00, 0x05, 0x00];
        assert!(VarBind::decode(&mut Decoder::from_slice(&bytes)).is_err());
    }

    #[test]
    fn display() {
        let vb = VarBind::new(oid!(1, 3, 6, 1, 4, 1, 6574, 1, 2, 0), Value::Integer(41));
        assert_eq!(vb.to_string(), "1.3.6.1.4.1.6574.1.2.0 = 41");
    }
}
