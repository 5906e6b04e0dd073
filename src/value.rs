//! Typed varbind values.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;
use std::fmt;

/// Value carried by a variable binding.
///
/// `Gauge32` doubles as `Unsigned32`; the two share a wire tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Integer(i32),
    OctetString(Bytes),
    Null,
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    /// Hundredths of a second.
    TimeTicks(u32),
    Opaque(Bytes),
    Counter64(u64),
    /// The agent does not implement the object (v2c/v3 GET).
    NoSuchObject,
    /// The object exists but not this instance (v2c/v3 GET).
    NoSuchInstance,
    /// Nothing further in the agent's MIB view (GETNEXT/GETBULK).
    EndOfMibView,
    /// Primitive application or context type this crate does not model.
    Unknown { tag: u8, data: Bytes },
}

impl Value {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Any of the unsigned 32-bit kinds.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v),
            Value::Integer(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            other => other.as_u32().map(u64::from),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(data) | Value::Opaque(data) => Some(data),
            _ => None,
        }
    }

    /// Octet string contents when they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::OctetString(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    pub fn as_ip(&self) -> Option<std::net::Ipv4Addr> {
        match self {
            Value::IpAddress(addr) => Some(std::net::Ipv4Addr::from(*addr)),
            _ => None,
        }
    }

    /// Numeric value as `f64`, reading decimal text out of octet strings.
    ///
    /// UCD-SNMP reports load averages as strings such as `"0.42"`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(f64::from(*v)),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(f64::from(*v)),
            Value::Counter64(v) => Some(*v as f64),
            Value::OctetString(_) => self.as_str()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// `noSuchObject`, `noSuchInstance` or `endOfMibView`.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => buf.push_tagged_bytes(tag::application::OPAQUE, data),
            Value::Counter64(v) => buf.push_counter64(*v),
            Value::NoSuchObject => buf.push_empty(tag::context::NO_SUCH_OBJECT),
            Value::NoSuchInstance => buf.push_empty(tag::context::NO_SUCH_INSTANCE),
            Value::EndOfMibView => buf.push_empty(tag::context::END_OF_MIB_VIEW),
            Value::Unknown { tag, data } => buf.push_tagged_bytes(*tag, data),
        }
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let start = decoder.offset();
        let tag = decoder.read_tag()?;
        let len = decoder.read_length()?;

        let empty = |value: Value| {
            if len == 0 {
                Ok(value)
            } else {
                Err(Error::decode(start, DecodeErrorKind::InvalidNull))
            }
        };

        match tag {
            tag::universal::INTEGER => Ok(Value::Integer(decoder.read_integer_value(len)?)),
            tag::universal::OCTET_STRING => Ok(Value::OctetString(decoder.read_bytes(len)?)),
            tag::universal::NULL => empty(Value::Null),
            tag::universal::OBJECT_IDENTIFIER => {
                Ok(Value::ObjectIdentifier(decoder.read_oid_value(len)?))
            }
            tag::application::IP_ADDRESS => {
                if len != 4 {
                    return Err(Error::decode(
                        start,
                        DecodeErrorKind::InvalidIpAddressLength { length: len },
                    ));
                }
                let data = decoder.read_bytes(4)?;
                Ok(Value::IpAddress([data[0], data[1], data[2], data[3]]))
            }
            tag::application::COUNTER32 => {
                Ok(Value::Counter32(decoder.read_unsigned32_value(len)?))
            }
            tag::application::GAUGE32 => Ok(Value::Gauge32(decoder.read_unsigned32_value(len)?)),
            tag::application::TIMETICKS => {
                Ok(Value::TimeTicks(decoder.read_unsigned32_value(len)?))
            }
            tag::application::OPAQUE => Ok(Value::Opaque(decoder.read_bytes(len)?)),
            tag::application::COUNTER64 => {
                Ok(Value::Counter64(decoder.read_counter64_value(len)?))
            }
            tag::context::NO_SUCH_OBJECT => empty(Value::NoSuchObject),
            tag::context::NO_SUCH_INSTANCE => empty(Value::NoSuchInstance),
            tag::context::END_OF_MIB_VIEW => empty(Value::EndOfMibView),
            tag::universal::OCTET_STRING_CONSTRUCTED => Err(Error::decode(
                start,
                DecodeErrorKind::ConstructedOctetString,
            )),
            // Primitive non-universal tags are kept opaque; anything else
            // cannot be skipped safely.
            other if other & 0xE0 == 0x40 || other & 0xE0 == 0x80 => Ok(Value::Unknown {
                tag: other,
                data: decoder.read_bytes(len)?,
            }),
            other => Err(Error::decode(
                start,
                DecodeErrorKind::UnknownValueType(other),
            )),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) => f.write_str(s),
                Err(_) => write_hex(f, data),
            },
            Value::Null => f.write_str("NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(addr) => write!(f, "{}", std::net::Ipv4Addr::from(*addr)),
            Value::Counter32(v) | Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                write!(
                    f,
                    "{}d {}h {}m {}s",
                    secs / 86400,
                    (secs % 86400) / 3600,
                    (secs % 3600) / 60,
                    secs % 60
                )
            }
            Value::Opaque(data) => {
                f.write_str("Opaque(")?;
                write_hex(f, data)?;
                f.write_str(")")
            }
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => f.write_str("noSuchObject"),
            Value::NoSuchInstance => f.write_str("noSuchInstance"),
            Value::EndOfMibView => f.write_str("endOfMibView"),
            Value::Unknown { tag, data } => {
                write!(f, "Unknown(0x{:02X}, ", tag)?;
                write_hex(f, data)?;
                f.write_str(")")
            }
        }
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, data: &[u8]) -> fmt::Result {
    f.write_str("0x")?;
    for b in data {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}
