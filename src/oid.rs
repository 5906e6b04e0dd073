//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>`; every OID the collector uses
//! fits inline without a heap allocation.

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs (subidentifiers) allowed in an OID (RFC 2578 §3.5).
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
///
/// Ordering is lexicographic over arcs, which is the order agents walk in.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    pub fn empty() -> Self {
        Self {
            arcs: SmallVec::new(),
        }
    }

    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse dotted notation, e.g. `"1.3.6.1.2.1.1.1.0"`.
    ///
    /// A single leading dot is accepted (`".1.3.6.1..."`), since that is how
    /// net-snmp tools print OIDs. The result is validated: first arc 0-2,
    /// second arc below 40 unless the first is 2, at least two and at most
    /// [`MAX_OID_LEN`] arcs.
    ///
    /// ```
    /// use syno_snmp::oid::Oid;
    ///
    /// let oid = Oid::parse(".1.3.6.1.4.1.6574.1.2.0").unwrap();
    /// assert_eq!(oid.to_string(), "1.3.6.1.4.1.6574.1.2.0");
    /// assert!(Oid::parse("1..3").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let body = s.strip_prefix('.').unwrap_or(s);
        if body.is_empty() {
            return Err(Error::invalid_oid_with_input(OidErrorKind::Empty, s));
        }

        let mut arcs = SmallVec::new();
        for part in body.split('.') {
            let arc: u32 = part
                .parse()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s))?;
            arcs.push(arc);
        }

        let oid = Self { arcs };
        oid.validate().map_err(|e| match e {
            Error::InvalidOid { kind, .. } => Error::invalid_oid_with_input(kind, s),
            other => other,
        })?;
        Ok(oid)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Whether `self` lies in the subtree rooted at `other` (or equals it).
    pub fn starts_with(&self, other: &Oid) -> bool {
        self.arcs.len() >= other.arcs.len() && self.arcs[..other.arcs.len()] == other.arcs[..]
    }

    /// Append one arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Arcs after `prefix`, if `self` starts with it.
    ///
    /// Table walks use this to recover the row index from a column OID.
    pub fn suffix(&self, prefix: &Oid) -> Option<&[u32]> {
        self.starts_with(prefix)
            .then(|| &self.arcs[prefix.arcs.len()..])
    }

    /// Check X.690 §8.19.4 arc constraints and the arc count.
    pub fn validate(&self) -> Result<()> {
        if self.arcs.len() < 2 {
            return Err(Error::invalid_oid(OidErrorKind::TooShort));
        }
        if self.arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                count: self.arcs.len(),
                max: MAX_OID_LEN,
            }));
        }

        let (first, second) = (self.arcs[0], self.arcs[1]);
        if first > 2 {
            return Err(Error::invalid_oid(OidErrorKind::InvalidFirstArc(first)));
        }
        if first < 2 && second >= 40 {
            return Err(Error::invalid_oid(OidErrorKind::InvalidSecondArc {
                first,
                second,
            }));
        }
        Ok(())
    }

    /// BER contents octets (no tag or length).
    ///
    /// The first two arcs pack into one subidentifier `arc1 * 40 + arc2`;
    /// every subidentifier is base-128 with the high bit marking continuation.
    pub fn to_ber_smallvec(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();
        match self.arcs.as_slice() {
            [] => {}
            [first] => push_subidentifier(&mut bytes, u64::from(*first) * 40),
            [first, second, rest @ ..] => {
                push_subidentifier(&mut bytes, u64::from(*first) * 40 + u64::from(*second));
                for &arc in rest {
                    push_subidentifier(&mut bytes, u64::from(arc));
                }
            }
        }
        bytes
    }

    pub fn to_ber(&self) -> Vec<u8> {
        self.to_ber_smallvec().to_vec()
    }

    /// Decode BER contents octets.
    ///
    /// Error offsets are relative to `data`.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::empty());
        }

        let mut arcs: SmallVec<[u32; 16]> = SmallVec::new();
        let (first, mut pos) = decode_subidentifier(data, 0, u64::from(u32::MAX) + 80)?;
        match first {
            0..40 => arcs.extend([0, first as u32]),
            40..80 => arcs.extend([1, (first - 40) as u32]),
            _ => arcs.extend([2, (first - 80) as u32]),
        }

        while pos < data.len() {
            let (arc, next) = decode_subidentifier(data, pos, u64::from(u32::MAX))?;
            arcs.push(arc as u32);
            pos = next;
            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(pos, DecodeErrorKind::InvalidOidEncoding));
            }
        }

        Ok(Self { arcs })
    }
}

fn push_subidentifier(bytes: &mut SmallVec<[u8; 64]>, value: u64) {
    let groups = (64 - value.leading_zeros()).div_ceil(7).max(1);
    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

/// Decode one base-128 subidentifier starting at `start`.
///
/// Returns the value and the position after it. Rejects the non-minimal
/// leading 0x80 octet, a missing final octet, and values above `max`.
fn decode_subidentifier(data: &[u8], start: usize, max: u64) -> Result<(u64, usize)> {
    if data.get(start) == Some(&0x80) {
        return Err(Error::decode(start, DecodeErrorKind::InvalidOidEncoding));
    }

    let mut value: u64 = 0;
    let mut pos = start;
    loop {
        let Some(&byte) = data.get(pos) else {
            return Err(Error::decode(pos, DecodeErrorKind::InvalidOidEncoding));
        };
        pos += 1;
        value = (value << 7) | u64::from(byte & 0x7F);
        if value > max {
            return Err(Error::decode(start, DecodeErrorKind::IntegerOverflow));
        }
        if byte & 0x80 == 0 {
            return Ok((value, pos));
        }
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut arcs = self.arcs.iter();
        if let Some(first) = arcs.next() {
            write!(f, "{}", first)?;
        }
        for arc in arcs {
            write!(f, ".{}", arc)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

/// Build an OID from literal arcs.
///
/// ```
/// use syno_snmp::oid;
///
/// let temperature = oid!(1, 3, 6, 1, 4, 1, 6574, 1, 2, 0);
/// assert!(temperature.starts_with(&oid!(1, 3, 6, 1, 4, 1, 6574)));
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}
