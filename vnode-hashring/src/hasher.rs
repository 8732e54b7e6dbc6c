use std::fmt;

/// A position on the ring.
///
/// Ring arithmetic is modular over the full `u128` span: moving clockwise past
/// `HashValue::MAX` wraps back to `HashValue::MIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HashValue(u128);

impl HashValue {
    pub const MIN: HashValue = HashValue(u128::MIN);
    pub const MAX: HashValue = HashValue(u128::MAX);

    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    pub const fn as_u128(self) -> u128 {
        self.0
    }

    /// Advance clockwise by `delta` positions, wrapping at the end of the ring.
    pub fn wrapping_add(self, delta: u128) -> Self {
        Self(self.0.wrapping_add(delta))
    }

    /// Clockwise distance from `self` to `other`.
    ///
    /// `a.distance_to(a)` is zero; `MAX.distance_to(MIN)` is one.
    pub fn distance_to(self, other: HashValue) -> u128 {
        other.0.wrapping_sub(self.0)
    }
}

impl From<u128> for HashValue {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Maps bytes to ring positions.
///
/// Implementations must return the same value for the same input in every
/// process and on every machine, so per-process seeded hashers such as
/// `std::collections::hash_map::RandomState` are not usable here.
pub trait StableHasher: Clone + Send + Sync {
    fn hash(&self, bytes: &[u8]) -> HashValue;
}

/// MD5 digest interpreted as a big-endian `u128`.
///
/// Not used for anything security related; MD5 is chosen because it is
/// stable, fast, and exactly 128 bits wide.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Hasher;

impl StableHasher for Md5Hasher {
    #[inline]
    fn hash(&self, bytes: &[u8]) -> HashValue {
        let digest = md5::compute(bytes);
        HashValue(u128::from_be_bytes(digest.0))
    }
}

/// Encode a virtual node as node bytes followed by a 4-byte big-endian
/// replica index.
pub fn serialize_virtual_node(node: &[u8], replica: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(node.len() + 4);
    bytes.extend_from_slice(node);
    bytes.extend_from_slice(&replica.to_be_bytes());
    bytes
}
