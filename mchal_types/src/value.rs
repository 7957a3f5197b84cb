//! Bus payload values.
//!
//! The bus itself is payload-agnostic (§9 design note); this is the
//! tagged-union carrier every message's payload is expressed as. Only the
//! topic-to-kind mapping at capability level enforces stronger typing on
//! top of this. Telemetry hot paths never carry floating point — analog
//! and sensor readings use [`Fixed`], a Q16.16 fixed-point representation,
//! instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Q16.16 signed fixed-point number: 16 integer bits, 16 fractional bits,
/// stored as the raw scaled `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fixed(i32);

impl Fixed {
    /// Fractional bits of the representation.
    pub const FRAC_BITS: u32 = 16;
    /// Scale factor (`1 << FRAC_BITS`).
    pub const SCALE: i32 = 1 << Self::FRAC_BITS;

    /// Build a `Fixed` from its raw scaled representation.
    pub const fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    /// Build a `Fixed` representing an exact integer value.
    pub const fn from_int(v: i32) -> Self {
        Fixed(v.saturating_mul(Self::SCALE))
    }

    /// The raw scaled representation.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Truncate towards zero to the nearest integer.
    pub const fn to_int(self) -> i32 {
        self.0 / Self::SCALE
    }
}

impl std::ops::Add for Fixed {
    type Output = Fixed;
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Fixed {
    type Output = Fixed;
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(rhs.0))
    }
}

/// A bus message payload.
///
/// `Clear` is the retained-clear sentinel (§3 "Retained store"): publishing
/// it on a retained message removes the retained entry instead of storing
/// it, and it is never delivered to a live subscriber as ordinary data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Value {
    /// No payload.
    Unit,
    /// Retained-clear sentinel.
    Clear,
    /// Boolean, e.g. a GPIO switch's `on` field.
    Bool(bool),
    /// Signed integer.
    I64(i64),
    /// Unsigned integer.
    U64(u64),
    /// Fixed-point reading or control level.
    Fixed(Fixed),
    /// Short text, e.g. a tag or device type name.
    Text(String),
    /// Raw bytes, e.g. a non-session serial write.
    Bytes(Vec<u8>),
    /// Opaque small integer handle, e.g. a ring handle.
    Handle(u32),
    /// An error code, carried in error replies and degraded status.
    Error(ErrorCode),
    /// Ordered homogeneous or heterogeneous list.
    List(Vec<Value>),
    /// Ordered string-keyed map, used for struct-like payloads (capability
    /// info, status, device config records).
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// `true` for the retained-clear sentinel.
    pub fn is_clear(&self) -> bool {
        matches!(self, Value::Clear)
    }

    /// Build a `Map` payload from key/value pairs.
    pub fn map(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Look up a field in a `Map` payload.
    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// Extract a `bool`, if this is [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract a `Fixed`, if this is [`Value::Fixed`].
    pub fn as_fixed(&self) -> Option<Fixed> {
        match self {
            Value::Fixed(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract a `u64`, if this is [`Value::U64`].
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_roundtrips_integers() {
        let f = Fixed::from_int(42);
        assert_eq!(f.to_int(), 42);
    }

    #[test]
    fn fixed_arithmetic() {
        let a = Fixed::from_int(10);
        let b = Fixed::from_int(3);
        assert_eq!((a - b).to_int(), 7);
    }

    #[test]
    fn map_field_lookup() {
        let v = Value::map([("on", Value::Bool(true))]);
        assert_eq!(v.field("on").and_then(Value::as_bool), Some(true));
        assert_eq!(v.field("missing"), None);
    }

    #[test]
    fn clear_sentinel_is_distinct_from_unit() {
        assert!(Value::Clear.is_clear());
        assert!(!Value::Unit.is_clear());
    }
}
