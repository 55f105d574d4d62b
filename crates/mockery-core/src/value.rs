//! Typed payloads for queued return values and checked parameters
//!
//! Integral variants compare numerically through an `i128` view, so a value
//! registered as `5u64` matches an `i32` argument of `5`. Everything else compares
//! within its own variant.

use crate::allocation::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value handed to or returned from a mock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Absent pointer or string
    Null,
    /// Boolean, integral as 0/1
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    Uint(u64),
    /// Address of a tracked block
    Address(Address),
    /// UTF-8 string
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl Value {
    /// Numeric view of integral variants
    pub fn as_integral(&self) -> Option<i128> {
        match self {
            Self::Bool(b) => Some(i128::from(*b)),
            Self::Int(v) => Some(i128::from(*v)),
            Self::Uint(v) => Some(i128::from(*v)),
            Self::Address(addr) => Some(i128::from(addr.as_u64())),
            Self::Null | Self::Str(_) | Self::Bytes(_) => None,
        }
    }

    /// Byte view of string and byte variants
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Str(s) => Some(s.as_bytes()),
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// String view, `None` for anything but `Str`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is the null value
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_integral(), other.as_integral()) {
            return a == b;
        }
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, Self::Address(addr)) | (Self::Address(addr), Self::Null) => {
                *addr == Address::NULL
            }
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Address(addr) => write!(f, "{addr}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bytes(bytes) => write!(f, "[{}]", hex::encode(bytes)),
        }
    }
}

macro_rules! value_from_int {
    ($variant:ident, $wide:ty, $($t:ty),+) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::$variant(v as $wide)
                }
            }
        )+
    };
}

value_from_int!(Int, i64, i8, i16, i32, i64, isize);
value_from_int!(Uint, u64, u8, u16, u32, u64, usize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Address> for Value {
    fn from(addr: Address) -> Self {
        Self::Address(addr)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Self::Str(s.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(bytes: &[u8; N]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Conversion from a queued [`Value`] into the type a mock returns
pub trait FromValue: Sized {
    /// Convert, or `None` when the value does not fit the type
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! from_value_int {
    ($($t:ty),+) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Option<Self> {
                    value.as_integral().and_then(|v| <$t>::try_from(v).ok())
                }
            }
        )+
    };
}

from_value_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, i128);

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_integral().map(|v| v != 0)
    }
}

impl FromValue for Address {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Address(addr) => Some(*addr),
            Value::Null => Some(Address::NULL),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bytes().map(<[u8]>::to_vec)
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// How many times a queued return value or expectation may be consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repeat {
    /// Consumed this many more times, then removed
    Times(u32),
    /// Never removed by consumption
    Always,
}

impl Repeat {
    /// A single use
    pub const ONCE: Repeat = Repeat::Times(1);

    /// Whether this count can be registered
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Times(0))
    }

    /// Record one use; returns `true` when the entry is now exhausted
    pub fn consume(&mut self) -> bool {
        match self {
            Self::Times(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
            Self::Always => false,
        }
    }

    /// Whether the entry never runs out
    pub fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Self::ONCE
    }
}

impl From<u32> for Repeat {
    fn from(count: u32) -> Self {
        Self::Times(count)
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Times(n) => write!(f, "{n}"),
            Self::Always => f.write_str("always"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_values_compare_across_widths() {
        assert_eq!(Value::from(5i32), Value::from(5u64));
        assert_eq!(Value::from(true), Value::from(1u8));
        assert_ne!(Value::from(-1i64), Value::from(u64::MAX));
        assert_eq!(Value::Address(Address::from_raw(0x40)), Value::from(0x40u64));
    }

    #[test]
    fn test_non_integral_values_compare_within_variant() {
        assert_eq!(Value::from("abc"), Value::from(String::from("abc")));
        assert_ne!(Value::from("abc"), Value::from(&b"abc"[..]));
        assert_eq!(Value::Null, Value::from(None::<&str>));
        assert_ne!(Value::Null, Value::from(0i32));
    }

    #[test]
    fn test_null_equals_the_null_address() {
        assert_eq!(Value::Null, Value::Address(Address::NULL));
        assert_eq!(Value::from(None::<Address>), Value::from(Address::NULL));
        assert_ne!(Value::Null, Value::Address(Address::from_raw(0x10)));
    }

    #[test]
    fn test_from_value_checks_range() {
        assert_eq!(i8::from_value(&Value::from(127i64)), Some(127));
        assert_eq!(i8::from_value(&Value::from(128i64)), None);
        assert_eq!(u32::from_value(&Value::from(-1i32)), None);
        assert_eq!(String::from_value(&Value::from(3u8)), None);
        assert_eq!(Option::<String>::from_value(&Value::Null), Some(None));
    }

    #[test]
    fn test_repeat_consumption() {
        let mut twice = Repeat::Times(2);
        assert!(!twice.consume());
        assert!(twice.consume());

        let mut always = Repeat::Always;
        for _ in 0..10 {
            assert!(!always.consume());
        }
        assert!(!Repeat::Times(0).is_valid());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("x").to_string(), "\"x\"");
        assert_eq!(Value::from(vec![0xde, 0xad]).to_string(), "[dead]");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
