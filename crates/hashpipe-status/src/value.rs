//! Decoded record values

use std::borrow::Cow;
use std::fmt;

/// Kind of a decoded value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    Str,
}

impl ValueKind {
    /// Whether a value of kind `actual` satisfies this kind.
    ///
    /// Integers are accepted where floats are expected, the producer writes
    /// `OBSFREQ=1420` as readily as `OBSFREQ=1420.0`.
    pub fn accepts(&self, actual: ValueKind) -> bool {
        *self == actual || (*self == ValueKind::Float && actual == ValueKind::Int)
    }
}

/// Typed value of a status record
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    /// Integer outside the `i64` range, as normalised decimal text
    BigInt(String),
    Float(f64),
    Str(String),
}

impl Value {
    /// Decode the value half of a record.
    ///
    /// Tries an integer, then a float, then falls back to a string. Numbers
    /// may use single `_` separators between digits. Integers too wide for
    /// `i64` are kept exactly as [`Value::BigInt`]. Strings are trimmed and a
    /// single pair of enclosing `'` is removed (then trimmed again).
    /// Mismatched quoting is left as is.
    pub fn decode(raw: &str) -> Self {
        let v = raw.trim();
        if let Some(number) = strip_digit_separators(v) {
            if let Ok(i) = number.parse::<i64>() {
                return Value::Int(i);
            }
            if let Some(digits) = big_integer(&number) {
                return Value::BigInt(digits);
            }
            if let Ok(f) = number.parse::<f64>() {
                return Value::Float(f);
            }
        }
        if v.starts_with('\'') && v.ends_with('\'') {
            let inner = if v.len() > 1 { &v[1..v.len() - 1] } else { "" };
            return Value::Str(inner.trim().to_string());
        }
        Value::Str(v.to_string())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) | Value::BigInt(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view, integers widen
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::BigInt(digits) => digits.parse().ok(),
            Value::Float(f) => Some(*f),
            Value::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Remove `_` digit separators, `None` if one is not between two digits
fn strip_digit_separators(v: &str) -> Option<Cow<'_, str>> {
    if !v.contains('_') {
        return Some(Cow::Borrowed(v));
    }
    let bytes = v.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'_' {
            let before = i.checked_sub(1).and_then(|j| bytes.get(j));
            let after = bytes.get(i + 1);
            if !before.is_some_and(u8::is_ascii_digit) || !after.is_some_and(u8::is_ascii_digit) {
                return None;
            }
        }
    }
    Some(Cow::Owned(v.replace('_', "")))
}

/// Canonical decimal text of an integer literal, without `+` or leading zeros
fn big_integer(v: &str) -> Option<String> {
    let (negative, digits) = match v.as_bytes().first()? {
        b'-' => (true, &v[1..]),
        b'+' => (false, &v[1..]),
        _ => (false, v),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Some("0".to_string());
    }
    Some(if negative {
        format!("-{digits}")
    } else {
        digits.to_string()
    })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::BigInt(digits) => f.write_str(digits),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::BigInt(digits) => match digits.parse::<i128>() {
                Ok(i) => serializer.serialize_i128(i),
                Err(_) => serializer.serialize_str(digits),
            },
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
        }
    }
}
