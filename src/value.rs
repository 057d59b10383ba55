//! Host-level values exchanged with foreign functions
//!
//! The same enum carries both host arguments (before marshalling) and wire
//! values (after marshalling, and raw foreign returns). Addresses travel as
//! `Number` in narrow builds and as `Wide` in wide-pointer builds.

use core::fmt;

/// Dynamically typed host value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    /// 64-bit wire integer (wide addresses)
    Wide(u64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Truthiness used by the `boolean` return conversion
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Wide(n) => *n != 0,
            Self::Text(s) => !s.is_empty(),
            Self::Bytes(_) => true,
        }
    }

    /// Null, undefined, or the number zero
    #[inline]
    pub fn is_nullish(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => true,
            Self::Number(n) => *n == 0.0,
            Self::Wide(n) => *n == 0,
            _ => false,
        }
    }

    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Wide(n) => Some(*n as f64),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Kind name for diagnostics
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Wide(_) => "wide",
            Self::Text(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Wide(n) => write!(f, "{}n", n),
            Self::Text(s) => write!(f, "\"{}\"", s),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_host_rules() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Null.truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(Value::Number(-1.0).truthy());
        assert!(Value::Wide(7).truthy());
        assert!(!Value::Text(String::new()).truthy());
        assert!(Value::Bytes(vec![]).truthy());
    }

    #[test]
    fn nullish_covers_zero_addresses() {
        assert!(Value::Null.is_nullish());
        assert!(Value::Number(0.0).is_nullish());
        assert!(Value::Wide(0).is_nullish());
        assert!(!Value::from("").is_nullish());
    }
}
