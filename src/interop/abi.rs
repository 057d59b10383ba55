//! Address width handling between host numbers and foreign addresses
//!
//! Narrow builds pass addresses as plain numbers. Wide builds pass them as
//! 64-bit wire integers, so pointer arguments are widened on the way in and
//! pointer results narrowed on the way out.

use crate::allocator::Address;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Width of foreign addresses on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerWidth {
    Narrow,
    Wide,
}

impl PointerWidth {
    /// Build default
    #[inline]
    pub const fn native() -> Self {
        #[cfg(feature = "wide-pointers")]
        return Self::Wide;

        #[cfg(not(feature = "wide-pointers"))]
        return Self::Narrow;
    }

    /// Address size in bytes
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Narrow => 4,
            Self::Wide => 8,
        }
    }

    /// Encode an address for a foreign argument list
    #[inline]
    pub fn address_to_wire(self, addr: Address) -> Value {
        match self {
            Self::Narrow => Value::Number(addr as f64),
            Self::Wide => Value::Wide(addr as u64),
        }
    }

    /// Decode an address from a raw foreign value
    ///
    /// Null and undefined decode to the null address.
    pub fn address_from_wire(self, raw: &Value) -> Option<Address> {
        match raw {
            Value::Undefined | Value::Null => Some(0),
            Value::Wide(n) => Address::try_from(*n).ok(),
            Value::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 => {
                Some(*n as Address)
            }
            _ => None,
        }
    }

    /// Pointer argument: host number to wire address
    pub fn widen(self, value: Value) -> Value {
        match (self, value) {
            (Self::Wide, Value::Number(n)) if n >= 0.0 && n.fract() == 0.0 => Value::Wide(n as u64),
            (_, value) => value,
        }
    }

    /// Pointer result: wire address to host number
    pub fn narrow(self, value: Value) -> Value {
        match (self, value) {
            (Self::Wide, Value::Wide(n)) => Value::Number(n as f64),
            (_, value) => value,
        }
    }
}

impl Default for PointerWidth {
    #[inline]
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_width_is_identity_for_pointers() {
        let width = PointerWidth::Narrow;
        assert_eq!(width.widen(Value::Number(64.0)), Value::Number(64.0));
        assert_eq!(width.narrow(Value::Number(64.0)), Value::Number(64.0));
        assert_eq!(width.address_to_wire(64), Value::Number(64.0));
    }

    #[test]
    fn wide_width_converts_both_ways() {
        let width = PointerWidth::Wide;
        assert_eq!(width.widen(Value::Number(4096.0)), Value::Wide(4096));
        assert_eq!(width.narrow(Value::Wide(4096)), Value::Number(4096.0));
        assert_eq!(width.address_to_wire(8), Value::Wide(8));
        // Non-address values pass through
        assert_eq!(width.widen(Value::Null), Value::Null);
    }

    #[test]
    fn address_decoding() {
        let width = PointerWidth::Narrow;
        assert_eq!(width.address_from_wire(&Value::Number(12.0)), Some(12));
        assert_eq!(width.address_from_wire(&Value::Wide(12)), Some(12));
        assert_eq!(width.address_from_wire(&Value::Null), Some(0));
        assert_eq!(width.address_from_wire(&Value::Number(-1.0)), None);
        assert_eq!(width.address_from_wire(&Value::Number(1.5)), None);
        assert_eq!(width.address_from_wire(&Value::from("x")), None);
    }

    #[test]
    fn address_sizes() {
        assert_eq!(PointerWidth::Narrow.bytes(), 4);
        assert_eq!(PointerWidth::Wide.bytes(), 8);
    }
}
