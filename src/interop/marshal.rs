//! Type marshaling - host values ↔ foreign wire values
//!
//! Design: Scalars pass through untouched. Only `string` and `array`
//! arguments touch the arena, and only through the call's lazy frame, so a
//! numeric-only call never marks a save point.

use super::abi::PointerWidth;
use super::types::{ArgType, ReturnType};
use crate::allocator::{ArenaError, StackFrame};
use crate::codec::{CodecError, TextCodec};
use crate::value::Value;
use core::fmt;

/// Collaborators used while marshalling one call
pub(crate) struct MarshalContext<'a> {
    pub codec: &'a dyn TextCodec,
    pub width: PointerWidth,
}

/// Worst-case UTF-8 buffer for `chars` characters, terminator included
#[inline]
pub const fn string_capacity(chars: usize) -> usize {
    chars * 4 + 1
}

/// Whether `value` can be marshalled under `ty`
pub fn accepts(ty: ArgType, value: &Value) -> bool {
    match ty {
        ArgType::Number => matches!(value, Value::Number(_) | Value::Wide(_) | Value::Bool(_)),
        ArgType::Boolean => matches!(value, Value::Bool(_) | Value::Number(_)),
        ArgType::Pointer => matches!(
            value,
            Value::Number(_) | Value::Wide(_) | Value::Null | Value::Undefined
        ),
        ArgType::String => matches!(value, Value::Text(_)) || value.is_nullish(),
        ArgType::Array => matches!(value, Value::Bytes(_)),
    }
}

/// Strict validation, run before anything is allocated
pub fn check_args(arg_types: &[ArgType], args: &[Value]) -> Result<(), MarshalError> {
    if args.len() < arg_types.len() {
        return Err(MarshalError::MissingArgument {
            index: args.len(),
            expected: arg_types[args.len()],
        });
    }

    for (index, (&ty, value)) in arg_types.iter().zip(args).enumerate() {
        if !accepts(ty, value) {
            return Err(MarshalError::TypeMismatch {
                index,
                expected: ty,
                found: value.kind_name(),
            });
        }
    }
    Ok(())
}

/// Convert call arguments to wire values in declared order
///
/// Arguments beyond the declared types pass through unconverted. On error
/// the caller drops `frame`, releasing anything already allocated.
pub(crate) fn marshal_args(
    cx: &MarshalContext<'_>,
    frame: &mut StackFrame,
    arg_types: &[ArgType],
    args: Vec<Value>,
) -> Result<Vec<Value>, MarshalError> {
    let mut wire = Vec::with_capacity(args.len());

    for (index, value) in args.into_iter().enumerate() {
        let converted = match arg_types.get(index) {
            Some(&ty) => to_wire(cx, frame, index, ty, value)?,
            None => value,
        };
        wire.push(converted);
    }

    Ok(wire)
}

/// Marshal one argument
fn to_wire(
    cx: &MarshalContext<'_>,
    frame: &mut StackFrame,
    index: usize,
    ty: ArgType,
    value: Value,
) -> Result<Value, MarshalError> {
    match (ty, value) {
        (ArgType::Number | ArgType::Boolean, value) => Ok(value),
        (ArgType::Pointer, value) => Ok(cx.width.widen(value)),

        (ArgType::String, Value::Text(text)) => {
            let capacity = string_capacity(text.chars().count());
            let addr = frame
                .alloc(capacity)
                .map_err(|source| MarshalError::Arena { index, source })?;
            cx.codec
                .encode_utf8(&text, addr, capacity)
                .map_err(|source| MarshalError::Codec { index: Some(index), source })?;
            Ok(cx.width.address_to_wire(addr))
        }
        (ArgType::String, value) if value.is_nullish() => Ok(cx.width.address_to_wire(0)),

        (ArgType::Array, Value::Bytes(bytes)) => {
            let addr = frame
                .alloc(bytes.len())
                .map_err(|source| MarshalError::Arena { index, source })?;
            cx.codec
                .write_array(&bytes, addr)
                .map_err(|source| MarshalError::Codec { index: Some(index), source })?;
            Ok(cx.width.address_to_wire(addr))
        }

        // Lenient mode: unconvertible values go through as they are
        (ArgType::String | ArgType::Array, value) => Ok(value),
    }
}

/// Convert a raw foreign return value under its declared tag
pub(crate) fn from_wire(
    cx: &MarshalContext<'_>,
    raw: Value,
    return_type: ReturnType,
) -> Result<Value, MarshalError> {
    match return_type {
        ReturnType::String => {
            let addr = cx
                .width
                .address_from_wire(&raw)
                .ok_or(MarshalError::InvalidAddress { found: raw.kind_name() })?;
            cx.codec
                .decode_utf8(addr)
                .map(Value::Text)
                .map_err(|source| MarshalError::Codec { index: None, source })
        }
        ReturnType::Pointer => Ok(cx.width.narrow(raw)),
        ReturnType::Boolean => Ok(Value::Bool(raw.truthy())),
        // Array never gets here: the facade rejects it before the call
        ReturnType::Void | ReturnType::Number | ReturnType::Array => Ok(raw),
    }
}

/// Marshalling errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    MissingArgument { index: usize, expected: ArgType },
    TypeMismatch { index: usize, expected: ArgType, found: &'static str },
    Arena { index: usize, source: ArenaError },
    Codec { index: Option<usize>, source: CodecError },
    InvalidAddress { found: &'static str },
}

impl fmt::Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgument { index, expected } => {
                write!(f, "Missing argument {} (declared {})", index, expected)
            }
            Self::TypeMismatch { index, expected, found } => write!(
                f,
                "Argument {} declared {} but got {}",
                index, expected, found
            ),
            Self::Arena { index, source } => {
                write!(f, "Argument {}: {}", index, source)
            }
            Self::Codec { index: Some(index), source } => {
                write!(f, "Argument {}: {}", index, source)
            }
            Self::Codec { index: None, source } => {
                write!(f, "Return value: {}", source)
            }
            Self::InvalidAddress { found } => {
                write!(f, "Return value is not an address: {}", found)
            }
        }
    }
}

impl std::error::Error for MarshalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Arena { source, .. } => Some(source),
            Self::Codec { source, .. } => Some(source),
            _ => None,
        }
    }
}
