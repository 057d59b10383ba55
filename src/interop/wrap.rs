//! Bound wrappers - reusable callables for one export and signature
//!
//! The path is classified once, when the wrapper is created. A signature that
//! needs no marshalling or conversion binds the raw foreign handle; anything
//! else forwards to the facade on every call.

use super::abi::PointerWidth;
use super::call::{Bridge, CallError};
use super::symbols::ForeignFunction;
use super::types::{ArgType, CallDescriptor, CallOptions, ReturnType};
use crate::coordinator::Outcome;
use crate::value::Value;
use core::fmt;
use std::sync::atomic::Ordering;
use tracing::debug;

/// How a bound function reaches the foreign side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Raw handle, no validation, marshalling, conversion or suspension tracking
    Fast,
    /// Through the invocation facade
    General,
}

/// Decide the call path for a signature
///
/// Fast only when nothing would be converted on the general path either:
/// scalar arguments and a return value taken as-is. The fast path never
/// validates, so checked mode always goes through the facade.
pub fn classify(
    strict: bool,
    width: PointerWidth,
    return_type: ReturnType,
    arg_types: &[ArgType],
    options: Option<&CallOptions>,
) -> PathKind {
    let scalar_args = arg_types
        .iter()
        .all(|&ty| matches!(ty, ArgType::Number | ArgType::Boolean));
    let raw_return = match return_type {
        ReturnType::Void | ReturnType::Number => true,
        ReturnType::Pointer => width == PointerWidth::Narrow,
        ReturnType::Boolean | ReturnType::String | ReturnType::Array => false,
    };

    if !strict && scalar_args && raw_return && options.is_none() {
        PathKind::Fast
    } else {
        PathKind::General
    }
}

#[derive(Clone)]
enum CallPath {
    Fast {
        bridge: Bridge,
        handle: ForeignFunction,
    },
    General {
        bridge: Bridge,
        return_type: ReturnType,
        arg_types: Vec<ArgType>,
        options: Option<CallOptions>,
    },
}

/// Callable bound to one identifier and signature
#[derive(Clone)]
pub struct BoundFunction {
    ident: String,
    path: CallPath,
}

impl BoundFunction {
    #[inline]
    pub fn ident(&self) -> &str {
        &self.ident
    }

    #[inline]
    pub fn path(&self) -> PathKind {
        match self.path {
            CallPath::Fast { .. } => PathKind::Fast,
            CallPath::General { .. } => PathKind::General,
        }
    }

    /// The raw foreign handle, when bound on the fast path
    pub fn handle(&self) -> Option<&ForeignFunction> {
        match &self.path {
            CallPath::Fast { handle, .. } => Some(handle),
            CallPath::General { .. } => None,
        }
    }

    /// Call with the bound signature
    pub fn call(&self, args: Vec<Value>) -> Result<Outcome, CallError> {
        match &self.path {
            CallPath::Fast { bridge, handle } => {
                bridge.inner.stats.fast_path_calls.fetch_add(1, Ordering::Relaxed);
                Ok(Outcome::Ready(handle.invoke(&args)))
            }
            CallPath::General {
                bridge,
                return_type,
                arg_types,
                options,
            } => bridge.invoke(CallDescriptor {
                ident: self.ident.clone(),
                return_type: *return_type,
                arg_types: arg_types.clone(),
                args,
                options: *options,
            }),
        }
    }
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFunction")
            .field("ident", &self.ident)
            .field("path", &self.path())
            .finish()
    }
}

impl Bridge {
    /// Bind a reusable callable
    ///
    /// The fast path resolves the export now; the general path resolves it
    /// on every call, like `call` does.
    pub fn wrap(
        &self,
        ident: &str,
        return_type: ReturnType,
        arg_types: Vec<ArgType>,
        options: Option<CallOptions>,
    ) -> Result<BoundFunction, CallError> {
        if return_type == ReturnType::Array {
            return Err(CallError::InvalidReturnTag {
                ident: ident.to_owned(),
            });
        }

        let kind = classify(
            self.strict_checks(),
            self.pointer_width(),
            return_type,
            &arg_types,
            options.as_ref(),
        );
        debug!(target: "ccall", function = ident, path = ?kind, "bound wrapper");

        let path = match kind {
            PathKind::Fast => CallPath::Fast {
                bridge: self.clone(),
                handle: self.symbols().resolve(ident).map_err(|source| {
                    CallError::UnknownSymbol {
                        ident: ident.to_owned(),
                        source,
                    }
                })?,
            },
            PathKind::General => CallPath::General {
                bridge: self.clone(),
                return_type,
                arg_types,
                options,
            },
        };

        Ok(BoundFunction {
            ident: ident.to_owned(),
            path,
        })
    }
}
