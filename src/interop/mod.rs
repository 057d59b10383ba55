//! Interoperability - call foreign functions with automatic marshaling
//!
//! Design: One facade sequences every side effect; everything around it is
//! pure with respect to the arena and the async state.
//!
//! Architecture:
//! - `types.rs` - Type tags, call options, call descriptors
//! - `abi.rs` - Address width on the wire (narrow / wide)
//! - `symbols.rs` - Export table and symbol resolution
//! - `marshal.rs` - Host ↔ wire conversions for arguments and returns
//! - `call.rs` - Invocation facade (`Bridge::call`)
//! - `wrap.rs` - Bound wrapper factory with the fast-path classification

mod types;
mod abi;
mod symbols;
mod marshal;
mod call;
mod wrap;

pub use types::{ArgType, CallDescriptor, CallOptions, ReturnType, TagError};
pub use abi::PointerWidth;
pub use symbols::{ForeignFunction, RawForeignFn, SymbolError, SymbolTable};
pub use marshal::{accepts, check_args, string_capacity, MarshalError};
pub use call::{Bridge, BridgeBuilder, CallError, ErrorKind};
pub use wrap::{classify, BoundFunction, PathKind};

use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-bridge counters
#[derive(Debug, Default)]
pub(crate) struct CallStats {
    pub calls_made: AtomicUsize,
    pub fast_path_calls: AtomicUsize,
    pub suspensions: AtomicUsize,
    pub marshaling_errors: AtomicUsize,
    pub protocol_violations: AtomicUsize,
}

impl CallStats {
    fn snapshot(&self) -> InteropStats {
        InteropStats {
            calls_made: self.calls_made.load(Ordering::Relaxed),
            fast_path_calls: self.fast_path_calls.load(Ordering::Relaxed),
            suspensions: self.suspensions.load(Ordering::Relaxed),
            marshaling_errors: self.marshaling_errors.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
        }
    }
}

/// Interop statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteropStats {
    /// Calls through the facade
    pub calls_made: usize,
    /// Calls that bypassed the facade
    pub fast_path_calls: usize,
    pub suspensions: usize,
    pub marshaling_errors: usize,
    pub protocol_violations: usize,
}

impl Bridge {
    /// Get interop statistics
    pub fn stats(&self) -> InteropStats {
        self.inner.stats.snapshot()
    }
}
