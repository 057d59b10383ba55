//! ccall-bridge - call exported foreign functions from host code
//!
//! Converts host values to the foreign calling convention, invokes the
//! export, converts the result back, and releases temporary storage. Calls
//! that suspend inside the foreign side hand back a deferred result; at most
//! one such call is in flight at a time.

pub mod allocator;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod interop;
pub mod logging;
pub mod value;

// Re-export core types
pub use config::BridgeConfig;
pub use coordinator::{AsyncCoordinator, AsyncState, Deferred, Outcome, ProtocolViolation};
pub use interop::{
    ArgType, BoundFunction, Bridge, CallError, CallOptions, ErrorKind, ReturnType, SymbolTable,
};
pub use value::Value;

/// Process-wide initialization: logging and the shared coordinator
pub fn init(config: &BridgeConfig) {
    logging::init_with_config(config.logging.clone());
    let coordinator = AsyncCoordinator::global();
    tracing::debug!(
        target: "coordinator",
        idle = coordinator.is_idle(),
        "bridge runtime initialized"
    );
}
