//! Invocation facade - the one place call side effects are sequenced
//!
//! Order per call: validate tag → resolve → marshal (lazy frame) → invoke →
//! observe suspension → convert and release now, or defer both until the
//! suspended call completes.

use super::abi::PointerWidth;
use super::marshal::{self, MarshalContext, MarshalError};
use super::symbols::{SymbolError, SymbolTable};
use super::types::{ArgType, CallDescriptor, CallOptions, ReturnType};
use super::CallStats;
use crate::allocator::{self, LinearMemory, SharedArena, SharedMemory, StackArena, StackFrame};
use crate::codec::{TextCodec, Utf8Codec};
use crate::config::BridgeConfig;
use crate::coordinator::{
    AsyncCoordinator, Deferred, NeverSuspend, Outcome, Pinned, ProtocolViolation, SuspendEngine,
    Suspension, Transition,
};
use crate::logging::{log_call, log_marshal_error, log_resume, log_return, log_suspend, log_violation};
use crate::value::Value;
use core::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug_span, warn};

/// Foreign-function bridge: symbol table, arena, codec and suspension engine
#[derive(Clone)]
pub struct Bridge {
    pub(crate) inner: Arc<BridgeInner>,
}

pub(crate) struct BridgeInner {
    pub(crate) symbols: Arc<SymbolTable>,
    pub(crate) arena: SharedArena,
    pub(crate) codec: Arc<dyn TextCodec>,
    pub(crate) engine: Arc<dyn SuspendEngine>,
    pub(crate) coordinator: Arc<AsyncCoordinator>,
    pub(crate) strict: bool,
    pub(crate) width: PointerWidth,
    pub(crate) stats: CallStats,
}

impl Bridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::default()
    }

    #[inline]
    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.inner.symbols
    }

    #[inline]
    pub fn coordinator(&self) -> &Arc<AsyncCoordinator> {
        &self.inner.coordinator
    }

    /// Live arena save points
    pub fn arena_depth(&self) -> usize {
        self.inner.arena.lock().depth()
    }

    #[inline]
    pub fn strict_checks(&self) -> bool {
        self.inner.strict
    }

    #[inline]
    pub fn pointer_width(&self) -> PointerWidth {
        self.inner.width
    }

    /// One-shot invocation
    pub fn call(
        &self,
        ident: &str,
        return_type: ReturnType,
        arg_types: &[ArgType],
        args: Vec<Value>,
        options: Option<CallOptions>,
    ) -> Result<Outcome, CallError> {
        self.invoke(CallDescriptor {
            ident: ident.to_owned(),
            return_type,
            arg_types: arg_types.to_vec(),
            args,
            options,
        })
    }

    /// Invoke a fully described call
    pub fn invoke(&self, call: CallDescriptor) -> Result<Outcome, CallError> {
        let async_mode = call.async_mode();
        let CallDescriptor {
            ident,
            return_type,
            arg_types,
            args,
            ..
        } = call;

        let _span = debug_span!("ccall", function = %ident).entered();
        let inner = &*self.inner;
        inner.stats.calls_made.fetch_add(1, Ordering::Relaxed);

        // Checked before anything is allocated: no cleanup needed
        if return_type == ReturnType::Array {
            return Err(CallError::InvalidReturnTag { ident });
        }
        let func = inner
            .symbols
            .resolve(&ident)
            .map_err(|source| CallError::UnknownSymbol {
                ident: ident.clone(),
                source,
            })?;
        if inner.strict {
            marshal::check_args(&arg_types, &args).map_err(|e| self.marshal_failure(&ident, e))?;
        }

        log_call(&ident, args.len());
        let mut frame = StackFrame::lazy(Arc::clone(&inner.arena));
        let wire = marshal::marshal_args(&self.marshal_context(), &mut frame, &arg_types, args)
            .map_err(|e| self.marshal_failure(&ident, e))?;

        let previous = inner.engine.current_operation();
        let keepalive = inner.coordinator.hold();
        let raw = func.invoke(&wire);
        let current = inner.engine.current_operation();

        match inner.coordinator.observe(&ident, previous, current, async_mode) {
            Ok(Transition::Completed) => {
                drop(keepalive);
                let value = self.finish(&ident, raw, return_type, frame)?;
                log_return(&ident, async_mode);
                Ok(if async_mode {
                    Outcome::Deferred(Deferred::resolved(value))
                } else {
                    Outcome::Ready(value)
                })
            }
            Ok(Transition::Suspended(operation)) => {
                inner.stats.suspensions.fetch_add(1, Ordering::Relaxed);
                log_suspend(&ident, operation);

                let Some(completion) = inner.engine.when_current_completes() else {
                    return Err(self.violation(ProtocolViolation::CompletionLost { ident }));
                };

                // Frame and keepalive stay with the foreign call, even if the deferred is dropped
                let suspension = Suspension::new(
                    Arc::clone(&inner.coordinator),
                    operation,
                    ident.clone(),
                    Pinned {
                        completion,
                        frame,
                        keepalive,
                    },
                );
                let bridge = self.clone();
                Ok(Outcome::Deferred(Deferred::new(async move {
                    let (raw, frame) = suspension.await.map_err(|v| bridge.violation(v))?;
                    log_resume(&ident, operation);
                    bridge.finish(&ident, raw, return_type, frame)
                })))
            }
            Err(violation) => {
                drop(frame);
                Err(self.violation(violation))
            }
        }
    }

    /// Convert the raw return value, then release the frame
    pub(crate) fn finish(
        &self,
        ident: &str,
        raw: Value,
        return_type: ReturnType,
        frame: StackFrame,
    ) -> Result<Value, CallError> {
        let converted = marshal::from_wire(&self.marshal_context(), raw, return_type);
        frame.release();
        converted.map_err(|e| self.marshal_failure(ident, e))
    }

    #[inline]
    fn marshal_context(&self) -> MarshalContext<'_> {
        MarshalContext {
            codec: self.inner.codec.as_ref(),
            width: self.inner.width,
        }
    }

    fn marshal_failure(&self, ident: &str, source: MarshalError) -> CallError {
        self.inner.stats.marshaling_errors.fetch_add(1, Ordering::Relaxed);
        log_marshal_error(ident, &source);
        CallError::MarshalFailure {
            ident: ident.to_owned(),
            source,
        }
    }

    fn violation(&self, violation: ProtocolViolation) -> CallError {
        self.inner.stats.protocol_violations.fetch_add(1, Ordering::Relaxed);
        log_violation(&violation);
        CallError::AsyncProtocolViolation(violation)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("symbols", &self.inner.symbols)
            .field("strict", &self.inner.strict)
            .field("width", &self.inner.width)
            .field("state", &self.inner.coordinator.state())
            .finish()
    }
}

/// Assembles a `Bridge`, filling unset collaborators from the config
#[derive(Default)]
pub struct BridgeBuilder {
    config: BridgeConfig,
    symbols: Option<Arc<SymbolTable>>,
    memory: Option<SharedMemory>,
    arena: Option<SharedArena>,
    codec: Option<Arc<dyn TextCodec>>,
    engine: Option<Arc<dyn SuspendEngine>>,
    coordinator: Option<Arc<AsyncCoordinator>>,
}

impl BridgeBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn symbols(mut self, symbols: Arc<SymbolTable>) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// Memory backing the default arena window and codec
    pub fn memory(mut self, memory: SharedMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn arena(mut self, arena: SharedArena) -> Self {
        self.arena = Some(arena);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn TextCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn engine(mut self, engine: Arc<dyn SuspendEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Defaults to the process-wide coordinator
    pub fn coordinator(mut self, coordinator: Arc<AsyncCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn build(self) -> Bridge {
        let config = self.config;
        let memory = self
            .memory
            .unwrap_or_else(|| LinearMemory::shared(config.memory.size));

        let arena = self.arena.unwrap_or_else(|| {
            let window_end = config.memory.stack_base.checked_add(config.memory.stack_size);
            if window_end.map_or(true, |end| end > memory.read().size()) {
                warn!(
                    target: "arena",
                    window_end = ?window_end,
                    memory = memory.read().size(),
                    "arena window extends past the end of memory"
                );
            }
            allocator::share(StackArena::new(
                config.memory.stack_base,
                config.memory.stack_size,
            ))
        });

        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(Utf8Codec::new(Arc::clone(&memory))));

        Bridge {
            inner: Arc::new(BridgeInner {
                symbols: self.symbols.unwrap_or_default(),
                arena,
                codec,
                engine: self.engine.unwrap_or_else(|| Arc::new(NeverSuspend)),
                coordinator: self.coordinator.unwrap_or_else(AsyncCoordinator::global),
                strict: config.strict_checks,
                width: config.pointer_width,
                stats: CallStats::default(),
            }),
        }
    }
}

/// Call failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownSymbol,
    InvalidReturnTag,
    AsyncProtocolViolation,
    MarshalFailure,
}

/// Errors surfaced by `call`, `wrap` and bound functions
#[derive(Debug, Clone, PartialEq)]
pub enum CallError {
    UnknownSymbol { ident: String, source: SymbolError },
    InvalidReturnTag { ident: String },
    AsyncProtocolViolation(ProtocolViolation),
    MarshalFailure { ident: String, source: MarshalError },
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownSymbol { .. } => ErrorKind::UnknownSymbol,
            Self::InvalidReturnTag { .. } => ErrorKind::InvalidReturnTag,
            Self::AsyncProtocolViolation(_) => ErrorKind::AsyncProtocolViolation,
            Self::MarshalFailure { .. } => ErrorKind::MarshalFailure,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSymbol { ident, source } => write!(
                f,
                "Cannot call unknown function {} ({}), make sure it is exported",
                ident, source
            ),
            Self::InvalidReturnTag { ident } => {
                write!(f, "Return type of {} should not be \"array\"", ident)
            }
            Self::AsyncProtocolViolation(violation) => write!(f, "{}", violation),
            Self::MarshalFailure { ident, source } => {
                write!(f, "Marshalling failed for {}: {}", ident, source)
            }
        }
    }
}

impl std::error::Error for CallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnknownSymbol { source, .. } => Some(source),
            Self::AsyncProtocolViolation(violation) => Some(violation),
            Self::MarshalFailure { source, .. } => Some(source),
            Self::InvalidReturnTag { .. } => None,
        }
    }
}
