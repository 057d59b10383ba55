//! Async invocation coordinator - single-in-flight suspension protocol
//!
//! Design: Explicit two-state machine (`Idle` / `InFlight`) with exactly two
//! mutation points:
//! 1. `observe` - after a foreign call returns, compare engine markers and
//!    start an in-flight operation if the call unwound
//! 2. `complete` - when the engine delivers that operation's completion,
//!    through its deferred or, if the deferred was dropped, through `settle`
//!
//! At most one suspended foreign call exists process-wide. Any other marker
//! change is a caller programming error and is reported, never reset.

mod deferred;
mod engine;
mod suspension;


pub use deferred::{Deferred, Outcome};
pub use engine::{Completion, EngineError, ManualEngine, NeverSuspend, OperationId, SuspendEngine};
pub(crate) use suspension::{Pinned, Suspension};

use core::fmt;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Process-wide coordinator, created on first use
static GLOBAL: Lazy<Arc<AsyncCoordinator>> = Lazy::new(|| Arc::new(AsyncCoordinator::new()));

/// Coordinator state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AsyncState {
    #[default]
    Idle,
    InFlight { operation: OperationId, ident: String },
}

/// Result of observing one foreign call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Marker unchanged: the call returned normally
    Completed,
    /// The call unwound and is now in flight
    Suspended(OperationId),
}

/// Resources of a suspended call whose deferred was dropped
#[derive(Debug)]
struct Parked {
    operation: OperationId,
    ident: String,
    pinned: Pinned,
}

/// Owner of the single-in-flight invariant
#[derive(Debug, Default)]
pub struct AsyncCoordinator {
    state: Mutex<AsyncState>,
    keepalive: Arc<AtomicUsize>,
    parked: Mutex<Option<Parked>>,
}

impl AsyncCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Snapshot of the current state, after settling any parked call
    pub fn state(&self) -> AsyncState {
        self.settle();
        self.state.lock().clone()
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.settle();
        matches!(*self.state.lock(), AsyncState::Idle)
    }

    /// Invocations started and not yet completed
    #[inline]
    pub fn keepalive(&self) -> usize {
        self.keepalive.load(Ordering::Acquire)
    }

    /// Keep the foreign runtime alive until the returned guard drops
    pub(crate) fn hold(&self) -> KeepAlive {
        self.keepalive.fetch_add(1, Ordering::AcqRel);
        KeepAlive {
            count: Arc::clone(&self.keepalive),
        }
    }

    /// Whether a dropped deferred left a suspended call parked here
    pub fn has_parked(&self) -> bool {
        self.parked.lock().is_some()
    }

    /// Complete a parked call if the engine has delivered its result
    ///
    /// Releases the call's frame and keepalive and returns to `Idle`. Runs
    /// on every state query and before every observation; returns whether a
    /// parked call was settled.
    pub fn settle(&self) -> bool {
        let mut parked = self.parked.lock();
        let delivered = match parked.as_mut() {
            Some(p) => p.pinned.completion.try_recv(),
            None => return false,
        };

        if let Ok(None) = delivered {
            return false;
        }
        let taken = parked.take();
        drop(parked);

        if let Some(Parked { operation, ident, pinned }) = taken {
            // Frame and keepalive go before the state changes
            drop(pinned);
            match delivered {
                Ok(_) => match self.complete(operation) {
                    Ok(()) => debug!(
                        target: "coordinator",
                        ident = %ident,
                        operation = %operation,
                        "parked call settled"
                    ),
                    Err(violation) => {
                        warn!(target: "coordinator", error = %violation, "parked completion rejected")
                    }
                },
                Err(_) => warn!(
                    target: "coordinator",
                    ident = %ident,
                    operation = %operation,
                    "parked call lost its completion"
                ),
            }
        }
        true
    }

    /// Keep a suspended call's resources until the engine completes it
    pub(crate) fn park(&self, operation: OperationId, ident: String, pinned: Pinned) {
        let replaced = self.parked.lock().replace(Parked {
            operation,
            ident,
            pinned,
        });
        if let Some(old) = replaced {
            warn!(target: "coordinator", operation = %old.operation, "parked call displaced");
        }
    }

    /// Classify a finished foreign call by its marker before and after
    pub(crate) fn observe(
        &self,
        ident: &str,
        previous: Option<OperationId>,
        current: Option<OperationId>,
        async_mode: bool,
    ) -> Result<Transition, ProtocolViolation> {
        self.settle();
        if previous == current {
            return Ok(Transition::Completed);
        }

        let mut state = self.state.lock();
        match (previous, current) {
            (Some(_), Some(_)) => Err(ProtocolViolation::AlreadyInFlight {
                ident: ident.to_owned(),
                outstanding: describe(&state),
            }),
            (Some(_), None) => Err(ProtocolViolation::StoppedForeignOperation {
                ident: ident.to_owned(),
            }),
            (None, Some(operation)) => {
                if let AsyncState::InFlight { .. } = *state {
                    return Err(ProtocolViolation::AlreadyInFlight {
                        ident: ident.to_owned(),
                        outstanding: describe(&state),
                    });
                }
                if !async_mode {
                    return Err(ProtocolViolation::NotOptedIn {
                        ident: ident.to_owned(),
                    });
                }

                *state = AsyncState::InFlight {
                    operation,
                    ident: ident.to_owned(),
                };
                info!(target: "coordinator", ident, operation = %operation, "async call in flight");
                Ok(Transition::Suspended(operation))
            }
            (None, None) => Ok(Transition::Completed),
        }
    }

    /// Return to `Idle` once `operation` has completed
    pub(crate) fn complete(&self, operation: OperationId) -> Result<(), ProtocolViolation> {
        let mut state = self.state.lock();
        let in_flight = matches!(
            &*state,
            AsyncState::InFlight { operation: current, .. } if *current == operation
        );
        if !in_flight {
            return Err(ProtocolViolation::UnknownOperation {
                operation,
                outstanding: describe(&state),
            });
        }

        if let AsyncState::InFlight { ident, .. } = core::mem::take(&mut *state) {
            debug!(target: "coordinator", ident = %ident, operation = %operation, "async call completed");
        }
        Ok(())
    }
}

/// One outstanding invocation; released on drop
#[derive(Debug)]
pub(crate) struct KeepAlive {
    count: Arc<AtomicUsize>,
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "keepalive underflow");
    }
}

fn describe(state: &AsyncState) -> String {
    match state {
        AsyncState::Idle => "none".to_owned(),
        AsyncState::InFlight { operation, ident } => format!("{} ({})", ident, operation),
    }
}

/// Misuse of the suspension protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// The call unwound without `async` in its options
    NotOptedIn { ident: String },
    /// A second suspension while one is outstanding
    AlreadyInFlight { ident: String, outstanding: String },
    /// The call cleared a marker it did not start
    StoppedForeignOperation { ident: String },
    /// Completion for an operation that is not the one in flight
    UnknownOperation { operation: OperationId, outstanding: String },
    /// The engine closed the completion channel without a value
    CompletionLost { ident: String },
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOptedIn { ident } => write!(
                f,
                "The call to {} is running asynchronously; pass the async option to call/wrap if this was intended",
                ident
            ),
            Self::AlreadyInFlight { ident, outstanding } => write!(
                f,
                "Cannot start an async operation in {} while one is already in flight: {}",
                ident, outstanding
            ),
            Self::StoppedForeignOperation { ident } => write!(
                f,
                "The call to {} stopped an async operation it did not start",
                ident
            ),
            Self::UnknownOperation { operation, outstanding } => write!(
                f,
                "Completion of {} does not match the operation in flight: {}",
                operation, outstanding
            ),
            Self::CompletionLost { ident } => write!(
                f,
                "The suspended call to {} was dropped before it completed",
                ident
            ),
        }
    }
}

impl std::error::Error for ProtocolViolation {}
