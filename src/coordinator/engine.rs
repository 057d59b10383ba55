//! Suspension engine interface and a manually driven reference engine
//!
//! The engine owns the mechanics of unwinding and rewinding a foreign call.
//! The coordinator only reads its current-operation marker and subscribes to
//! the completion of the current operation.

use crate::value::Value;
use core::fmt;
use core::num::NonZeroU64;
use futures::channel::oneshot;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Opaque marker of one suspended foreign call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(NonZeroU64);

impl OperationId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Channel delivering the raw return value of a resumed call
pub type Completion = oneshot::Receiver<Value>;

/// Coroutine engine consumed by the coordinator
pub trait SuspendEngine: Send + Sync {
    /// Marker of the operation currently unwound, if any
    fn current_operation(&self) -> Option<OperationId>;

    /// Subscribe to completion of the current operation
    ///
    /// Returns `None` when nothing is suspended or the completion was
    /// already taken.
    fn when_current_completes(&self) -> Option<Completion>;
}

/// Engine for modules built without suspension support
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverSuspend;

impl SuspendEngine for NeverSuspend {
    fn current_operation(&self) -> Option<OperationId> {
        None
    }

    fn when_current_completes(&self) -> Option<Completion> {
        None
    }
}

struct Suspended {
    id: OperationId,
    sender: oneshot::Sender<Value>,
    receiver: Option<Completion>,
}

#[derive(Default)]
struct EngineState {
    next_id: u64,
    suspended: Vec<Suspended>,
}

/// Engine driven explicitly by foreign code (`suspend`) and the host (`resume`)
///
/// The most recently suspended operation is the current one.
#[derive(Default)]
pub struct ManualEngine {
    state: Mutex<EngineState>,
}

impl ManualEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin unwinding: called from inside a foreign function
    pub fn suspend(&self) -> OperationId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = OperationId(NonZeroU64::new(state.next_id).unwrap_or(NonZeroU64::MIN));
        let (sender, receiver) = oneshot::channel();
        state.suspended.push(Suspended {
            id,
            sender,
            receiver: Some(receiver),
        });
        debug!(target: "coordinator", operation = %id, "foreign call unwound");
        id
    }

    /// Rewind `operation` to completion, delivering its raw return value
    pub fn resume(&self, operation: OperationId, value: Value) -> Result<(), EngineError> {
        let suspended = {
            let mut state = self.state.lock();
            let index = state
                .suspended
                .iter()
                .position(|s| s.id == operation)
                .ok_or(EngineError::UnknownOperation(operation))?;
            state.suspended.remove(index)
        };

        debug!(target: "coordinator", operation = %operation, "foreign call rewound");
        if suspended.sender.send(value).is_err() {
            warn!(
                target: "coordinator",
                operation = %operation,
                "completion dropped: nobody was waiting"
            );
        }
        Ok(())
    }

    /// Operations suspended and not yet resumed
    pub fn pending(&self) -> usize {
        self.state.lock().suspended.len()
    }
}

impl SuspendEngine for ManualEngine {
    fn current_operation(&self) -> Option<OperationId> {
        self.state.lock().suspended.last().map(|s| s.id)
    }

    fn when_current_completes(&self) -> Option<Completion> {
        self.state
            .lock()
            .suspended
            .last_mut()
            .and_then(|s| s.receiver.take())
    }
}

impl fmt::Debug for ManualEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let ids: Vec<_> = state.suspended.iter().map(|s| s.id).collect();
        f.debug_struct("ManualEngine").field("suspended", &ids).finish()
    }
}

/// Engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    UnknownOperation(OperationId),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOperation(op) => write!(f, "No suspended operation {}", op),
        }
    }
}

impl std::error::Error for EngineError {}
