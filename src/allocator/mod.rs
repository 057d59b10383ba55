//! Scoped temporary storage for call arguments
//!
//! Design: Stack-discipline allocation in three layers:
//! 1. `LinearMemory` - byte-addressed foreign memory
//! 2. `ScopedArena` - save point / allocate / restore over a reserved window
//! 3. `StackFrame` - lazy per-call save point, restored exactly once
//!
//! The bridge consumes any `ScopedArena`; `StackArena` is the bump
//! implementation used by the default builder and the tests.

mod bump;
mod memory;

#[cfg(test)]
mod tests;

pub use bump::StackArena;
pub use memory::{LinearMemory, SharedMemory};

use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;
use crate::logging::log_frame_release;

/// Byte offset into foreign memory
pub type Address = usize;

/// Opaque save-point token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePoint {
    pub(crate) top: Address,
    pub(crate) depth: usize,
}

/// Stack-discipline allocator consumed by the marshaller
pub trait ScopedArena: Send {
    /// Mark a save point; everything allocated after it is released by `restore`
    fn save(&mut self) -> SavePoint;

    /// Allocate `size` bytes, returning their address
    fn alloc(&mut self, size: usize) -> Result<Address, ArenaError>;

    /// Release everything allocated since `point`
    fn restore(&mut self, point: SavePoint);

    /// Number of save points not yet restored
    fn depth(&self) -> usize;
}

/// Arena shared between the facade and deferred completions
pub type SharedArena = Arc<Mutex<Box<dyn ScopedArena>>>;

/// Wrap an arena for sharing
pub fn share<A: ScopedArena + 'static>(arena: A) -> SharedArena {
    Arc::new(Mutex::new(Box::new(arena)))
}

/// Per-call frame: takes its save point on first allocation
///
/// Dropping the frame restores the arena, so every exit path of a call
/// (success, error, deferred completion) releases it exactly once.
pub struct StackFrame {
    arena: SharedArena,
    save_point: Option<SavePoint>,
}

impl StackFrame {
    /// Frame that has not touched the arena yet
    #[inline]
    pub fn lazy(arena: SharedArena) -> Self {
        Self {
            arena,
            save_point: None,
        }
    }

    /// Allocate from the arena, marking the save point first if needed
    pub fn alloc(&mut self, size: usize) -> Result<Address, ArenaError> {
        let mut arena = self.arena.lock();
        if self.save_point.is_none() {
            self.save_point = Some(arena.save());
        }
        arena.alloc(size)
    }

    /// Whether a save point was taken
    #[inline]
    pub fn is_active(&self) -> bool {
        self.save_point.is_some()
    }

    /// Restore the arena now
    pub fn release(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(point) = self.save_point.take() {
            self.arena.lock().restore(point);
            log_frame_release(point.top, point.depth);
        }
    }
}

impl Drop for StackFrame {
    fn drop(&mut self) {
        self.restore();
    }
}

impl fmt::Debug for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackFrame")
            .field("save_point", &self.save_point)
            .finish()
    }
}

/// Arena allocation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    Exhausted { requested: usize, available: usize },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { requested, available } => write!(
                f,
                "Arena exhausted: requested {} bytes, {} available",
                requested, available
            ),
        }
    }
}

impl std::error::Error for ArenaError {}
