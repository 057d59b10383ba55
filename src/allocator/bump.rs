//! Bump arena over a reserved window of foreign memory - O(1) alloc and restore
//!
//! Design: The window `[base, limit)` is carved out of `LinearMemory` by the
//! embedder. Allocation bumps `top` upward; restoring a save point moves it
//! back, releasing every allocation made since.

use super::{Address, ArenaError, SavePoint, ScopedArena};
use tracing::{trace, warn};

/// Alignment of every arena allocation
const STACK_ALIGN: usize = 8;

/// Bump arena state
#[derive(Debug)]
pub struct StackArena {
    base: Address,
    top: Address,
    limit: Address,
    depth: usize,
}

impl StackArena {
    /// Arena over `size` bytes starting at `base`, clamped to the address space
    pub const fn new(base: Address, size: usize) -> Self {
        Self {
            base,
            top: base,
            limit: base.saturating_add(size),
            depth: 0,
        }
    }

    /// Bytes currently allocated
    #[inline]
    pub fn used(&self) -> usize {
        self.top - self.base
    }

    /// Remaining capacity
    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.top)
    }

    #[inline]
    pub fn base(&self) -> Address {
        self.base
    }
}

impl ScopedArena for StackArena {
    fn save(&mut self) -> SavePoint {
        self.depth += 1;
        SavePoint {
            top: self.top,
            depth: self.depth,
        }
    }

    #[inline]
    fn alloc(&mut self, size: usize) -> Result<Address, ArenaError> {
        let end = align_up(self.top, STACK_ALIGN)
            .and_then(|start| Some((start, start.checked_add(size)?)))
            .filter(|&(_, end)| end <= self.limit);

        match end {
            Some((start, end)) => {
                self.top = end;
                trace!(target: "arena", address = start, size, "arena allocation");
                Ok(start)
            }
            None => Err(ArenaError::Exhausted {
                requested: size,
                available: self.remaining(),
            }),
        }
    }

    fn restore(&mut self, point: SavePoint) {
        if point.depth != self.depth {
            warn!(
                target: "arena",
                expected = self.depth,
                found = point.depth,
                "save point restored out of order"
            );
        }
        debug_assert!(point.top >= self.base && point.top <= self.limit, "foreign save point");
        self.top = point.top;
        self.depth = point.depth.saturating_sub(1);
    }

    #[inline]
    fn depth(&self) -> usize {
        self.depth
    }
}

/// Align address upward to next multiple of alignment; `None` past the address space
#[inline(always)]
const fn align_up(addr: usize, align: usize) -> Option<usize> {
    match addr.checked_add(align - 1) {
        Some(bumped) => Some(bumped & !(align - 1)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(1, 8), Some(8));
        assert_eq!(align_up(8, 8), Some(8));
        assert_eq!(align_up(9, 8), Some(16));
        assert_eq!(align_up(usize::MAX - 7, 8), Some(usize::MAX - 7));
        assert_eq!(align_up(usize::MAX - 3, 8), None);
    }
}
