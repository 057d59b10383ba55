//! Allocator tests
//!
//! Organized by component:
//! - Stack arena: bump allocation, alignment, exhaustion
//! - Save points: nesting and depth tracking
//! - Stack frames: lazy save point, release on every exit path
//! - Linear memory: bounds checks and C strings

use super::*;

// ===== Stack Arena Tests =====

#[test]
fn arena_allocations_are_aligned_and_increasing() {
    let mut arena = StackArena::new(1024, 256);

    let a = arena.alloc(3).expect("first alloc");
    let b = arena.alloc(5).expect("second alloc");
    let c = arena.alloc(1).expect("third alloc");

    assert_eq!(a, 1024);
    assert_eq!(b, 1032);
    assert_eq!(c, 1040);
    assert_eq!(arena.used(), 17);
}

#[test]
fn arena_reports_exhaustion() {
    let mut arena = StackArena::new(0, 16);
    arena.alloc(12).expect("fits");

    let err = arena.alloc(8).unwrap_err();
    assert_eq!(
        err,
        ArenaError::Exhausted {
            requested: 8,
            available: 4
        }
    );
    // Failed allocation leaves the arena untouched
    assert_eq!(arena.used(), 12);
}

#[test]
fn arena_window_clamps_at_address_space_end() {
    let mut arena = StackArena::new(usize::MAX - 15, 64);
    assert_eq!(arena.remaining(), 15);

    let err = arena.alloc(16).unwrap_err();
    assert!(matches!(err, ArenaError::Exhausted { requested: 16, .. }));
    assert_eq!(arena.used(), 0);

    // An unaligned cursor at the very end must not wrap to address zero
    arena.alloc(9).unwrap();
    assert!(arena.alloc(1).is_err());
    assert_eq!(arena.used(), 9);
}

#[test]
fn arena_zero_sized_allocation() {
    let mut arena = StackArena::new(64, 32);
    let addr = arena.alloc(0).expect("zero-sized alloc");
    assert_eq!(addr, 64);
    assert_eq!(arena.used(), 0);
}

// ===== Save Point Tests =====

#[test]
fn restore_releases_everything_since_save_point() {
    let mut arena = StackArena::new(0, 128);
    arena.alloc(8).unwrap();

    let point = arena.save();
    arena.alloc(32).unwrap();
    arena.alloc(32).unwrap();
    assert_eq!(arena.depth(), 1);

    arena.restore(point);
    assert_eq!(arena.used(), 8);
    assert_eq!(arena.depth(), 0);
}

#[test]
fn nested_save_points_track_depth() {
    let mut arena = StackArena::new(0, 128);

    let outer = arena.save();
    arena.alloc(16).unwrap();
    let inner = arena.save();
    arena.alloc(16).unwrap();
    assert_eq!(arena.depth(), 2);

    arena.restore(inner);
    assert_eq!(arena.depth(), 1);
    assert_eq!(arena.used(), 16);

    arena.restore(outer);
    assert_eq!(arena.depth(), 0);
    assert_eq!(arena.used(), 0);
}

// ===== Stack Frame Tests =====

#[test]
fn frame_without_allocation_never_saves() {
    let arena = share(StackArena::new(0, 64));
    let frame = StackFrame::lazy(arena.clone());

    assert!(!frame.is_active());
    frame.release();
    assert_eq!(arena.lock().depth(), 0);
}

#[test]
fn frame_saves_on_first_allocation_only() {
    let arena = share(StackArena::new(0, 64));
    let mut frame = StackFrame::lazy(arena.clone());

    frame.alloc(4).unwrap();
    frame.alloc(4).unwrap();
    assert!(frame.is_active());
    assert_eq!(arena.lock().depth(), 1);

    frame.release();
    assert_eq!(arena.lock().depth(), 0);
}

#[test]
fn dropped_frame_restores_arena() {
    let arena = share(StackArena::new(0, 64));
    {
        let mut frame = StackFrame::lazy(arena.clone());
        frame.alloc(40).unwrap();
        assert!(frame.alloc(40).is_err());
    }
    assert_eq!(arena.lock().depth(), 0);

    // Whole window available again
    let mut frame = StackFrame::lazy(arena.clone());
    assert!(frame.alloc(64).is_ok());
}

// ===== Linear Memory Tests =====

#[test]
fn memory_write_then_read() {
    let mut memory = LinearMemory::new(32);
    memory.write(4, b"abc").unwrap();
    assert_eq!(memory.read(4, 3).unwrap(), b"abc");
}

#[test]
fn memory_rejects_out_of_bounds_access() {
    let mut memory = LinearMemory::new(8);
    assert!(memory.write(6, b"abc").is_err());
    assert!(memory.read(usize::MAX, 2).is_err());
}

#[test]
fn memory_reads_c_strings() {
    let mut memory = LinearMemory::new(16);
    memory.write(2, b"hi\0there").unwrap();
    assert_eq!(memory.read_c_string(2).unwrap(), b"hi");

    let mut full = LinearMemory::new(4);
    full.write(0, b"abcd").unwrap();
    assert!(matches!(
        full.read_c_string(0),
        Err(crate::codec::CodecError::Unterminated { addr: 0 })
    ));
}
