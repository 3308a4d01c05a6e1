use std::cell::RefCell;

use memseg_scope::{config, ResourceScope};

use super::bump::Bump;
use super::SegmentAllocator;
use crate::error::Result;
use crate::segment::MemorySegment;

/// Single-threaded bump arena over a scope.
///
/// Every segment it hands out belongs to the arena's scope and is freed, with
/// the blocks behind it, when that scope closes.
pub struct ArenaAllocator {
    bump: RefCell<Bump>,
}

impl ArenaAllocator {
    /// Unbounded arena refilling with the configured block size.
    pub fn new(scope: &ResourceScope) -> Self {
        Self::with_block_size(scope, config().arena_block_size)
    }

    pub fn with_block_size(scope: &ResourceScope, block_size: usize) -> Self {
        Self {
            bump: RefCell::new(Bump::unbounded(scope, block_size)),
        }
    }

    /// Arena with a fixed total capacity, reserved up front.
    pub fn bounded(capacity: usize, scope: &ResourceScope) -> Result<Self> {
        Ok(Self {
            bump: RefCell::new(Bump::bounded(scope, capacity)?),
        })
    }

    pub fn scope(&self) -> ResourceScope {
        self.bump.borrow().scope().clone()
    }
}

impl SegmentAllocator for ArenaAllocator {
    fn allocate(&self, size: usize, align: usize) -> Result<MemorySegment> {
        self.bump.borrow_mut().allocate(size, align)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn arena_segments_share_the_scope() {
        let scope = ResourceScope::new_confined();
        let arena = ArenaAllocator::with_block_size(&scope, 128);
        let ints = arena.allocate_array(&[1i64, 2, 3]).unwrap();
        let text = arena.allocate_utf8("arena").unwrap();
        assert!(ints.scope().same_scope(&scope));
        assert!(ints.as_overlapping(&text).is_none());
        assert_eq!(ints.to_long_array().unwrap(), vec![1, 2, 3]);
        scope.close().unwrap();
        assert!(text.get_utf8(0).unwrap_err().is_closed());
        assert!(arena.allocate(1, 1).unwrap_err().is_closed());
    }

    #[test]
    fn bounded_arena_reports_out_of_memory() {
        let scope = ResourceScope::new_confined();
        let arena = ArenaAllocator::bounded(16, &scope).unwrap();
        arena.allocate_value(1u64).unwrap();
        arena.allocate_value(2u64).unwrap();
        let err = arena.allocate_value(3u8).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory { requested: 1, .. }));
    }

    #[test]
    fn foreign_thread_is_rejected() {
        let scope = ResourceScope::new_confined();
        let arena = ArenaAllocator::new(&scope);
        let err = std::thread::spawn(move || arena.allocate(8, 8).unwrap_err())
            .join()
            .unwrap();
        assert!(matches!(
            err.as_scope_error(),
            Some(memseg_scope::Error::WrongThread { .. })
        ));
    }
}
