//! Native segments over blocks from the allocation backend.

use memseg_scope::{config, ResourceScope};

use super::{Backing, MemorySegment};
use crate::backend::NativeBlock;
use crate::error::Result;

impl MemorySegment {
    /// Allocate `size` bytes aligned to `align` under `scope`. The block is
    /// freed when the scope closes. Zero-filled unless configured otherwise.
    pub fn allocate_native(size: usize, align: usize, scope: &ResourceScope) -> Result<Self> {
        Self::allocate_native_with(size, align, scope, config().zero_fill_native)
    }

    pub fn allocate_native_with(
        size: usize,
        align: usize,
        scope: &ResourceScope,
        zero_fill: bool,
    ) -> Result<Self> {
        scope.check_valid_state()?;
        let block = NativeBlock::allocate(size, align, zero_fill, config().max_malloc_align)?;
        let addr = block.addr();
        // If registration fails the closure drops, and the block with it.
        scope.add_close_action(move || drop(block))?;
        Ok(Self::from_parts(
            Backing::Native,
            addr,
            size,
            false,
            scope.clone(),
        ))
    }

    /// A segment over memory this crate did not allocate.
    ///
    /// # Safety
    ///
    /// `[addr, addr + size)` must be valid for reads and writes until `scope`
    /// closes.
    pub(crate) unsafe fn from_raw(addr: usize, size: usize, scope: &ResourceScope) -> Self {
        Self::from_parts(Backing::Native, addr, size, false, scope.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::native_stats;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn native_allocation_is_zeroed_and_aligned() {
        let scope = ResourceScope::new_confined();
        let seg = MemorySegment::allocate_native(64, 32, &scope).unwrap();
        assert!(seg.is_native());
        assert_eq!(seg.base() % 32, 0);
        assert_eq!(seg.to_vec::<u8>().unwrap(), vec![0u8; 64]);
    }

    #[test]
    fn close_frees_the_block() {
        let scope = ResourceScope::new_confined();
        let _seg = MemorySegment::allocate_native(1 << 20, 8, &scope).unwrap();
        assert!(native_stats().peak_bytes >= 1 << 20);
        let freed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&freed);
        // Registered last, so it runs before the block is freed.
        scope
            .add_close_action(move || flag.store(true, Ordering::SeqCst))
            .unwrap();
        scope.close().unwrap();
        assert!(freed.load(Ordering::SeqCst));
    }

    #[test]
    fn closed_scope_cannot_allocate() {
        let scope = ResourceScope::new_shared();
        scope.close().unwrap();
        let err = MemorySegment::allocate_native(8, 8, &scope).unwrap_err();
        assert!(err.is_closed());
    }

    #[test]
    fn foreign_thread_cannot_allocate_on_confined_scope() {
        let scope = ResourceScope::new_confined();
        let remote = scope.clone();
        let err = std::thread::spawn(move || MemorySegment::allocate_native(8, 8, &remote).unwrap_err())
            .join()
            .unwrap();
        assert!(matches!(
            err.as_scope_error(),
            Some(memseg_scope::Error::WrongThread { .. })
        ));
    }
}
