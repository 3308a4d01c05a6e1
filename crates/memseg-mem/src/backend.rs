//! Native allocation backend and its statistics.
//!
//! Blocks come from the global allocator at the alignment the backend
//! guarantees (`max_malloc_align`). Stricter alignments over-allocate by
//! `align - 1` bytes and round the address up, so the block freed at cleanup
//! is the original pointer with the full size, not the aligned view.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::telemetry::trace_event;

/// Peak/live tracking for native allocations.
struct AllocStats {
    allocated: AtomicUsize,
    peak: AtomicUsize,
    live: AtomicUsize,
}

impl AllocStats {
    const fn new() -> Self {
        Self {
            allocated: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        }
    }

    fn record_alloc(&self, bytes: usize) {
        let used = self.allocated.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.live.fetch_add(1, Ordering::AcqRel);
        let mut cur = self.peak.load(Ordering::Relaxed);
        while used > cur {
            match self
                .peak
                .compare_exchange(cur, used, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }

    fn record_free(&self, bytes: usize) {
        self.allocated.fetch_sub(bytes, Ordering::AcqRel);
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

static STATS: AllocStats = AllocStats::new();

/// A point-in-time view of native allocation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeStats {
    /// Bytes currently held from the global allocator, padding included.
    pub allocated_bytes: usize,
    pub peak_bytes: usize,
    pub live_allocations: usize,
}

pub fn native_stats() -> NativeStats {
    NativeStats {
        allocated_bytes: STATS.allocated.load(Ordering::Relaxed),
        peak_bytes: STATS.peak.load(Ordering::Relaxed),
        live_allocations: STATS.live.load(Ordering::Relaxed),
    }
}

/// One block obtained from the global allocator. Freed on drop.
pub(crate) struct NativeBlock {
    raw: NonNull<u8>,
    layout: Layout,
    addr: usize,
}

// SAFETY: the block is plain bytes owned exclusively by this value; nothing
// about it is tied to the allocating thread.
unsafe impl Send for NativeBlock {}

impl NativeBlock {
    /// Allocate `size` usable bytes whose first byte is aligned to `align`.
    pub(crate) fn allocate(
        size: usize,
        align: usize,
        zero_fill: bool,
        max_malloc_align: usize,
    ) -> Result<Self> {
        if align == 0 || !align.is_power_of_two() {
            return Err(Error::Misaligned { align });
        }
        let base_align = max_malloc_align.max(1);
        let padded = if align > base_align {
            size.checked_add(align - 1).ok_or(Error::Overflow {
                what: "aligned allocation size",
            })?
        } else {
            size
        };
        // The global allocator rejects zero-sized layouts.
        let layout = Layout::from_size_align(padded.max(1), base_align)
            .map_err(|_| Error::OutOfMemory {
                requested: size,
                align,
            })?;
        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe {
            if zero_fill {
                alloc::alloc_zeroed(layout)
            } else {
                alloc::alloc(layout)
            }
        };
        let raw = NonNull::new(raw).ok_or(Error::OutOfMemory {
            requested: size,
            align,
        })?;
        let start = raw.as_ptr() as usize;
        let addr = (start + align - 1) & !(align - 1);
        STATS.record_alloc(layout.size());
        trace_event!(size, align, padded = layout.size(), "native alloc");
        Ok(Self { raw, layout, addr })
    }

    /// Aligned address of the usable region.
    pub(crate) fn addr(&self) -> usize {
        self.addr
    }

    #[cfg(test)]
    pub(crate) fn allocated_size(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for NativeBlock {
    fn drop(&mut self) {
        // SAFETY: `raw` was returned by the global allocator for `layout` and
        // is freed exactly once, here.
        unsafe { alloc::dealloc(self.raw.as_ptr(), self.layout) };
        STATS.record_free(self.layout.size());
        trace_event!(size = self.layout.size(), "native free");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_alignment_over_allocates() {
        let block = NativeBlock::allocate(100, 4096, true, 16).unwrap();
        assert_eq!(block.addr() % 4096, 0);
        assert_eq!(block.allocated_size(), 100 + 4095);
    }

    #[test]
    fn backend_alignment_is_not_padded() {
        let block = NativeBlock::allocate(64, 8, true, 16).unwrap();
        assert_eq!(block.addr() % 16, 0);
        assert_eq!(block.allocated_size(), 64);
    }

    #[test]
    fn zero_fill_zeroes() {
        let block = NativeBlock::allocate(256, 64, true, 16).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(block.addr() as *const u8, 256) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_bad_alignment() {
        assert!(matches!(
            NativeBlock::allocate(8, 3, true, 16),
            Err(Error::Misaligned { align: 3 })
        ));
        assert!(matches!(
            NativeBlock::allocate(8, 0, true, 16),
            Err(Error::Misaligned { align: 0 })
        ));
    }

    #[test]
    fn overflow_is_reported() {
        assert!(matches!(
            NativeBlock::allocate(usize::MAX, 64, false, 16),
            Err(Error::Overflow { .. })
        ));
    }

    #[test]
    fn zero_sized_blocks_are_valid() {
        let block = NativeBlock::allocate(0, 1, true, 16).unwrap();
        assert_ne!(block.addr(), 0);
    }
}
