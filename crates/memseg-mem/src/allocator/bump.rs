//! The bump-pointer core shared by every arena flavour.

use memseg_scope::ResourceScope;

use crate::error::{Error, Result};
use crate::segment::MemorySegment;
use crate::telemetry::trace_event;

pub(crate) struct Bump {
    scope: ResourceScope,
    block_size: usize,
    /// Fixed capacity; no refills once exhausted.
    bounded: bool,
    block: Option<MemorySegment>,
    used: usize,
}

impl Bump {
    pub(crate) fn unbounded(scope: &ResourceScope, block_size: usize) -> Self {
        Self {
            scope: scope.clone(),
            block_size: block_size.max(1),
            bounded: false,
            block: None,
            used: 0,
        }
    }

    /// Reserve all `capacity` bytes up front.
    pub(crate) fn bounded(scope: &ResourceScope, capacity: usize) -> Result<Self> {
        let block = MemorySegment::allocate_native(capacity, 1, scope)?;
        Ok(Self {
            scope: scope.clone(),
            block_size: capacity,
            bounded: true,
            block: Some(block),
            used: 0,
        })
    }

    pub(crate) fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    pub(crate) fn allocate(&mut self, size: usize, align: usize) -> Result<MemorySegment> {
        // Scope first: a foreign or closed scope fails before any arithmetic.
        self.scope.check_valid_state()?;
        if align == 0 || !align.is_power_of_two() {
            return Err(Error::Misaligned { align });
        }
        if let Some(segment) = self.carve(size, align)? {
            return Ok(segment);
        }
        if self.bounded {
            return Err(Error::OutOfMemory {
                requested: size,
                align,
            });
        }
        if size > self.block_size / 2 {
            // Too big to share a block; give it a dedicated one.
            return MemorySegment::allocate_native(size, align, &self.scope);
        }
        // The fresh block starts aligned to `align`, so the retry always fits.
        let block = MemorySegment::allocate_native(self.block_size, align, &self.scope)?;
        trace_event!(scope = %self.scope.id(), block_size = self.block_size, "arena refill");
        self.block = Some(block);
        self.used = 0;
        self.carve(size, align)?.ok_or(Error::OutOfMemory {
            requested: size,
            align,
        })
    }

    /// Slice `size` bytes aligned to `align` off the current block, if they fit.
    fn carve(&mut self, size: usize, align: usize) -> Result<Option<MemorySegment>> {
        let Some(block) = self.block.as_ref() else {
            return Ok(None);
        };
        let cursor = block.base() + self.used;
        let Some(aligned) = cursor.checked_add(align - 1).map(|c| c & !(align - 1)) else {
            return Ok(None);
        };
        let start = aligned - block.base();
        let fits = start
            .checked_add(size)
            .is_some_and(|end| end <= block.byte_size());
        if !fits {
            return Ok(None);
        }
        let segment = block.slice(start, size)?;
        self.used = start + size;
        Ok(Some(segment))
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }
}
