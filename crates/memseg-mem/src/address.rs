//! Pointer-like addresses.
//!
//! A [`MemoryAddress`] is either an offset into a segment or a bare integer
//! with no bounds information. Holding one does not keep memory alive; the
//! segment's scope decides that.

use std::fmt;
use std::hash::{Hash, Hasher};

use memseg_scope::ResourceScope;

use crate::error::{Error, Result};
use crate::segment::MemorySegment;

#[derive(Clone)]
pub struct MemoryAddress {
    segment: Option<MemorySegment>,
    offset: usize,
}

impl MemoryAddress {
    /// The raw address zero.
    pub const NULL: MemoryAddress = MemoryAddress {
        segment: None,
        offset: 0,
    };

    pub(crate) fn in_segment(segment: MemorySegment, offset: usize) -> Self {
        Self {
            segment: Some(segment),
            offset,
        }
    }

    /// A raw native address with no segment.
    pub fn of_raw(value: usize) -> Self {
        Self {
            segment: None,
            offset: value,
        }
    }

    pub fn segment(&self) -> Option<&MemorySegment> {
        self.segment.as_ref()
    }

    /// Offset relative to the segment, or the raw value if there is none.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_null(&self) -> bool {
        self.segment.is_none() && self.offset == 0
    }

    /// Move by `delta` bytes. Leaving the segment is allowed; accessing
    /// through it later is what gets checked.
    pub fn add_offset(&self, delta: isize) -> Result<Self> {
        let offset = self.offset.checked_add_signed(delta).ok_or(Error::Overflow {
            what: "address offset",
        })?;
        Ok(Self {
            segment: self.segment.clone(),
            offset,
        })
    }

    /// Absolute position and heap identity; the basis of equality.
    fn identity(&self) -> (Option<usize>, usize) {
        match &self.segment {
            Some(seg) => (seg.heap_identity(), seg.base().wrapping_add(self.offset)),
            None => (None, self.offset),
        }
    }

    /// Offset of this address relative to the start of `segment`.
    pub fn segment_offset(&self, segment: &MemorySegment) -> Result<isize> {
        let (heap, absolute) = self.identity();
        if heap != segment.heap_identity() {
            return Err(Error::Unsupported(
                "address and segment are not backed by the same memory",
            ));
        }
        Ok(absolute.wrapping_sub(segment.base()) as isize)
    }

    /// The integer value of a native address. Heap addresses have none.
    pub fn to_raw_value(&self) -> Result<usize> {
        match self.identity() {
            (Some(_), _) => Err(Error::Unsupported(
                "heap addresses cannot be converted to a raw value",
            )),
            (None, absolute) => Ok(absolute),
        }
    }

    /// View `size` bytes at this native address as a segment under `scope`.
    ///
    /// # Safety
    ///
    /// The caller asserts that `[address, address + size)` is readable and
    /// writable for as long as `scope` stays alive.
    pub unsafe fn as_segment(&self, size: usize, scope: &ResourceScope) -> Result<MemorySegment> {
        let addr = self.to_raw_value()?;
        addr.checked_add(size).ok_or(Error::Overflow {
            what: "segment end address",
        })?;
        scope.check_valid_state()?;
        Ok(MemorySegment::from_raw(addr, size, scope))
    }

    /// Like [`as_segment`](Self::as_segment), also registering `cleanup` to
    /// run when `scope` closes.
    ///
    /// # Safety
    ///
    /// As for `as_segment`.
    pub unsafe fn as_segment_with_cleanup<F>(
        &self,
        size: usize,
        cleanup: F,
        scope: &ResourceScope,
    ) -> Result<MemorySegment>
    where
        F: FnOnce() + Send + 'static,
    {
        let segment = self.as_segment(size, scope)?;
        scope.add_close_action(cleanup)?;
        Ok(segment)
    }
}

impl PartialEq for MemoryAddress {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for MemoryAddress {}

impl Hash for MemoryAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.segment {
            Some(seg) => write!(f, "MemoryAddress({} + {:#x})", seg.id(), self.offset),
            None => write!(f, "MemoryAddress({:#x})", self.offset),
        }
    }
}
