//! Memory segments: bounded, scope-checked views over a byte range.
//!
//! A [`MemorySegment`] is a cheap value (base address, size, mode bits, and a
//! clone of its scope). Slices share the backing store and scope of their
//! parent; nothing is copied. Every access validates bounds first and then
//! the scope, so a failed check never touches memory.
//!
//! Three backing kinds share the contract:
//!
//! - native blocks from the allocation backend, freed when the scope closes,
//! - heap vectors, kept alive by reference counting under the global scope,
//! - file mappings, unmapped when the scope closes.

mod bulk;
mod heap;
mod mapped;
mod native;
mod split;

use std::fmt;
use std::ptr;
use std::sync::Arc;

use memseg_core::{ByteOrder, SegmentId};
use memseg_scope::ResourceScope;

use crate::address::MemoryAddress;
use crate::carrier::Carrier;
use crate::error::{Error, Result};

use heap::HeapStore;
pub use mapped::MapMode;
use mapped::MappedStore;
pub use split::ElementSplitter;

const READ_ONLY: u8 = 1;
/// Size fits in 32 bits; bounds checks can use the narrow path.
const SMALL: u8 = 1 << 1;

#[derive(Clone)]
pub(crate) enum Backing {
    Native,
    Heap(Arc<HeapStore>),
    Mapped(Arc<MappedStore>),
}

#[derive(Clone)]
pub struct MemorySegment {
    backing: Backing,
    base: usize,
    size: usize,
    mode: u8,
    scope: ResourceScope,
    id: SegmentId,
}

impl MemorySegment {
    pub(crate) fn from_parts(
        backing: Backing,
        base: usize,
        size: usize,
        read_only: bool,
        scope: ResourceScope,
    ) -> Self {
        Self {
            backing,
            base,
            size,
            mode: mode_bits(size, read_only),
            scope,
            id: SegmentId::next(),
        }
    }

    /// A view over `[offset, offset + size)` of `self`. Bounds must already
    /// have been checked.
    pub(crate) fn view(&self, offset: usize, size: usize) -> Self {
        Self {
            backing: self.backing.clone(),
            base: self.base + offset,
            size,
            mode: mode_bits(size, self.is_read_only()),
            scope: self.scope.clone(),
            id: self.id,
        }
    }

    pub fn byte_size(&self) -> usize {
        self.size
    }

    /// Id of the allocation, mapping, or wrapped vector; shared by slices.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    pub fn is_alive(&self) -> bool {
        self.scope.is_alive()
    }

    pub fn is_read_only(&self) -> bool {
        self.mode & READ_ONLY != 0
    }

    /// Native and mapped segments live outside the Rust heap.
    pub fn is_native(&self) -> bool {
        !matches!(self.backing, Backing::Heap(_))
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    pub fn is_heap(&self) -> bool {
        matches!(self.backing, Backing::Heap(_))
    }

    /// The address of the first byte of this segment.
    pub fn address(&self) -> MemoryAddress {
        MemoryAddress::in_segment(self.clone(), 0)
    }

    pub(crate) fn base(&self) -> usize {
        self.base
    }

    /// Whether the byte at `offset` sits on an `align`-byte boundary.
    pub fn is_aligned_at(&self, offset: usize, align: usize) -> bool {
        align != 0 && self.base.wrapping_add(offset) % align == 0
    }

    /// Identity of the heap object behind the segment, `None` off-heap.
    pub(crate) fn heap_identity(&self) -> Option<usize> {
        match &self.backing {
            Backing::Heap(store) => Some(Arc::as_ptr(store) as usize),
            _ => None,
        }
    }

    pub(crate) fn mapped_store(&self) -> Option<&MappedStore> {
        match &self.backing {
            Backing::Mapped(store) => Some(store),
            _ => None,
        }
    }

    /// A view over `[offset, offset + new_size)`.
    pub fn slice(&self, offset: usize, new_size: usize) -> Result<Self> {
        self.check_bounds(offset, new_size)?;
        Ok(self.view(offset, new_size))
    }

    /// A view from `offset` to the end of the segment.
    pub fn slice_from(&self, offset: usize) -> Result<Self> {
        let remaining = self
            .size
            .checked_sub(offset)
            .ok_or_else(|| self.out_of_bounds(offset, 0))?;
        self.slice(offset, remaining)
    }

    pub fn as_read_only(&self) -> Self {
        let mut view = self.clone();
        view.mode |= READ_ONLY;
        view
    }

    /// Validate an access of `length` bytes at `offset`. `read_only` is true
    /// for reads; writes are refused on read-only segments.
    #[inline]
    pub fn check_access(&self, offset: usize, length: usize, read_only: bool) -> Result<()> {
        if !read_only && self.is_read_only() {
            return Err(Error::ReadOnly { segment: self.id });
        }
        self.check_bounds(offset, length)
    }

    #[inline]
    fn check_bounds(&self, offset: usize, length: usize) -> Result<()> {
        let in_bounds = if self.mode & SMALL != 0 {
            // Both operands are rejected above 32 bits, so the sum cannot wrap.
            offset <= u32::MAX as usize
                && length <= u32::MAX as usize
                && (offset as u64 + length as u64) <= self.size as u64
        } else {
            offset <= self.size && length <= self.size - offset
        };
        if in_bounds {
            Ok(())
        } else {
            Err(self.out_of_bounds(offset, length))
        }
    }

    fn out_of_bounds(&self, offset: usize, length: usize) -> Error {
        Error::OutOfBounds {
            segment: self.id,
            offset,
            length,
            size: self.size,
        }
    }

    /// Run `f` on the address of `offset` inside an access window.
    #[inline]
    pub(crate) fn with_access<R>(
        &self,
        offset: usize,
        length: usize,
        write: bool,
        f: impl FnOnce(*mut u8) -> R,
    ) -> Result<R> {
        self.check_access(offset, length, !write)?;
        let _guard = self.scope.enter_access()?;
        Ok(f((self.base + offset) as *mut u8))
    }

    /// Read a value in native byte order. Unaligned offsets are allowed.
    pub fn get<T: Carrier>(&self, offset: usize) -> Result<T> {
        // SAFETY: the window is in bounds and the scope is alive; carriers
        // are valid for every bit pattern.
        self.with_access(offset, T::SIZE, false, |p| unsafe {
            ptr::read_unaligned(p as *const T)
        })
    }

    /// Write a value in native byte order. Unaligned offsets are allowed.
    pub fn set<T: Carrier>(&self, offset: usize, value: T) -> Result<()> {
        // SAFETY: the window is in bounds, writable, and the scope is alive.
        self.with_access(offset, T::SIZE, true, |p| unsafe {
            ptr::write_unaligned(p as *mut T, value)
        })
    }

    pub fn get_ordered<T: Carrier>(&self, offset: usize, order: ByteOrder) -> Result<T> {
        let value = self.get::<T>(offset)?;
        Ok(if order.is_native() {
            value
        } else {
            value.swap_bytes()
        })
    }

    pub fn set_ordered<T: Carrier>(&self, offset: usize, value: T, order: ByteOrder) -> Result<()> {
        let value = if order.is_native() {
            value
        } else {
            value.swap_bytes()
        };
        self.set(offset, value)
    }

    /// Copy `src` into the segment starting at `offset`.
    pub fn copy_from_slice<T: Carrier>(&self, offset: usize, src: &[T]) -> Result<()> {
        let bytes = slice_bytes::<T>(src.len())?;
        // SAFETY: the destination window holds `bytes` writable bytes and
        // cannot overlap a Rust slice borrowed from elsewhere.
        self.with_access(offset, bytes, true, |p| unsafe {
            ptr::copy_nonoverlapping(src.as_ptr() as *const u8, p, bytes)
        })
    }

    /// Fill `dst` from the segment starting at `offset`.
    pub fn copy_to_slice<T: Carrier>(&self, offset: usize, dst: &mut [T]) -> Result<()> {
        let bytes = slice_bytes::<T>(dst.len())?;
        // SAFETY: as above; every bit pattern is a valid carrier.
        self.with_access(offset, bytes, false, |p| unsafe {
            ptr::copy_nonoverlapping(p as *const u8, dst.as_mut_ptr() as *mut u8, bytes)
        })
    }

    /// The part of `self` that overlaps `other`, if both view the same
    /// backing memory and their ranges intersect.
    pub fn as_overlapping(&self, other: &MemorySegment) -> Option<MemorySegment> {
        if self.is_native() != other.is_native() || self.heap_identity() != other.heap_identity() {
            return None;
        }
        let start = self.base.max(other.base);
        let end = (self.base + self.size).min(other.base + other.size);
        (start < end).then(|| self.view(start - self.base, end - start))
    }

    /// Byte distance from the start of `self` to the start of `other`.
    pub fn segment_offset(&self, other: &MemorySegment) -> Result<isize> {
        if self.is_native() != other.is_native() || self.heap_identity() != other.heap_identity() {
            return Err(Error::Unsupported(
                "segments are not backed by the same memory",
            ));
        }
        Ok(other.base.wrapping_sub(self.base) as isize)
    }
}

fn mode_bits(size: usize, read_only: bool) -> u8 {
    let mut mode = 0;
    if size <= u32::MAX as usize {
        mode |= SMALL;
    }
    if read_only {
        mode |= READ_ONLY;
    }
    mode
}

fn slice_bytes<T: Carrier>(len: usize) -> Result<usize> {
    len.checked_mul(T::SIZE).ok_or(Error::Overflow {
        what: "slice byte length",
    })
}

impl fmt::Debug for MemorySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.backing {
            Backing::Native => "native",
            Backing::Heap(_) => "heap",
            Backing::Mapped(_) => "mapped",
        };
        f.debug_struct("MemorySegment")
            .field("id", &self.id)
            .field("kind", &kind)
            .field("size", &self.size)
            .field("read_only", &self.is_read_only())
            .field("scope", &self.scope.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native(size: usize) -> (ResourceScope, MemorySegment) {
        let scope = ResourceScope::new_confined();
        let seg = MemorySegment::allocate_native(size, 8, &scope).unwrap();
        (scope, seg)
    }

    #[test]
    fn slice_shares_memory() {
        let (_scope, seg) = native(16);
        let part = seg.slice(4, 8).unwrap();
        part.set::<u32>(0, 0xAABB_CCDD).unwrap();
        assert_eq!(seg.get::<u32>(4).unwrap(), 0xAABB_CCDD);
        assert_eq!(part.id(), seg.id());
        assert_eq!(part.byte_size(), 8);
    }

    #[test]
    fn empty_slice_at_end_is_legal() {
        let (_scope, seg) = native(16);
        assert_eq!(seg.slice(16, 0).unwrap().byte_size(), 0);
        assert_eq!(seg.slice_from(16).unwrap().byte_size(), 0);
        assert!(seg.slice_from(17).is_err());
    }

    #[test]
    fn huge_offset_is_a_bounds_error() {
        let (_scope, seg) = native(16);
        let err = seg.slice(usize::MAX, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfBounds {
                offset: usize::MAX,
                length: 1,
                size: 16,
                ..
            }
        ));
        assert!(seg.slice(1, usize::MAX).is_err());
        assert!(seg.slice(8, 9).is_err());
    }

    #[test]
    fn read_only_views_reject_writes() {
        let (_scope, seg) = native(8);
        seg.set::<u8>(0, 7).unwrap();
        let ro = seg.as_read_only();
        assert!(matches!(ro.set::<u8>(0, 1), Err(Error::ReadOnly { .. })));
        assert_eq!(ro.get::<u8>(0).unwrap(), 7);
        assert!(ro.slice(0, 4).unwrap().is_read_only());
        assert!(!seg.is_read_only());
    }

    #[test]
    fn check_access_prefers_permission_error() {
        let (_scope, seg) = native(8);
        let ro = seg.as_read_only();
        assert!(matches!(
            ro.check_access(100, 1, false),
            Err(Error::ReadOnly { .. })
        ));
        assert!(matches!(
            ro.check_access(100, 1, true),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn ordered_access_swaps() {
        let (_scope, seg) = native(8);
        seg.set_ordered::<u32>(0, 0x0102_0304, ByteOrder::BigEndian)
            .unwrap();
        assert_eq!(seg.get::<u8>(0).unwrap(), 0x01);
        assert_eq!(seg.get::<u8>(3).unwrap(), 0x04);
        assert_eq!(
            seg.get_ordered::<u32>(0, ByteOrder::BigEndian).unwrap(),
            0x0102_0304
        );
    }

    #[test]
    fn unaligned_access_is_permitted() {
        let (_scope, seg) = native(16);
        seg.set::<u64>(3, u64::MAX - 1).unwrap();
        assert_eq!(seg.get::<u64>(3).unwrap(), u64::MAX - 1);
        assert!(seg.get::<u64>(9).is_err());
    }

    #[test]
    fn slice_transfer() {
        let (_scope, seg) = native(32);
        seg.copy_from_slice(8, &[1i32, -2, 3]).unwrap();
        let mut out = [0i32; 3];
        seg.copy_to_slice(8, &mut out).unwrap();
        assert_eq!(out, [1, -2, 3]);
        assert!(seg.copy_from_slice(24, &[0i64; 2]).is_err());
    }

    #[test]
    fn overlapping_views() {
        let (_scope, seg) = native(32);
        let a = seg.slice(0, 16).unwrap();
        let b = seg.slice(8, 16).unwrap();
        let overlap = a.as_overlapping(&b).unwrap();
        assert_eq!(overlap.byte_size(), 8);
        assert_eq!(a.segment_offset(&overlap).unwrap(), 8);
        assert_eq!(b.segment_offset(&a).unwrap(), -8);
        let c = seg.slice(16, 16).unwrap();
        assert!(a.as_overlapping(&c).is_none());

        let heap = MemorySegment::of_vec(vec![0u8; 16]);
        assert!(heap.as_overlapping(&a).is_none());
        assert!(heap.segment_offset(&a).is_err());
    }

    #[test]
    fn closed_scope_blocks_access() {
        let (scope, seg) = native(8);
        let part = seg.slice(0, 4).unwrap();
        scope.close().unwrap();
        assert!(seg.get::<u8>(0).unwrap_err().is_closed());
        assert!(part.set::<u8>(0, 1).unwrap_err().is_closed());
        assert!(!seg.is_alive());
    }
}
