//! Bulk operations: fill, copy, compare, and materialisation.

use std::ptr;
use std::slice;

use super::MemorySegment;
use crate::carrier::Carrier;
use crate::error::{Error, Result};

/// Bytes compared per step by `mismatch` before narrowing to a single byte.
const MISMATCH_CHUNK: usize = 64;

impl MemorySegment {
    /// Set every byte of the segment to `value`.
    pub fn fill(&self, value: u8) -> Result<()> {
        let size = self.byte_size();
        // SAFETY: the whole segment is in bounds and writable.
        self.with_access(0, size, true, |p| unsafe { ptr::write_bytes(p, value, size) })
    }

    /// Copy all of `src` to the start of `self`. Overlapping views are fine.
    pub fn copy_from(&self, src: &MemorySegment) -> Result<()> {
        let bytes = src.byte_size();
        self.check_access(0, bytes, false)?;
        src.check_access(0, bytes, true)?;
        let _dst = self.scope().enter_access()?;
        let _src = src.scope().enter_access()?;
        // SAFETY: both ranges were checked above and both scopes are held open.
        unsafe { ptr::copy(src.base() as *const u8, self.base() as *mut u8, bytes) };
        Ok(())
    }

    /// Copy all of `src`, reversing the byte order of each `elem_size`-byte
    /// element. `elem_size` must be 1, 2, 4, or 8.
    pub fn copy_from_swapped(&self, src: &MemorySegment, elem_size: usize) -> Result<()> {
        if !matches!(elem_size, 1 | 2 | 4 | 8) {
            return Err(Error::Unsupported("element size must be 1, 2, 4, or 8"));
        }
        let bytes = src.byte_size();
        if bytes % elem_size != 0 {
            return Err(Error::IncompatibleSize {
                size: bytes,
                element: elem_size,
            });
        }
        if elem_size == 1 {
            return self.copy_from(src);
        }
        self.check_access(0, bytes, false)?;
        src.check_access(0, bytes, true)?;
        let _dst = self.scope().enter_access()?;
        let _src = src.scope().enter_access()?;

        let (from, to) = (src.base(), self.base());
        let count = bytes / elem_size;
        // Walk backwards when the destination starts inside the source so
        // no element is overwritten before it is read.
        let forward = to <= from || to >= from + bytes;
        let mut element = [0u8; 8];
        for step in 0..count {
            let index = if forward { step } else { count - 1 - step };
            let offset = index * elem_size;
            // SAFETY: `offset + elem_size <= bytes` for both checked ranges.
            unsafe {
                ptr::copy_nonoverlapping((from + offset) as *const u8, element.as_mut_ptr(), elem_size);
                element[..elem_size].reverse();
                ptr::copy_nonoverlapping(element.as_ptr(), (to + offset) as *mut u8, elem_size);
            }
        }
        Ok(())
    }

    /// Index of the first differing byte, or `None` when both segments have
    /// the same length and contents. If one is a prefix of the other, the
    /// shorter length is returned.
    pub fn mismatch(&self, other: &MemorySegment) -> Result<Option<usize>> {
        let _a = self.scope().enter_access()?;
        let _b = other.scope().enter_access()?;
        let (len_a, len_b) = (self.byte_size(), other.byte_size());
        if self.base() == other.base() && len_a == len_b {
            return Ok(None);
        }
        let len = len_a.min(len_b);
        // SAFETY: `len` is within both segments and both scopes are held open.
        let (a, b) = unsafe {
            (
                slice::from_raw_parts(self.base() as *const u8, len),
                slice::from_raw_parts(other.base() as *const u8, len),
            )
        };
        if let Some(index) = first_difference(a, b) {
            return Ok(Some(index));
        }
        Ok((len_a != len_b).then_some(len))
    }

    /// Copy the contents into a new vector of `T`.
    pub fn to_vec<T: Carrier>(&self) -> Result<Vec<T>> {
        let size = self.byte_size();
        if size % T::SIZE != 0 {
            return Err(Error::IncompatibleSize {
                size,
                element: T::SIZE,
            });
        }
        let count = size / T::SIZE;
        let mut out: Vec<T> = Vec::new();
        out.try_reserve_exact(count).map_err(|_| Error::OutOfMemory {
            requested: size,
            align: T::ALIGN,
        })?;
        // SAFETY: `out` has room for `count` elements (`size` bytes), and
        // every bit pattern is a valid carrier.
        self.with_access(0, size, false, |p| unsafe {
            ptr::copy_nonoverlapping(p as *const u8, out.as_mut_ptr() as *mut u8, size);
            out.set_len(count);
        })?;
        Ok(out)
    }

    pub fn to_byte_array(&self) -> Result<Vec<u8>> {
        self.to_vec()
    }

    pub fn to_short_array(&self) -> Result<Vec<i16>> {
        self.to_vec()
    }

    pub fn to_char_array(&self) -> Result<Vec<u16>> {
        self.to_vec()
    }

    pub fn to_int_array(&self) -> Result<Vec<i32>> {
        self.to_vec()
    }

    pub fn to_long_array(&self) -> Result<Vec<i64>> {
        self.to_vec()
    }

    pub fn to_float_array(&self) -> Result<Vec<f32>> {
        self.to_vec()
    }

    pub fn to_double_array(&self) -> Result<Vec<f64>> {
        self.to_vec()
    }

    /// Read a NUL-terminated UTF-8 string starting at `offset`. Invalid
    /// sequences are replaced.
    pub fn get_utf8(&self, offset: usize) -> Result<String> {
        let remaining = self.byte_size().checked_sub(offset).ok_or(Error::OutOfBounds {
            segment: self.id(),
            offset,
            length: 0,
            size: self.byte_size(),
        })?;
        let text = self.with_access(offset, remaining, false, |p| {
            // SAFETY: `[p, p + remaining)` is in bounds and held open.
            let bytes = unsafe { slice::from_raw_parts(p as *const u8, remaining) };
            bytes
                .iter()
                .position(|&b| b == 0)
                .map(|nul| String::from_utf8_lossy(&bytes[..nul]).into_owned())
        })?;
        text.ok_or(Error::OutOfBounds {
            segment: self.id(),
            offset,
            length: remaining + 1,
            size: self.byte_size(),
        })
    }
}

fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    let mut start = 0;
    for (ca, cb) in a.chunks(MISMATCH_CHUNK).zip(b.chunks(MISMATCH_CHUNK)) {
        if ca != cb {
            return ca
                .iter()
                .zip(cb)
                .position(|(x, y)| x != y)
                .map(|i| start + i);
        }
        start += ca.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use memseg_scope::ResourceScope;

    #[test]
    fn fill_then_mismatch_on_slice() {
        let scope = ResourceScope::new_confined();
        let seg = MemorySegment::allocate_native(16, 1, &scope).unwrap();
        seg.fill(0xFF).unwrap();
        let part = seg.slice(4, 8).unwrap();
        let other = MemorySegment::allocate_native(8, 1, &scope).unwrap();
        other.fill(0xFF).unwrap();
        assert_eq!(part.mismatch(&other).unwrap(), None);
        scope.close().unwrap();
        assert!(seg.get::<u8>(0).unwrap_err().is_closed());
        assert!(part.get::<u8>(0).unwrap_err().is_closed());
    }

    #[test]
    fn mismatch_reports_index_and_prefix() {
        let a = MemorySegment::of_vec((0..200u8).collect());
        let b = MemorySegment::of_vec((0..200u8).collect());
        assert_eq!(a.mismatch(&b).unwrap(), None);
        b.set::<u8>(130, 0).unwrap();
        assert_eq!(a.mismatch(&b).unwrap(), Some(130));
        let prefix = a.slice(0, 100).unwrap();
        assert_eq!(a.mismatch(&prefix).unwrap(), Some(100));
        assert_eq!(prefix.mismatch(&a).unwrap(), Some(100));
        let empty = a.slice(0, 0).unwrap();
        assert_eq!(empty.mismatch(&a.slice(5, 0).unwrap()).unwrap(), None);
    }

    #[test]
    fn copy_from_requires_room_for_the_source() {
        let big = MemorySegment::of_vec(vec![7u8; 16]);
        let small = MemorySegment::of_vec(vec![0u8; 8]);
        assert!(matches!(small.copy_from(&big), Err(Error::OutOfBounds { .. })));
        big.copy_from(&small).unwrap();
        assert_eq!(&big.to_byte_array().unwrap()[..10], &[0, 0, 0, 0, 0, 0, 0, 0, 7, 7]);
        assert!(matches!(
            big.as_read_only().copy_from(&small),
            Err(Error::ReadOnly { .. })
        ));
    }

    #[test]
    fn copy_within_overlapping_views() {
        let seg = MemorySegment::of_vec((0..10u8).collect());
        seg.slice(2, 8).unwrap().copy_from(&seg.slice(0, 8).unwrap()).unwrap();
        assert_eq!(seg.to_byte_array().unwrap(), vec![0, 1, 0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn swapped_copy_reverses_each_element() {
        let src = MemorySegment::of_vec(vec![0x0102u16, 0x0304]);
        let dst = MemorySegment::of_vec(vec![0u16; 2]);
        dst.copy_from_swapped(&src, 2).unwrap();
        assert_eq!(dst.to_char_array().unwrap(), vec![0x0201, 0x0403]);
        assert!(matches!(
            dst.copy_from_swapped(&src, 3),
            Err(Error::Unsupported(_))
        ));
        let odd = MemorySegment::of_vec(vec![0u8; 6]);
        assert!(matches!(
            dst.copy_from_swapped(&odd, 4),
            Err(Error::IncompatibleSize { size: 6, element: 4 })
        ));
    }

    #[test]
    fn swapped_copy_handles_forward_overlap() {
        let seg = MemorySegment::of_vec(vec![0x0102u16, 0x0304, 0x0506, 0]);
        seg.slice(2, 6)
            .unwrap()
            .copy_from_swapped(&seg.slice(0, 6).unwrap(), 2)
            .unwrap();
        assert_eq!(
            seg.to_char_array().unwrap(),
            vec![0x0102, 0x0201, 0x0403, 0x0605]
        );
    }

    #[test]
    fn typed_arrays_round_trip() {
        let scope = ResourceScope::new_confined();
        let seg = MemorySegment::allocate_native(32, 8, &scope).unwrap();
        seg.copy_from_slice(0, &[1.0f64, -2.5, 3.25, 0.0]).unwrap();
        assert_eq!(seg.to_double_array().unwrap(), vec![1.0, -2.5, 3.25, 0.0]);
        assert_eq!(seg.to_float_array().unwrap().len(), 8);
        assert!(matches!(
            seg.slice(0, 6).unwrap().to_int_array(),
            Err(Error::IncompatibleSize { size: 6, element: 4 })
        ));
    }

    #[test]
    fn utf8_strings_stop_at_nul() {
        let seg = MemorySegment::of_slice(b"hi\0there\0");
        assert_eq!(seg.get_utf8(0).unwrap(), "hi");
        assert_eq!(seg.get_utf8(3).unwrap(), "there");
        assert!(seg.slice(0, 2).unwrap().get_utf8(0).is_err());
        assert!(seg.get_utf8(20).is_err());
    }
}
