//! Segment allocators.
//!
//! [`SegmentAllocator`] is the one seam every allocator implements; the
//! provided helpers build typed and string allocations on top of
//! `allocate`. Implementations:
//!
//! | type              | threads          | strategy                               |
//! |-------------------|------------------|----------------------------------------|
//! | `ResourceScope`   | per scope rules  | one native block per request           |
//! | `ArenaAllocator`  | one              | bump pointer, unbounded or bounded     |
//! | `SyncArena`       | many             | bump pointer behind a mutex            |
//! | `ShardedArena`    | many             | one bump arena per thread              |
//! | `PrefixAllocator` | one              | reuses the prefix of a single segment  |

mod arena;
mod bump;
mod prefix;
mod shared;

use memseg_scope::ResourceScope;

use crate::carrier::Carrier;
use crate::error::{Error, Result};
use crate::segment::MemorySegment;

pub use arena::ArenaAllocator;
pub use prefix::PrefixAllocator;
pub use shared::{ShardedArena, SyncArena};

pub trait SegmentAllocator {
    /// Allocate `size` bytes whose first byte is aligned to `align`.
    fn allocate(&self, size: usize, align: usize) -> Result<MemorySegment>;

    fn allocate_bytes(&self, size: usize) -> Result<MemorySegment> {
        self.allocate(size, 1)
    }

    fn allocate_value<T: Carrier>(&self, value: T) -> Result<MemorySegment> {
        let segment = self.allocate(T::SIZE, T::ALIGN)?;
        segment.set(0, value)?;
        Ok(segment)
    }

    fn allocate_array<T: Carrier>(&self, values: &[T]) -> Result<MemorySegment> {
        let bytes = values.len().checked_mul(T::SIZE).ok_or(Error::Overflow {
            what: "array allocation size",
        })?;
        let segment = self.allocate(bytes, T::ALIGN)?;
        segment.copy_from_slice(0, values)?;
        Ok(segment)
    }

    /// Allocate `text` as a NUL-terminated UTF-8 string.
    fn allocate_utf8(&self, text: &str) -> Result<MemorySegment> {
        let len = text.len();
        let size = len.checked_add(1).ok_or(Error::Overflow {
            what: "string allocation size",
        })?;
        let segment = self.allocate(size, 1)?;
        segment.copy_from_slice(0, text.as_bytes())?;
        segment.set::<u8>(len, 0)?;
        Ok(segment)
    }
}

impl SegmentAllocator for ResourceScope {
    fn allocate(&self, size: usize, align: usize) -> Result<MemorySegment> {
        MemorySegment::allocate_native(size, align, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_allocates_fresh_native_segments() {
        let scope = ResourceScope::new_confined();
        let a = scope.allocate_value(7i32).unwrap();
        let b = scope.allocate_array(&[1u16, 2, 3]).unwrap();
        let s = scope.allocate_utf8("memseg").unwrap();
        assert_eq!(a.get::<i32>(0).unwrap(), 7);
        assert_eq!(b.to_char_array().unwrap(), vec![1, 2, 3]);
        assert_eq!(s.byte_size(), 7);
        assert_eq!(s.get_utf8(0).unwrap(), "memseg");
        assert!(a.scope().same_scope(&scope));
        scope.close().unwrap();
        assert!(a.get::<i32>(0).is_err());
    }
}
