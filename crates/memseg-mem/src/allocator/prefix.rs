use super::SegmentAllocator;
use crate::error::{Error, Result};
use crate::segment::MemorySegment;

/// Hands out the (aligned) prefix of one segment on every call.
///
/// Each allocation overwrites the previous one; useful for scratch buffers
/// that are consumed before the next request.
#[derive(Debug, Clone)]
pub struct PrefixAllocator {
    segment: MemorySegment,
}

impl PrefixAllocator {
    pub fn new(segment: MemorySegment) -> Self {
        Self { segment }
    }

    pub fn segment(&self) -> &MemorySegment {
        &self.segment
    }
}

impl SegmentAllocator for PrefixAllocator {
    fn allocate(&self, size: usize, align: usize) -> Result<MemorySegment> {
        self.segment.scope().check_valid_state()?;
        if align == 0 || !align.is_power_of_two() {
            return Err(Error::Misaligned { align });
        }
        let base = self.segment.base();
        let aligned = base.checked_add(align - 1).ok_or(Error::Overflow {
            what: "aligned prefix start",
        })? & !(align - 1);
        self.segment.slice(aligned - base, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memseg_scope::ResourceScope;

    #[test]
    fn prefix_is_reused() {
        let scope = ResourceScope::new_confined();
        let backing = MemorySegment::allocate_native(64, 16, &scope).unwrap();
        let prefix = PrefixAllocator::new(backing.clone());
        let a = prefix.allocate_value(1u32).unwrap();
        let b = prefix.allocate_value(2u32).unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(a.get::<u32>(0).unwrap(), 2);
        assert!(matches!(
            prefix.allocate(65, 1),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn alignment_skips_leading_bytes() {
        let scope = ResourceScope::new_confined();
        let backing = MemorySegment::allocate_native(64, 16, &scope).unwrap();
        let prefix = PrefixAllocator::new(backing.slice(1, 63).unwrap());
        let seg = prefix.allocate(8, 8).unwrap();
        assert_eq!(seg.base() % 8, 0);
        assert_eq!(prefix.segment().segment_offset(&seg).unwrap(), 7);
    }
}
