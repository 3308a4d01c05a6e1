//! Heap-backed segments over vectors owned by the segment.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use memseg_scope::ResourceScope;

use super::{Backing, MemorySegment};
use crate::carrier::Carrier;

/// A type-erased `Vec<T>` parked as raw parts.
pub(crate) struct HeapStore {
    ptr: *mut u8,
    len: usize,
    cap: usize,
    release: unsafe fn(*mut u8, usize, usize),
}

unsafe fn release_vec<T>(ptr: *mut u8, len: usize, cap: usize) {
    drop(Vec::from_raw_parts(ptr as *mut T, len, cap));
}

// SAFETY: the store owns plain carrier data; all access goes through segment
// checks and raw pointer reads/writes.
unsafe impl Send for HeapStore {}
// SAFETY: as above.
unsafe impl Sync for HeapStore {}

impl Drop for HeapStore {
    fn drop(&mut self) {
        // SAFETY: the parts came from a `Vec<T>` whose `release_vec::<T>` was
        // recorded alongside them, and they are released once.
        unsafe { (self.release)(self.ptr, self.len, self.cap) }
    }
}

impl MemorySegment {
    /// Wrap a vector. The segment lives under the global scope; the vector is
    /// freed when the last segment over it is dropped.
    pub fn of_vec<T: Carrier>(values: Vec<T>) -> Self {
        let mut values = ManuallyDrop::new(values);
        let ptr = values.as_mut_ptr() as *mut u8;
        let len = values.len();
        let store = HeapStore {
            ptr,
            len,
            cap: values.capacity(),
            release: release_vec::<T>,
        };
        Self::from_parts(
            Backing::Heap(Arc::new(store)),
            ptr as usize,
            len * T::SIZE,
            false,
            ResourceScope::global(),
        )
    }

    /// Copy `values` into a new heap segment.
    pub fn of_slice<T: Carrier>(values: &[T]) -> Self {
        Self::of_vec(values.to_vec())
    }
}
