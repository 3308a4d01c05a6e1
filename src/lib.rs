//! memseg: scoped, bounds-checked access to native, heap, and mapped memory.
//!
//! The member crates do the work:
//!
//! - [`core`]: ids, [`MemoryConfig`](core::MemoryConfig), byte order, and
//!   primitive classification,
//! - [`scope`]: [`ResourceScope`] lifecycles and cleanup,
//! - [`mem`]: [`MemorySegment`], [`MemoryAddress`], and allocators,
//! - [`layout`]: [`MemoryLayout`] paths and typed handles.
//!
//! Most programs only need the [`prelude`].
//!
//! ```
//! use memseg::prelude::*;
//!
//! let scope = ResourceScope::new_confined();
//! let seg = MemorySegment::allocate_native(16, 8, &scope).unwrap();
//! seg.fill(0xFF).unwrap();
//! let ones = scope.allocate_bytes(8).unwrap();
//! ones.fill(0xFF).unwrap();
//! assert_eq!(seg.slice(4, 8).unwrap().mismatch(&ones).unwrap(), None);
//! scope.close().unwrap();
//! assert!(seg.get::<u8>(0).unwrap_err().is_closed());
//! ```

pub use memseg_core as core;
pub use memseg_layout as layout;
pub use memseg_mem as mem;
pub use memseg_scope as scope;

pub use memseg_core::{ByteOrder, MemoryConfig};
pub use memseg_layout::{MemoryLayout, PathElement, SliceHandle, ValueHandle};
pub use memseg_mem::{
    ArenaAllocator, MapMode, MemoryAddress, MemorySegment, SegmentAllocator, ShardedArena,
    SyncArena,
};
pub use memseg_scope::{ResourceScope, ScopeHandle, ScopeKind};

pub mod prelude {
    pub use memseg_core::{ByteOrder, PrimitiveClassifier, PrimitiveKind, StandardClassifier};
    pub use memseg_layout::{MemoryLayout, PathElement};
    pub use memseg_mem::{
        ArenaAllocator, Carrier, MapMode, MemoryAddress, MemorySegment, SegmentAllocator,
    };
    pub use memseg_scope::{ResourceScope, ScopeHandle};
}
