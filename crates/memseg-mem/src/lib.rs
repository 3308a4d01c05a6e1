//! memseg-mem: memory segments over native, heap, and mapped storage.
//!
//! All reads and writes go through [`MemorySegment`], which checks bounds,
//! permissions, and the liveness of its [`ResourceScope`] before touching
//! memory. Native blocks and file mappings are released by close actions on
//! their scope; heap segments live under the global scope.
//!
//! Allocation goes through the [`SegmentAllocator`] trait, implemented by
//! scopes themselves and by the arena types in [`allocator`].

pub mod address;
pub mod allocator;
mod backend;
pub mod carrier;
pub mod error;
pub mod segment;
mod telemetry;

pub use address::MemoryAddress;
pub use allocator::{ArenaAllocator, PrefixAllocator, SegmentAllocator, ShardedArena, SyncArena};
pub use backend::{native_stats, NativeStats};
pub use carrier::Carrier;
pub use error::{Error, ErrorKind, Result};
pub use segment::{ElementSplitter, MapMode, MemorySegment};

pub use memseg_scope::{config, ResourceScope, ScopeHandle, ScopeKind};
