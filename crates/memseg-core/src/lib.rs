#![forbid(unsafe_code)]
//! memseg-core: shared vocabulary for the memseg crates.
//!
//! Ids, the serializable [`MemoryConfig`](config::MemoryConfig), byte order,
//! and the primitive classification table. Nothing here touches memory; the
//! scope and segment crates build on these types.

pub mod config;
pub mod error;
pub mod id;
pub mod order;
pub mod prelude;
pub mod primitive;

pub use config::MemoryConfig;
pub use error::{Error, Result};
pub use id::{ScopeId, SegmentId};
pub use order::ByteOrder;
pub use primitive::{PrimitiveClassifier, PrimitiveInfo, PrimitiveKind, StandardClassifier};
