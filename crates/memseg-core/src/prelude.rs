//! Convenient re-exports for downstream crates.

pub use crate::config::MemoryConfig;
pub use crate::error::{Error, Result};
pub use crate::id::{ScopeId, SegmentId};
pub use crate::order::ByteOrder;
pub use crate::primitive::{PrimitiveClassifier, PrimitiveInfo, PrimitiveKind, StandardClassifier};
