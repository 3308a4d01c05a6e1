//! Strongly-typed identifiers used across the workspace.
//!
//! Ids are process-local counters; they exist for diagnostics (error
//! messages, tracing fields) and never for identity of backing memory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! new_id {
    ($name:ident, $counter:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        static $counter: AtomicU64 = AtomicU64::new(1);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u64 {
                self.0
            }
            /// Allocate the next id from the process-wide counter.
            pub fn next() -> Self {
                Self($counter.fetch_add(1, Ordering::Relaxed))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

new_id!(ScopeId, NEXT_SCOPE_ID);
new_id!(SegmentId, NEXT_SEGMENT_ID);

/// Id reserved for the process-wide global scope.
pub const GLOBAL_SCOPE_ID: ScopeId = ScopeId::new(0);
