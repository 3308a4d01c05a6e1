//! memseg-layout: describe structured memory and access it through paths.
//!
//! A [`MemoryLayout`] gives sizes, alignments, and names. A list of
//! [`PathElement`]s walks into it; the result can be turned into a byte
//! offset, a [`ValueHandle`] for typed reads and writes, or a
//! [`SliceHandle`] that cuts a sub-segment.
//!
//! ```
//! use memseg_layout::{MemoryLayout, PathElement};
//!
//! let point = MemoryLayout::structure(vec![
//!     MemoryLayout::of::<i32>().with_name("x"),
//!     MemoryLayout::of::<i32>().with_name("y"),
//! ]);
//! assert_eq!(point.byte_offset(&[PathElement::group("y")]).unwrap(), 4);
//! ```

pub mod error;
mod handle;
mod layout;
mod path;

pub use error::{Error, Result};
pub use handle::{SliceHandle, ValueHandle};
pub use layout::{LayoutKind, MemoryLayout};
pub use path::{LayoutPath, PathElement};
