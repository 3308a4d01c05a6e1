use memseg_core::SegmentId;
use thiserror::Error;

/// Result type local to memseg-mem.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Scope closed, wrong thread, acquired, and the other lifecycle errors.
    #[error(transparent)]
    Scope(#[from] memseg_scope::Error),

    #[error("out of bounds access on {segment}: offset {offset}, length {length}, segment size {size}")]
    OutOfBounds {
        segment: SegmentId,
        offset: usize,
        length: usize,
        size: usize,
    },

    #[error("arithmetic overflow computing {what}")]
    Overflow { what: &'static str },

    #[error("attempted write on read-only {segment}")]
    ReadOnly { segment: SegmentId },

    #[error("out of memory: cannot allocate {requested} bytes aligned to {align}")]
    OutOfMemory { requested: usize, align: usize },

    #[error("invalid alignment {align}: must be a non-zero power of two")]
    Misaligned { align: usize },

    #[error("segment size {size} is not a multiple of element size {element}")]
    IncompatibleSize { size: usize, element: usize },

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("mapping failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification so callers can branch without matching variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The scope is closed, closing, acquired, or owned by another thread.
    State,
    Bounds,
    Allocation,
    Immutability,
    Unsupported,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Scope(_) => ErrorKind::State,
            Error::OutOfBounds { .. }
            | Error::Overflow { .. }
            | Error::Misaligned { .. }
            | Error::IncompatibleSize { .. } => ErrorKind::Bounds,
            Error::OutOfMemory { .. } => ErrorKind::Allocation,
            Error::ReadOnly { .. } => ErrorKind::Immutability,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// The underlying scope error, if this is a state error.
    pub fn as_scope_error(&self) -> Option<&memseg_scope::Error> {
        match self {
            Error::Scope(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.as_scope_error().is_some_and(memseg_scope::Error::is_closed)
    }
}
