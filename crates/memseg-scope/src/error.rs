use memseg_core::ScopeId;
use thiserror::Error;

/// Result type local to memseg-scope.
pub type Result<T> = std::result::Result<T, Error>;

/// Scope state errors. All of them are recoverable: a failed operation leaves
/// the scope exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{scope} already closed")]
    AlreadyClosed { scope: ScopeId },

    #[error("attempted access outside owning thread of {scope}")]
    WrongThread { scope: ScopeId },

    #[error("{scope} is acquired by {count} locks")]
    Acquired { scope: ScopeId, count: u32 },

    #[error("{scope} cannot be acquired: outstanding handle count saturated")]
    AcquireOverflow { scope: ScopeId },

    #[error("{scope} is not closeable")]
    NotCloseable { scope: ScopeId },

    #[error("cannot close {scope} while another thread is accessing its memory")]
    ConcurrentAccess { scope: ScopeId },

    #[error("{scope} cannot keep itself alive")]
    SelfKeepAlive { scope: ScopeId },
}

impl Error {
    /// The scope the error was reported against.
    pub fn scope(&self) -> ScopeId {
        match self {
            Error::AlreadyClosed { scope }
            | Error::WrongThread { scope }
            | Error::Acquired { scope, .. }
            | Error::AcquireOverflow { scope }
            | Error::NotCloseable { scope }
            | Error::ConcurrentAccess { scope }
            | Error::SelfKeepAlive { scope } => *scope,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Error::AlreadyClosed { .. })
    }
}
