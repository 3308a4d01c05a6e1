//! RAII acquire handles.
//!
//! Holding a [`ScopeHandle`] keeps its scope from closing. Dropping the handle
//! (or calling [`ScopeHandle::release`]) gives the use back.

use std::fmt;

use crate::error::Error;
use crate::scope::ResourceScope;
use crate::telemetry::warn_event;

#[must_use = "dropping a handle releases it immediately"]
pub struct ScopeHandle {
    scope: ResourceScope,
    released: bool,
}

impl ScopeHandle {
    pub(crate) fn new(scope: ResourceScope) -> Self {
        Self {
            scope,
            released: false,
        }
    }

    /// The scope this handle keeps open.
    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    /// Release explicitly, observing failures that `Drop` can only log.
    ///
    /// A handle on a confined scope must be released by the owner thread. From
    /// any other thread this fails and the handle comes back with the error,
    /// still holding its use, so it can be sent home and released there.
    /// Dropping a handle off the owner thread queues the release instead.
    pub fn release(mut self) -> Result<(), (ScopeHandle, Error)> {
        match self.scope.release_one() {
            Ok(()) => {
                self.released = true;
                Ok(())
            }
            Err(e) => Err((self, e)),
        }
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.scope.release_on_drop() {
            warn_event!(scope = %self.scope.id(), error = %e, "scope handle release failed");
            let _ = e;
        }
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("scope", &self.scope.id())
            .field("released", &self.released)
            .finish()
    }
}
