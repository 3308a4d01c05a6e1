//! The resource scope: liveness, ownership, and ordered teardown.
//!
//! A [`ResourceScope`] is a cheap, clonable reference to shared scope state.
//! Segments hold a clone of the scope that owns their memory and validate it
//! before every access. Four flavours exist:
//!
//! - **Confined**: one owner thread; checks are plain reads.
//! - **Shared**: any thread; lock-free acquire/close and a close handshake.
//! - **Implicit**: shared semantics, but never closed explicitly; cleanup runs
//!   when the last reference to the scope is dropped.
//! - **Global**: always alive, never closes, discards cleanup registrations.
//!
//! When the last reference to an explicit scope is dropped without `close()`,
//! its pending cleanups still run (no segment can reference the memory any
//! more) and, with leak detection enabled, a warning is emitted.

use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;

use memseg_core::id::GLOBAL_SCOPE_ID;
use memseg_core::{MemoryConfig, ScopeId};
use once_cell::sync::Lazy;

use crate::cleanup::{Chain, CloseAction};
use crate::confined::ConfinedState;
use crate::error::{Error, Result};
use crate::handle::ScopeHandle;
use crate::shared::SharedState;
use crate::telemetry::{debug_event, trace_event, warn_event};

/// Which lifecycle rules a scope follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Confined,
    Shared,
    Implicit,
    Global,
}

enum Lifecycle {
    Confined(ConfinedState),
    Shared(SharedState),
    Global,
}

struct ScopeInner {
    id: ScopeId,
    kind: ScopeKind,
    lifecycle: Lifecycle,
    warn_on_leak: bool,
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let (chain, pending) = match &mut self.lifecycle {
            Lifecycle::Confined(state) => {
                let pending = state.has_pending_cleanup();
                (state.reclaim(), pending)
            }
            Lifecycle::Shared(state) => {
                let pending = state.has_pending_cleanup();
                (state.reclaim(), pending)
            }
            Lifecycle::Global => return,
        };
        let Some(chain) = chain else {
            return;
        };
        if pending && self.warn_on_leak && self.kind != ScopeKind::Implicit {
            warn_event!(scope = %self.id, kind = ?self.kind, "scope reclaimed without close; running pending cleanup");
        }
        let ran = chain.run();
        trace_event!(scope = %self.id, cleanups = ran, "scope reclaimed");
        let _ = ran;
    }
}

static GLOBAL: Lazy<ResourceScope> = Lazy::new(|| ResourceScope {
    inner: Arc::new(ScopeInner {
        id: GLOBAL_SCOPE_ID,
        kind: ScopeKind::Global,
        lifecycle: Lifecycle::Global,
        warn_on_leak: false,
    }),
});

static CONFIG: Lazy<MemoryConfig> = Lazy::new(MemoryConfig::from_env_or_default);

/// Process-wide configuration, loaded from `MEMSEG_*` variables on first use.
pub fn config() -> &'static MemoryConfig {
    &CONFIG
}

#[derive(Clone)]
pub struct ResourceScope {
    inner: Arc<ScopeInner>,
}

impl ResourceScope {
    fn build(kind: ScopeKind, lifecycle: Lifecycle, cfg: &MemoryConfig) -> Self {
        let id = ScopeId::next();
        debug_event!(scope = %id, kind = ?kind, "scope opened");
        Self {
            inner: Arc::new(ScopeInner {
                id,
                kind,
                lifecycle,
                warn_on_leak: cfg.warn_on_leaked_scope,
            }),
        }
    }

    /// A scope owned by the calling thread.
    pub fn new_confined() -> Self {
        Self::new_confined_with(config())
    }

    pub fn new_confined_with(cfg: &MemoryConfig) -> Self {
        Self::build(
            ScopeKind::Confined,
            Lifecycle::Confined(ConfinedState::new()),
            cfg,
        )
    }

    /// A scope any thread may access, acquire, or close.
    pub fn new_shared() -> Self {
        Self::new_shared_with(config())
    }

    pub fn new_shared_with(cfg: &MemoryConfig) -> Self {
        Self::build(
            ScopeKind::Shared,
            Lifecycle::Shared(SharedState::new(cfg.handshake_spin_limit)),
            cfg,
        )
    }

    /// A shared scope released only when it becomes unreachable.
    pub fn new_implicit() -> Self {
        Self::new_implicit_with(config())
    }

    pub fn new_implicit_with(cfg: &MemoryConfig) -> Self {
        Self::build(
            ScopeKind::Implicit,
            Lifecycle::Shared(SharedState::new(cfg.handshake_spin_limit)),
            cfg,
        )
    }

    /// The process-wide scope. Always alive, never closes.
    pub fn global() -> ResourceScope {
        GLOBAL.clone()
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn kind(&self) -> ScopeKind {
        self.inner.kind
    }

    pub fn is_implicit(&self) -> bool {
        self.inner.kind == ScopeKind::Implicit
    }

    pub fn is_global(&self) -> bool {
        self.inner.kind == ScopeKind::Global
    }

    /// The owning thread of a confined scope; `None` for everything else.
    pub fn owner_thread(&self) -> Option<ThreadId> {
        match &self.inner.lifecycle {
            Lifecycle::Confined(state) => Some(state.owner()),
            _ => None,
        }
    }

    /// Whether the scope is still open. This is the same answer on every
    /// thread; whether a confined scope is usable from the calling thread is
    /// [`check_valid_state`](Self::check_valid_state)'s question.
    pub fn is_alive(&self) -> bool {
        match &self.inner.lifecycle {
            Lifecycle::Confined(state) => state.is_alive(),
            Lifecycle::Shared(state) => state.is_alive(),
            Lifecycle::Global => true,
        }
    }

    /// Whether `other` refers to the same scope.
    pub fn same_scope(&self, other: &ResourceScope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Fail unless the scope is alive and usable from the calling thread.
    #[inline]
    pub fn check_valid_state(&self) -> Result<()> {
        match &self.inner.lifecycle {
            Lifecycle::Confined(state) => state.check_valid_state(self.inner.id),
            Lifecycle::Shared(state) => state.check_valid_state(self.inner.id),
            Lifecycle::Global => Ok(()),
        }
    }

    /// Open an access window. While the returned guard lives, a concurrent
    /// close of a shared scope waits instead of freeing the memory.
    #[inline]
    pub fn enter_access(&self) -> Result<AccessGuard<'_>> {
        match &self.inner.lifecycle {
            Lifecycle::Confined(state) => {
                state.check_valid_state(self.inner.id)?;
                Ok(AccessGuard { shared: None })
            }
            Lifecycle::Shared(state) => {
                state.enter(self.inner.id)?;
                Ok(AccessGuard {
                    shared: Some(state),
                })
            }
            Lifecycle::Global => Ok(AccessGuard { shared: None }),
        }
    }

    /// Register one outstanding use; the scope cannot close until the
    /// returned handle is released.
    pub fn acquire(&self) -> Result<ScopeHandle> {
        match &self.inner.lifecycle {
            Lifecycle::Confined(state) => state.acquire(self.inner.id)?,
            Lifecycle::Shared(state) => state.acquire(self.inner.id)?,
            Lifecycle::Global => {}
        }
        Ok(ScopeHandle::new(self.clone()))
    }

    pub(crate) fn release_one(&self) -> Result<()> {
        match &self.inner.lifecycle {
            Lifecycle::Confined(state) => state.release(self.inner.id),
            Lifecycle::Shared(state) => state.release(self.inner.id),
            Lifecycle::Global => Ok(()),
        }
    }

    /// Release for a dropped handle, which may be on any thread.
    pub(crate) fn release_on_drop(&self) -> Result<()> {
        match &self.inner.lifecycle {
            Lifecycle::Confined(state) => state.release_or_defer(self.inner.id),
            Lifecycle::Shared(state) => state.release(self.inner.id),
            Lifecycle::Global => Ok(()),
        }
    }

    /// Run `action` when the scope closes (or is reclaimed), after every
    /// action registered later than it.
    pub fn add_close_action<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_boxed_close_action(Box::new(action))
    }

    pub fn add_boxed_close_action(&self, action: CloseAction) -> Result<()> {
        match &self.inner.lifecycle {
            Lifecycle::Confined(state) => state.add_close_action(self.inner.id, action),
            Lifecycle::Shared(state) => state.add_close_action(self.inner.id, action),
            Lifecycle::Global => {
                // The global scope outlives the process; its actions never run.
                std::mem::forget(action);
                Ok(())
            }
        }
    }

    /// Close the scope and run its cleanup actions in reverse registration
    /// order. A failed close leaves the scope alive.
    pub fn close(&self) -> Result<()> {
        let id = self.inner.id;
        let detached: Result<Chain> = match (&self.inner.lifecycle, self.inner.kind) {
            (_, ScopeKind::Global) | (_, ScopeKind::Implicit) => {
                Err(Error::NotCloseable { scope: id })
            }
            (Lifecycle::Confined(state), _) => state.close(id),
            (Lifecycle::Shared(state), _) => state.close(id),
            (Lifecycle::Global, _) => Err(Error::NotCloseable { scope: id }),
        };
        match detached {
            Ok(chain) => {
                let ran = chain.run();
                debug_event!(scope = %id, cleanups = ran, "scope closed");
                let _ = ran;
                Ok(())
            }
            Err(e) => {
                if matches!(e, Error::ConcurrentAccess { .. }) {
                    warn_event!(scope = %id, "close handshake failed; scope rolled back to alive");
                } else {
                    debug_event!(scope = %id, error = %e, "close rejected");
                }
                Err(e)
            }
        }
    }

    /// Keep `target` open at least until this scope closes.
    pub fn keep_alive(&self, target: &ResourceScope) -> Result<()> {
        if self.same_scope(target) {
            return Err(Error::SelfKeepAlive { scope: self.id() });
        }
        let handle = target.acquire()?;
        // On failure the closure, and with it the handle, is dropped, which
        // releases the target again.
        self.add_close_action(move || drop(handle))
    }
}

impl PartialEq for ResourceScope {
    fn eq(&self, other: &Self) -> bool {
        self.same_scope(other)
    }
}

impl Eq for ResourceScope {}

impl fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceScope")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.id)
    }
}

/// An open access window on a scope. See [`ResourceScope::enter_access`].
#[must_use]
pub struct AccessGuard<'a> {
    shared: Option<&'a SharedState>,
}

impl Drop for AccessGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        if let Some(state) = self.shared {
            state.exit();
        }
    }
}
