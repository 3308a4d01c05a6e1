//! Confined scope state: one owner thread, no atomics on the access path.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::ThreadId;

use memseg_core::ScopeId;

use crate::cleanup::{Chain, CloseAction, ConfinedList};
use crate::error::{Error, Result};

thread_local! {
    static CURRENT_THREAD: ThreadId = std::thread::current().id();
}

/// Id of the calling thread, cached so the check is a plain read.
pub(crate) fn current_thread() -> ThreadId {
    CURRENT_THREAD.with(|id| *id)
}

pub(crate) struct ConfinedState {
    owner: ThreadId,
    /// Written by the owner only; readable anywhere.
    closed: AtomicBool,
    lock_count: Cell<u32>,
    /// Handles dropped on other threads, folded into `lock_count` by the owner.
    remote_releases: AtomicU32,
    cleanup: ConfinedList,
}

// SAFETY: `owner` is immutable. Every method that touches the `Cell` field or
// the cleanup list first checks that the caller is the owner thread, so they
// are only ever read or written by one thread. `Drop` has exclusive access.
unsafe impl Sync for ConfinedState {}
// SAFETY: see above; the cleanup actions it owns are `Send`.
unsafe impl Send for ConfinedState {}

impl ConfinedState {
    pub(crate) fn new() -> Self {
        Self {
            owner: current_thread(),
            closed: AtomicBool::new(false),
            lock_count: Cell::new(0),
            remote_releases: AtomicU32::new(0),
            cleanup: ConfinedList::new(),
        }
    }

    pub(crate) fn owner(&self) -> ThreadId {
        self.owner
    }

    fn check_owner(&self, scope: ScopeId) -> Result<()> {
        if current_thread() != self.owner {
            return Err(Error::WrongThread { scope });
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn check_valid_state(&self, scope: ScopeId) -> Result<()> {
        self.check_owner(scope)?;
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::AlreadyClosed { scope });
        }
        Ok(())
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Outstanding acquires after applying releases queued by other threads.
    /// Owner thread only.
    fn settle(&self) -> u32 {
        let queued = self.remote_releases.swap(0, Ordering::Acquire);
        let count = self.lock_count.get().saturating_sub(queued);
        self.lock_count.set(count);
        count
    }

    pub(crate) fn acquire(&self, scope: ScopeId) -> Result<()> {
        self.check_valid_state(scope)?;
        let count = self.settle();
        let next = count
            .checked_add(1)
            .ok_or(Error::AcquireOverflow { scope })?;
        self.lock_count.set(next);
        Ok(())
    }

    pub(crate) fn release(&self, scope: ScopeId) -> Result<()> {
        self.check_owner(scope)?;
        let count = self.settle();
        if count == 0 {
            return Err(Error::AlreadyClosed { scope });
        }
        self.lock_count.set(count - 1);
        Ok(())
    }

    /// Release from a dropped handle. Off the owner thread the release is
    /// queued for the owner to apply.
    pub(crate) fn release_or_defer(&self, scope: ScopeId) -> Result<()> {
        if current_thread() != self.owner {
            self.remote_releases.fetch_add(1, Ordering::Release);
            return Ok(());
        }
        self.release(scope)
    }

    pub(crate) fn add_close_action(&self, scope: ScopeId, action: CloseAction) -> Result<()> {
        self.check_valid_state(scope)?;
        self.cleanup.push(action);
        Ok(())
    }

    /// Flip to closed and detach the cleanup list.
    pub(crate) fn close(&self, scope: ScopeId) -> Result<Chain> {
        self.check_valid_state(scope)?;
        let count = self.settle();
        if count > 0 {
            return Err(Error::Acquired { scope, count });
        }
        self.closed.store(true, Ordering::Release);
        Ok(self.cleanup.take())
    }

    /// Reclamation path; the caller holds the last reference.
    pub(crate) fn reclaim(&mut self) -> Option<Chain> {
        if *self.closed.get_mut() {
            return None;
        }
        *self.closed.get_mut() = true;
        Some(self.cleanup.take())
    }

    pub(crate) fn has_pending_cleanup(&mut self) -> bool {
        !self.cleanup.is_empty()
    }
}
