//! Shared scope state: lock-free lifecycle for scopes used by many threads.
//!
//! A single `AtomicI32` encodes liveness and the outstanding acquire count:
//!
//! ```text
//!   n >= 0   alive, n handles acquired
//!   -1       closing (handshake in progress)
//!   -2       closed
//! ```
//!
//! Memory accesses bracket themselves with an in-flight counter. A closer
//! first moves the state to CLOSING and then waits for the in-flight counter
//! to drain; both sides use sequentially consistent operations, so either the
//! accessor observes CLOSING and backs out, or the closer observes the access
//! and waits for it. If the wait does not finish within the configured spin
//! limit the state is rolled back to alive and the close fails.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use crossbeam_utils::Backoff;
use memseg_core::ScopeId;

use crate::cleanup::{Chain, CloseAction, SharedList};
use crate::error::{Error, Result};

const ALIVE: i32 = 0;
const CLOSING: i32 = -1;
const CLOSED: i32 = -2;
const MAX_FORKS: i32 = i32::MAX;

pub(crate) struct SharedState {
    state: AtomicI32,
    in_flight: AtomicUsize,
    cleanup: SharedList,
    spin_limit: u32,
}

impl SharedState {
    pub(crate) fn new(spin_limit: u32) -> Self {
        Self {
            state: AtomicI32::new(ALIVE),
            in_flight: AtomicUsize::new(0),
            cleanup: SharedList::new(),
            spin_limit: spin_limit.max(1),
        }
    }

    #[inline]
    pub(crate) fn check_valid_state(&self, scope: ScopeId) -> Result<()> {
        if self.state.load(Ordering::Acquire) < ALIVE {
            return Err(Error::AlreadyClosed { scope });
        }
        Ok(())
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.state.load(Ordering::Acquire) >= ALIVE
    }

    pub(crate) fn acquire(&self, scope: ScopeId) -> Result<()> {
        let mut value = self.state.load(Ordering::Acquire);
        loop {
            if value < ALIVE {
                return Err(Error::AlreadyClosed { scope });
            }
            if value == MAX_FORKS {
                return Err(Error::AcquireOverflow { scope });
            }
            match self.state.compare_exchange_weak(
                value,
                value + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => value = observed,
            }
        }
    }

    pub(crate) fn release(&self, scope: ScopeId) -> Result<()> {
        let mut value = self.state.load(Ordering::Acquire);
        loop {
            if value <= ALIVE {
                // Either closed, or a release without a matching acquire.
                return Err(Error::AlreadyClosed { scope });
            }
            match self.state.compare_exchange_weak(
                value,
                value - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => value = observed,
            }
        }
    }

    pub(crate) fn add_close_action(&self, scope: ScopeId, action: CloseAction) -> Result<()> {
        self.check_valid_state(scope)?;
        self.cleanup
            .push(action)
            .map_err(|_rejected| Error::AlreadyClosed { scope })
    }

    /// Enter an access window. Fails once closing has begun.
    #[inline]
    pub(crate) fn enter(&self, scope: ScopeId) -> Result<()> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.state.load(Ordering::SeqCst) < ALIVE {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::AlreadyClosed { scope });
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Wait for in-flight accesses started under the alive state to finish.
    fn handshake(&self) -> bool {
        let backoff = Backoff::new();
        for _ in 0..self.spin_limit {
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return true;
            }
            backoff.snooze();
        }
        self.in_flight.load(Ordering::SeqCst) == 0
    }

    pub(crate) fn close(&self, scope: ScopeId) -> Result<Chain> {
        match self
            .state
            .compare_exchange(ALIVE, CLOSING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Err(observed) if observed < ALIVE => Err(Error::AlreadyClosed { scope }),
            Err(observed) => Err(Error::Acquired {
                scope,
                count: observed as u32,
            }),
            Ok(_) => {
                if !self.handshake() {
                    self.state.store(ALIVE, Ordering::SeqCst);
                    return Err(Error::ConcurrentAccess { scope });
                }
                self.state.store(CLOSED, Ordering::SeqCst);
                // The state check in `add_close_action` can race with us;
                // pushes that lose see the sentinel and fail. Only one closer
                // wins ALIVE -> CLOSING, so the list is still open here.
                Ok(self.cleanup.close().unwrap_or_else(Chain::empty))
            }
        }
    }

    /// Reclamation path; the caller holds the last reference.
    pub(crate) fn reclaim(&mut self) -> Option<Chain> {
        if *self.state.get_mut() == CLOSED {
            return None;
        }
        *self.state.get_mut() = CLOSED;
        self.cleanup.close()
    }

    #[cfg(test)]
    pub(crate) fn acquired_count(&self) -> u32 {
        self.state.load(Ordering::Acquire).max(0) as u32
    }

    pub(crate) fn has_pending_cleanup(&mut self) -> bool {
        !self.cleanup.is_closed() && !self.cleanup.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> ScopeId {
        ScopeId::new(99)
    }

    #[test]
    fn acquire_blocks_close_until_released() {
        let s = SharedState::new(16);
        s.acquire(sid()).unwrap();
        s.acquire(sid()).unwrap();
        assert_eq!(s.acquired_count(), 2);
        assert_eq!(
            s.close(sid()).err(),
            Some(Error::Acquired {
                scope: sid(),
                count: 2
            })
        );
        s.release(sid()).unwrap();
        s.release(sid()).unwrap();
        assert!(s.close(sid()).is_ok());
        assert!(!s.is_alive());
    }

    #[test]
    fn closed_state_rejects_everything() {
        let s = SharedState::new(16);
        drop(s.close(sid()).unwrap());
        assert!(s.check_valid_state(sid()).unwrap_err().is_closed());
        assert!(s.acquire(sid()).unwrap_err().is_closed());
        assert!(s.enter(sid()).unwrap_err().is_closed());
        assert!(s.close(sid()).unwrap_err().is_closed());
        assert!(s.add_close_action(sid(), Box::new(|| {})).is_err());
    }

    #[test]
    fn in_flight_access_rolls_close_back() {
        let s = SharedState::new(8);
        s.enter(sid()).unwrap();
        assert_eq!(
            s.close(sid()).err(),
            Some(Error::ConcurrentAccess { scope: sid() })
        );
        // Rolled back: still alive and usable.
        assert!(s.is_alive());
        s.exit();
        assert!(s.close(sid()).is_ok());
    }

    #[test]
    fn acquire_overflow_is_reported_not_wrapped() {
        let s = SharedState::new(8);
        s.state.store(MAX_FORKS - 1, Ordering::Release);
        s.acquire(sid()).unwrap();
        assert_eq!(
            s.acquire(sid()).err(),
            Some(Error::AcquireOverflow { scope: sid() })
        );
        assert_eq!(s.acquired_count(), MAX_FORKS as u32);
        assert!(s.is_alive());
        s.release(sid()).unwrap();
        s.acquire(sid()).unwrap();
    }

    #[test]
    fn release_without_acquire_is_reported() {
        let s = SharedState::new(8);
        assert!(s.release(sid()).is_err());
        assert!(s.is_alive());
    }
}
