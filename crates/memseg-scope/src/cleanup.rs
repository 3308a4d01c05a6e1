//! Singly-linked cleanup lists.
//!
//! Both lists push at the head, so walking from the head runs actions in
//! reverse registration order. The confined list is a plain pointer only the
//! owner thread touches. The shared list is a lock-free stack whose head is
//! swapped to a sentinel by the closer; a push that observes the sentinel
//! fails and hands its action back instead of dropping it on the floor.

use std::cell::Cell;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

/// A deferred release of some resource (free, unmap, release a handle).
pub type CloseAction = Box<dyn FnOnce() + Send + 'static>;

struct Node {
    action: CloseAction,
    next: *mut Node,
}

fn closed_sentinel() -> *mut Node {
    NonNull::<Node>::dangling().as_ptr()
}

/// An owned chain of nodes detached from a list.
///
/// Running pops nodes one at a time. If an action unwinds, the remaining
/// actions are dropped without being run.
pub(crate) struct Chain(*mut Node);

impl Chain {
    pub(crate) fn empty() -> Self {
        Chain(ptr::null_mut())
    }

    fn pop(&mut self) -> Option<Box<Node>> {
        if self.0.is_null() || self.0 == closed_sentinel() {
            return None;
        }
        // SAFETY: every non-null, non-sentinel pointer in a chain came from
        // `Box::into_raw` in a push and is owned exclusively by this chain.
        let mut node = unsafe { Box::from_raw(self.0) };
        self.0 = node.next;
        node.next = ptr::null_mut();
        Some(node)
    }

    /// Run every action, most recently registered first. Returns how many ran.
    pub(crate) fn run(mut self) -> usize {
        let mut ran = 0;
        while let Some(node) = self.pop() {
            (node.action)();
            ran += 1;
        }
        ran
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Chain").field(&self.0).finish()
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

/// Cleanup list for a confined scope. Only the owner thread may call into it.
pub(crate) struct ConfinedList {
    head: Cell<*mut Node>,
}

impl ConfinedList {
    pub(crate) fn new() -> Self {
        Self {
            head: Cell::new(ptr::null_mut()),
        }
    }

    pub(crate) fn push(&self, action: CloseAction) {
        let node = Box::new(Node {
            action,
            next: self.head.get(),
        });
        self.head.set(Box::into_raw(node));
    }

    /// Detach the whole list, leaving it empty.
    pub(crate) fn take(&self) -> Chain {
        Chain(self.head.replace(ptr::null_mut()))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.get().is_null()
    }
}

impl Drop for ConfinedList {
    fn drop(&mut self) {
        drop(self.take());
    }
}

/// Lock-free cleanup list for a shared scope.
pub(crate) struct SharedList {
    head: AtomicPtr<Node>,
}

impl SharedList {
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Push `action`. Fails, returning the action, once the list is closed.
    pub(crate) fn push(&self, action: CloseAction) -> Result<(), CloseAction> {
        let mut head = self.head.load(Ordering::Acquire);
        let mut node = Box::new(Node {
            action,
            next: ptr::null_mut(),
        });
        loop {
            if head == closed_sentinel() {
                return Err(node.action);
            }
            node.next = head;
            let raw = Box::into_raw(node);
            match self
                .head
                .compare_exchange_weak(head, raw, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(()),
                Err(observed) => {
                    // SAFETY: the CAS failed, so `raw` was never published and
                    // we still own it exclusively.
                    node = unsafe { Box::from_raw(raw) };
                    head = observed;
                }
            }
        }
    }

    /// Swap the head to the closed sentinel and detach the list.
    ///
    /// Returns `None` if the list was already closed.
    pub(crate) fn close(&self) -> Option<Chain> {
        let prev = self.head.swap(closed_sentinel(), Ordering::AcqRel);
        if prev == closed_sentinel() {
            None
        } else {
            Some(Chain(prev))
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.head.load(Ordering::Acquire) == closed_sentinel()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }
}

impl Drop for SharedList {
    fn drop(&mut self) {
        drop(Chain(*self.head.get_mut()));
    }
}
