//! Self-call marker (reentrancy guard)

use crate::object::{Instance, MockObject, ObjectId};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

thread_local! {
    // One slot per marker on each thread.
    static SELF_CALLS: RefCell<FxHashMap<u64, Weak<dyn MockObject>>> =
        RefCell::new(FxHashMap::default());
}

/// Thread-scoped, one-shot mark of "this instance is running its real method"
///
/// A real-call trampoline marks the instance right before it invokes the
/// method. That invocation re-enters the instrumented entry point, where
/// `check_and_consume` sees the mark, clears it and lets exactly that call
/// through. The mark is never visible to other threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelfCallMarker {
    key: u64,
}

impl SelfCallMarker {
    /// Create a marker with its own per-thread slot
    pub fn new() -> Self {
        static NEXT_KEY: AtomicU64 = AtomicU64::new(1);
        Self {
            key: NEXT_KEY.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Mark the instance on the current thread, replacing any previous mark
    pub fn mark(&self, instance: &Instance) {
        SELF_CALLS.with(|slots| {
            slots.borrow_mut().insert(self.key, Arc::downgrade(instance));
        });
    }

    /// Check whether a call on the instance should be intercepted
    ///
    /// Returns `false` and clears the mark when this thread marked exactly
    /// this instance; returns `true` otherwise.
    pub fn check_and_consume(&self, instance: ObjectId) -> bool {
        SELF_CALLS.with(|slots| {
            let mut slots = slots.borrow_mut();
            match slots.get(&self.key) {
                Some(marked) if ObjectId::of_weak(marked) == instance => {
                    slots.remove(&self.key);
                    false
                }
                _ => true,
            }
        })
    }

    /// Check for a mark without consuming it
    pub fn is_marked(&self, instance: ObjectId) -> bool {
        SELF_CALLS.with(|slots| {
            slots
                .borrow()
                .get(&self.key)
                .is_some_and(|marked| ObjectId::of_weak(marked) == instance)
        })
    }

    /// Clear this thread's mark
    pub fn clear(&self) {
        SELF_CALLS.with(|slots| {
            slots.borrow_mut().remove(&self.key);
        });
    }

    /// Mark the instance for the lifetime of the returned guard
    ///
    /// If the guarded call never reaches the instrumented entry point
    /// (rejected arguments, access failure, a panic), dropping the guard
    /// removes the mark so the next call on the instance is intercepted.
    pub fn arm(&self, instance: &Instance) -> SelfCallGuard {
        self.mark(instance);
        SelfCallGuard {
            marker: *self,
            instance: ObjectId::of_arc(instance),
        }
    }

    fn clear_if_marked(&self, instance: ObjectId) {
        // try_with: the slot map may already be gone during thread teardown.
        let _ = SELF_CALLS.try_with(|slots| {
            let mut slots = slots.borrow_mut();
            if slots
                .get(&self.key)
                .is_some_and(|marked| ObjectId::of_weak(marked) == instance)
            {
                slots.remove(&self.key);
            }
        });
    }
}

/// RAII guard for a self-call mark (clears an unconsumed mark on drop)
#[derive(Debug)]
#[must_use = "the mark is cleared as soon as the guard is dropped"]
pub struct SelfCallGuard {
    marker: SelfCallMarker,
    instance: ObjectId,
}

impl SelfCallGuard {
    /// Check whether the mark is still waiting to be consumed
    pub fn is_pending(&self) -> bool {
        self.marker.is_marked(self.instance)
    }
}

impl Drop for SelfCallGuard {
    fn drop(&mut self) {
        self.marker.clear_if_marked(self.instance);
    }
}

impl Default for SelfCallMarker {
    fn default() -> Self {
        Self::new()
    }
}
