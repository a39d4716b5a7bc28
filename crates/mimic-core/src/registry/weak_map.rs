//! Concurrent map with weak, identity-compared keys

use crate::object::ObjectId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use std::collections::VecDeque;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

type IdentityHasher = BuildHasherDefault<FxHasher>;

/// One map entry
///
/// The weak handle pins the key's allocation, so its address can not be
/// handed to another object while the slot exists.
struct Slot<K: ?Sized, V> {
    key: Weak<K>,
    value: V,
    /// Matches the slot's entry in the sweep queue
    ticket: u64,
}

impl<K: ?Sized, V> Slot<K, V> {
    fn is_live(&self) -> bool {
        self.key.strong_count() > 0
    }
}

/// Work done by one incremental sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Sweep {
    pub(crate) examined: usize,
    pub(crate) removed: usize,
}

/// Concurrent identity map that does not keep its keys alive
///
/// Keys are compared by reference identity only. Slots whose key has
/// been dropped everywhere else are pruned inline: a lookup that hits a
/// dead slot removes it, and every `expunge_interval` accesses the
/// accessing thread examines the next `expunge_interval` slots of a
/// rotating sweep queue. Per-access work is bounded regardless of map
/// size; [`expunge_stale_entries`](Self::expunge_stale_entries) is the
/// full sweep. There is no background thread.
pub struct WeakIdentityMap<K: ?Sized, V> {
    slots: DashMap<ObjectId, Slot<K, V>, IdentityHasher>,
    /// Slot identities in sweep order, with the ticket of the slot they were queued for
    sweep_queue: Mutex<VecDeque<(ObjectId, u64)>>,
    next_ticket: AtomicU64,
    accesses: AtomicUsize,
    expunge_interval: usize,
}

impl<K: ?Sized, V: Clone> WeakIdentityMap<K, V> {
    /// Accesses between two incremental sweeps unless configured otherwise
    pub const DEFAULT_EXPUNGE_INTERVAL: usize = 64;

    /// Create an empty map
    pub fn new() -> Self {
        Self::with_expunge_interval(Self::DEFAULT_EXPUNGE_INTERVAL)
    }

    /// Create an empty map sweeping every `interval` accesses
    pub fn with_expunge_interval(interval: usize) -> Self {
        Self {
            slots: DashMap::with_hasher(IdentityHasher::default()),
            sweep_queue: Mutex::new(VecDeque::new()),
            next_ticket: AtomicU64::new(0),
            accesses: AtomicUsize::new(0),
            expunge_interval: interval.max(1),
        }
    }

    /// Associate a value with the key's identity, returning the previous value
    pub fn put(&self, key: &Arc<K>, value: V) -> Option<V> {
        self.touch();
        let id = ObjectId::of_arc(key);
        let key = Arc::downgrade(key);
        let (previous, queued) = match self.slots.entry(id) {
            Entry::Occupied(mut entry) => {
                let ticket = entry.get().ticket;
                (Some(entry.insert(Slot { key, value, ticket })), None)
            }
            Entry::Vacant(entry) => {
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                entry.insert(Slot { key, value, ticket });
                (None, Some(ticket))
            }
        };
        // Shard guard is released; the queue lock is never taken under it.
        if let Some(ticket) = queued {
            self.sweep_queue.lock().push_back((id, ticket));
        }
        previous.filter(Slot::is_live).map(|previous| previous.value)
    }

    /// Get the value associated with an identity
    pub fn get(&self, key: ObjectId) -> Option<V> {
        self.touch();
        let found = {
            let slot = self.slots.get(&key)?;
            slot.is_live().then(|| slot.value.clone())
        };
        if found.is_none() {
            self.remove_dead(key);
        }
        found
    }

    /// Get the live key together with its value
    pub fn get_entry(&self, key: ObjectId) -> Option<(Arc<K>, V)> {
        self.touch();
        let found = {
            let slot = self.slots.get(&key)?;
            slot.key.upgrade().map(|strong| (strong, slot.value.clone()))
        };
        if found.is_none() {
            self.remove_dead(key);
        }
        found
    }

    /// Check if an identity is associated with a value
    pub fn contains_key(&self, key: ObjectId) -> bool {
        self.touch();
        let live = match self.slots.get(&key) {
            Some(slot) => slot.is_live(),
            None => return false,
        };
        if !live {
            self.remove_dead(key);
        }
        live
    }

    /// Remove the association for an identity
    pub fn remove(&self, key: ObjectId) -> Option<V> {
        self.slots
            .remove(&key)
            .map(|(_, slot)| slot)
            .filter(Slot::is_live)
            .map(|slot| slot.value)
    }

    /// Number of slots, including dead ones not yet expunged
    pub fn approximate_size(&self) -> usize {
        self.slots.len()
    }

    /// Remove every slot whose key is gone, returning how many were removed
    pub fn expunge_stale_entries(&self) -> usize {
        let mut removed = 0;
        self.slots.retain(|_, slot| {
            let live = slot.is_live();
            if !live {
                removed += 1;
            }
            live
        });
        if removed > 0 {
            tracing::debug!(removed, remaining = self.slots.len(), "expunged stale mock entries");
        }
        removed
    }

    fn remove_dead(&self, key: ObjectId) {
        self.slots.remove_if(&key, |_, slot| !slot.is_live());
    }

    // Must not run while a shard guard is held by the caller.
    fn touch(&self) -> Option<Sweep> {
        let count = self.accesses.fetch_add(1, Ordering::Relaxed) + 1;
        (count % self.expunge_interval == 0).then(|| self.sweep(self.expunge_interval))
    }

    /// Examine at most `budget` queued slots, removing the dead ones
    ///
    /// Live slots go to the back of the queue, so consecutive sweeps
    /// rotate through the whole map. Queue entries whose slot was removed
    /// or replaced by a fresh insertion are dropped. A sweep already in
    /// progress on another thread makes this one a no-op.
    pub(crate) fn sweep(&self, budget: usize) -> Sweep {
        let mut sweep = Sweep::default();
        let Some(mut queue) = self.sweep_queue.try_lock() else {
            return sweep;
        };

        for _ in 0..budget.min(queue.len()) {
            let Some((id, ticket)) = queue.pop_front() else {
                break;
            };
            sweep.examined += 1;
            let live = match self.slots.get(&id) {
                Some(slot) if slot.ticket == ticket => slot.is_live(),
                _ => continue,
            };
            if live {
                queue.push_back((id, ticket));
            } else if self
                .slots
                .remove_if(&id, |_, slot| slot.ticket == ticket && !slot.is_live())
                .is_some()
            {
                sweep.removed += 1;
            }
        }
        drop(queue);

        if sweep.removed > 0 {
            tracing::trace!(
                examined = sweep.examined,
                removed = sweep.removed,
                "swept stale mock entries"
            );
        }
        sweep
    }
}

impl<K: ?Sized, V: Clone> Default for WeakIdentityMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
