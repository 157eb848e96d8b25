//! Per-module result cache with an exclusive-build guarantee.
//!
//! Each key moves through `Absent → Building → Published`. The first
//! caller of [`ResultCache::get_or_lock`] for an absent key becomes the
//! exclusive builder; every other caller blocks cooperatively until the
//! builder publishes, then reuses the published value — a second
//! independent build never happens.
//!
//! There is no wait timeout: a builder that never publishes stalls its
//! waiters for as long as it holds the slot. Builders are expected to be
//! short, synchronous, and non-failing; a build that can legitimately
//! fail must publish a sentinel "empty" value instead of holding the
//! slot. A builder that *abandons* the slot (drops it, including by
//! panic) re-opens the key and wakes one waiter to take over, so an
//! abandoned key never wedges the cache.
//!
//! Entries are invalidated wholesale — at the start of a new top-level
//! execution or on a timestep-boundary reduction — never individually.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::sync::{Arc, Condvar, Mutex};

use indexmap::IndexMap;

enum EntryState<V> {
    Building,
    Published(Arc<V>),
}

struct CacheState<V> {
    entries: IndexMap<String, EntryState<V>>,
    /// Bumped on every wholesale invalidation so a builder from a
    /// previous generation cannot publish into the new one.
    generation: u64,
}

/// Outcome of [`ResultCache::get_or_lock`].
pub enum CacheLookup<'a, V> {
    /// The key is published; here is the value.
    Hit(Arc<V>),
    /// The key was absent; the caller is now the exclusive builder and
    /// must publish (or drop the slot to hand the key to a waiter).
    Miss(BuildSlot<'a, V>),
}

impl<V> CacheLookup<'_, V> {
    /// Whether this lookup requires the caller to build.
    pub fn needs_build(&self) -> bool {
        matches!(self, Self::Miss(_))
    }
}

/// A per-module map from artifact key to a cached result bundle.
pub struct ResultCache<V> {
    state: Mutex<CacheState<V>>,
    published: Condvar,
}

// Compile-time assertion: the cache must be shareable across the
// module's worker threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ResultCache<Vec<f32>>>();
};

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ResultCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: IndexMap::new(),
                generation: 0,
            }),
            published: Condvar::new(),
        }
    }

    /// Get the published value for `key`, or become its exclusive builder.
    ///
    /// Blocks while another caller is building `key`; wakes when that
    /// caller publishes (returning a hit) or abandons the slot (making
    /// this caller the builder).
    pub fn get_or_lock(&self, key: &str) -> CacheLookup<'_, V> {
        let mut state = self.state.lock().expect("cache lock poisoned");
        loop {
            match state.entries.get(key) {
                Some(EntryState::Published(value)) => {
                    return CacheLookup::Hit(Arc::clone(value));
                }
                Some(EntryState::Building) => {
                    // Cooperative wait, bounded only by builder progress.
                    state = self.published.wait(state).expect("cache lock poisoned");
                }
                None => {
                    let generation = state.generation;
                    state
                        .entries
                        .insert(key.to_string(), EntryState::Building);
                    return CacheLookup::Miss(BuildSlot {
                        cache: self,
                        key: key.to_string(),
                        generation,
                        armed: true,
                    });
                }
            }
        }
    }

    /// Published value for `key` without locking, if any.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let state = self.state.lock().expect("cache lock poisoned");
        match state.entries.get(key) {
            Some(EntryState::Published(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Drop every entry.
    ///
    /// In-flight builders from before the invalidation publish into the
    /// void: their values are discarded rather than resurrected into the
    /// new generation. Waiters are woken so they can retry against the
    /// cleared map.
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock().expect("cache lock poisoned");
        state.entries.clear();
        state.generation += 1;
        self.published.notify_all();
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        let state = self.state.lock().expect("cache lock poisoned");
        state
            .entries
            .values()
            .filter(|e| matches!(e, EntryState::Published(_)))
            .count()
    }

    /// Whether no entries are published.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive right to build the value for one key.
///
/// Obtained from [`ResultCache::get_or_lock`] on a miss. The holder must
/// call [`BuildSlot::publish`]; dropping the slot unbuilt re-opens the
/// key and wakes a waiter to take over.
pub struct BuildSlot<'a, V> {
    cache: &'a ResultCache<V>,
    key: String,
    generation: u64,
    armed: bool,
}

impl<V> BuildSlot<'_, V> {
    /// The key this slot builds.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Publish the built value and wake all waiters.
    ///
    /// If the cache was invalidated wholesale while this build was in
    /// progress, the value is discarded — the new generation must not
    /// see artifacts keyed under the old one.
    pub fn publish(mut self, value: V) -> Arc<V> {
        self.armed = false;
        let value = Arc::new(value);
        let mut state = self.cache.state.lock().expect("cache lock poisoned");
        if state.generation == self.generation {
            state
                .entries
                .insert(self.key.clone(), EntryState::Published(Arc::clone(&value)));
            self.cache.published.notify_all();
        }
        value
    }
}

impl<V> Drop for BuildSlot<'_, V> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.cache.state.lock().expect("cache lock poisoned");
        if state.generation == self.generation {
            if let Some(EntryState::Building) = state.entries.get(self.key.as_str()) {
                state.entries.shift_remove(self.key.as_str());
            }
        }
        self.cache.published.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn first_caller_builds_second_hits() {
        let cache: ResultCache<i32> = ResultCache::new();
        match cache.get_or_lock("k") {
            CacheLookup::Miss(slot) => {
                slot.publish(41);
            }
            CacheLookup::Hit(_) => panic!("fresh key must miss"),
        }
        let second = cache.get_or_lock("k");
        match second {
            CacheLookup::Hit(v) => assert_eq!(*v, 41),
            CacheLookup::Miss(_) => panic!("published key must hit"),
        }
    }

    #[test]
    fn exactly_one_concurrent_builder() {
        let cache: Arc<ResultCache<usize>> = Arc::new(ResultCache::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let builds = Arc::clone(&builds);
            handles.push(std::thread::spawn(move || {
                match cache.get_or_lock("artifact") {
                    CacheLookup::Miss(slot) => {
                        // Give other threads time to pile up as waiters.
                        std::thread::sleep(Duration::from_millis(20));
                        let n = builds.fetch_add(1, Ordering::SeqCst);
                        *slot.publish(n + 100)
                    }
                    CacheLookup::Hit(v) => *v,
                }
            }));
        }
        let results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1, "exactly one build");
        assert!(
            results.iter().all(|&v| v == results[0]),
            "all callers observe the single published value"
        );
    }

    #[test]
    fn abandoned_slot_hands_key_to_waiter() {
        let cache: Arc<ResultCache<i32>> = Arc::new(ResultCache::new());

        let slot = match cache.get_or_lock("k") {
            CacheLookup::Miss(slot) => slot,
            CacheLookup::Hit(_) => panic!("fresh key must miss"),
        };

        let cache2 = Arc::clone(&cache);
        let waiter = std::thread::spawn(move || match cache2.get_or_lock("k") {
            CacheLookup::Miss(slot) => {
                slot.publish(7);
                true
            }
            CacheLookup::Hit(_) => false,
        });

        std::thread::sleep(Duration::from_millis(20));
        drop(slot); // abandon without publishing

        assert!(waiter.join().unwrap(), "waiter must become the builder");
        assert_eq!(*cache.get("k").unwrap(), 7);
    }

    #[test]
    fn invalidate_all_clears_published_entries() {
        let cache: ResultCache<i32> = ResultCache::new();
        if let CacheLookup::Miss(slot) = cache.get_or_lock("a") {
            slot.publish(1);
        }
        if let CacheLookup::Miss(slot) = cache.get_or_lock("b") {
            slot.publish(2);
        }
        assert_eq!(cache.len(), 2);

        cache.invalidate_all();
        assert!(cache.is_empty());
        assert!(cache.get_or_lock("a").needs_build());
    }

    #[test]
    fn stale_builder_does_not_pollute_new_generation() {
        let cache: ResultCache<i32> = ResultCache::new();
        let slot = match cache.get_or_lock("k") {
            CacheLookup::Miss(slot) => slot,
            CacheLookup::Hit(_) => panic!(),
        };
        cache.invalidate_all();
        slot.publish(9); // from the old generation — discarded
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn sentinel_empty_value_unblocks_waiters() {
        // A fallible builder publishes an empty bundle instead of holding
        // the slot; waiters observe the sentinel rather than stalling.
        let cache: ResultCache<Vec<f32>> = ResultCache::new();
        if let CacheLookup::Miss(slot) = cache.get_or_lock("failed") {
            slot.publish(Vec::new());
        }
        let lookup = cache.get_or_lock("failed");
        match lookup {
            CacheLookup::Hit(v) => assert!(v.is_empty()),
            CacheLookup::Miss(_) => panic!("sentinel must be published"),
        }
    }

    #[test]
    fn distinct_keys_build_independently() {
        let cache: ResultCache<i32> = ResultCache::new();
        let a = cache.get_or_lock("a");
        let b = cache.get_or_lock("b");
        assert!(a.needs_build());
        assert!(b.needs_build());
        if let (CacheLookup::Miss(sa), CacheLookup::Miss(sb)) = (a, b) {
            sa.publish(1);
            sb.publish(2);
        }
        assert_eq!(*cache.get("a").unwrap(), 1);
        assert_eq!(*cache.get("b").unwrap(), 2);
    }
}
