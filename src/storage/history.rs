//! Per-user bounded conversation history.

use crate::models::Turn;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::RwLock;

/// Per-user history store.
///
/// Each user holds at most `max_turns` turns; appending trims the oldest.
/// The set of tracked users itself is bounded by an LRU cache so a long-
/// running server cannot grow without limit: once the cap is exceeded the
/// least-recently-touched user is evicted.
///
/// # Lock Poisoning
///
/// Handled with fail-open semantics: a poisoned lock makes reads return
/// empty history and writes no-op. Losing a few turns of context degrades
/// reply quality, not correctness.
pub struct HistoryStore {
    entries: RwLock<LruCache<String, Vec<Turn>>>,
    max_turns: usize,
}

impl HistoryStore {
    /// Creates a store with an effectively unbounded user set.
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self::with_max_users(max_turns, usize::MAX)
    }

    /// Creates a store that tracks at most `max_users` users.
    #[must_use]
    pub fn with_max_users(max_turns: usize, max_users: usize) -> Self {
        let entries = if max_users == usize::MAX {
            // `LruCache::new` pre-allocates its backing map at the requested
            // capacity, so the unbounded sentinel must use `unbounded()`
            // (same cap, no pre-allocation) to avoid a capacity overflow.
            LruCache::unbounded()
        } else {
            let cap = NonZeroUsize::new(max_users.max(1)).unwrap_or(NonZeroUsize::MIN);
            LruCache::new(cap)
        };
        Self {
            entries: RwLock::new(entries),
            max_turns,
        }
    }

    /// Appends a turn to a user's history, trimming to the configured depth.
    pub fn push(&self, user_id: &str, turn: Turn) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        if let Some(history) = entries.get_mut(user_id) {
            history.push(turn);
            let len = history.len();
            if len > self.max_turns {
                history.drain(..len - self.max_turns);
            }
        } else {
            entries.put(user_id.to_string(), vec![turn]);
        }
    }

    /// Returns a copy of a user's history, touching its LRU slot.
    #[must_use]
    pub fn get(&self, user_id: &str) -> Vec<Turn> {
        self.entries
            .write()
            .ok()
            .and_then(|mut entries| entries.get(user_id).cloned())
            .unwrap_or_default()
    }

    /// Replaces a user's history wholesale (snapshot restore).
    pub fn replace(&self, user_id: &str, mut turns: Vec<Turn>) {
        let len = turns.len();
        if len > self.max_turns {
            turns.drain(..len - self.max_turns);
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.put(user_id.to_string(), turns);
        }
    }

    /// Removes a user's history.
    pub fn clear(&self, user_id: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.pop(user_id);
        }
    }

    /// Whether the user currently has tracked history. Does not touch LRU
    /// order.
    #[must_use]
    pub fn contains(&self, user_id: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains(user_id))
            .unwrap_or(false)
    }

    /// User ids currently tracked, most recently used first.
    #[must_use]
    pub fn user_ids(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|entries| entries.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }
}
