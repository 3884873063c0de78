//! Per-user social state with TTL expiry.

use crate::current_timestamp;
use std::collections::HashMap;
use std::sync::RwLock;

/// Per-user social flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocialState {
    /// Whether a greeting was already exchanged this session.
    pub greeting_exchanged: bool,
    /// Whether the user said goodbye without the bot replying yet.
    pub farewell_pending: bool,
    /// Unix timestamp of the last social act.
    pub last_social_at: u64,
}

/// Store of per-user social state.
///
/// Any access to an entry older than the TTL resets it to defaults before
/// returning, so a user coming back the next day is greeted again.
pub struct SocialStateStore {
    states: RwLock<HashMap<String, SocialState>>,
    ttl_secs: u64,
}

impl SocialStateStore {
    /// Creates a store with the given TTL in seconds.
    #[must_use]
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            ttl_secs,
        }
    }

    /// Returns the user's current state, resetting it first if expired.
    #[must_use]
    pub fn get(&self, user_id: &str) -> SocialState {
        let now = current_timestamp();
        let Ok(mut states) = self.states.write() else {
            return SocialState::default();
        };
        match states.get(user_id) {
            Some(state) if !self.expired(state, now) => *state,
            Some(_) => {
                states.remove(user_id);
                SocialState::default()
            }
            None => SocialState::default(),
        }
    }

    /// Records that a greeting was exchanged.
    pub fn mark_greeting(&self, user_id: &str) {
        self.update(user_id, |state| state.greeting_exchanged = true);
    }

    /// Records a pending farewell.
    pub fn mark_farewell(&self, user_id: &str) {
        self.update(user_id, |state| state.farewell_pending = true);
    }

    /// Restores the greeting flag from a persisted snapshot.
    pub fn restore_greeting(&self, user_id: &str, greeting_exchanged: bool) {
        if greeting_exchanged {
            self.mark_greeting(user_id);
        }
    }

    /// Drops the user's state entirely.
    pub fn clear(&self, user_id: &str) {
        if let Ok(mut states) = self.states.write() {
            states.remove(user_id);
        }
    }

    fn update(&self, user_id: &str, f: impl FnOnce(&mut SocialState)) {
        let now = current_timestamp();
        let Ok(mut states) = self.states.write() else {
            return;
        };
        let entry = states.entry(user_id.to_string()).or_default();
        if self.expired(entry, now) {
            *entry = SocialState::default();
        }
        f(entry);
        entry.last_social_at = now;
    }

    const fn expired(&self, state: &SocialState, now: u64) -> bool {
        state.last_social_at != 0 && now.saturating_sub(state.last_social_at) > self.ttl_secs
    }
}
