//! Per-user JSON snapshot persistence.
//!
//! One file per sanitized user id under a configured directory. Snapshots
//! carry just enough to resume a conversation after a restart: history, the
//! last known user signal, the greeting flag and a message counter. Old or
//! corrupt files are deleted on read, never repaired.

use crate::current_timestamp;
use crate::models::{Role, Turn, UserSignal};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum sanitized user-id length used in file names.
const MAX_ID_LEN: usize = 64;

/// In-memory form of a persisted user snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Conversation history.
    pub history: Vec<Turn>,
    /// Last known user signal.
    pub user_signal: Option<UserSignal>,
    /// Whether a greeting was exchanged.
    pub greeting_exchanged: bool,
    /// Total messages seen from this user.
    pub message_count: usize,
}

/// Serializable snapshot format. Kept separate from the domain types so the
/// on-disk layout survives refactors of the in-memory model.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSnapshot {
    history: Vec<StoredTurn>,
    #[serde(default)]
    user_signal: Option<String>,
    #[serde(default)]
    greeting_exchanged: bool,
    #[serde(default)]
    message_count: usize,
    last_updated: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTurn {
    role: String,
    content: String,
}

/// Snapshot store writing one JSON file per user.
pub struct SnapshotStore {
    dir: PathBuf,
    max_age_secs: u64,
    max_file_bytes: usize,
}

impl SnapshotStore {
    /// Creates a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(
        dir: impl Into<PathBuf>,
        max_age_secs: u64,
        max_file_bytes: usize,
    ) -> crate::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| crate::Error::OperationFailed {
            operation: "create_snapshot_dir".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self {
            dir,
            max_age_secs,
            max_file_bytes,
        })
    }

    /// Persists a user's snapshot.
    ///
    /// If the serialized document exceeds the size cap, the oldest half of
    /// the history is dropped and the snapshot rewritten until it fits.
    pub fn save(&self, user_id: &str, snapshot: &Snapshot) {
        let mut stored = StoredSnapshot {
            history: snapshot
                .history
                .iter()
                .map(|t| StoredTurn {
                    role: t.role.as_str().to_string(),
                    content: t.content.clone(),
                })
                .collect(),
            user_signal: snapshot.user_signal.map(|s| s.as_str().to_string()),
            greeting_exchanged: snapshot.greeting_exchanged,
            message_count: snapshot.message_count,
            last_updated: current_timestamp(),
        };

        loop {
            let Ok(json) = serde_json::to_string(&stored) else {
                return;
            };
            if json.len() <= self.max_file_bytes || stored.history.is_empty() {
                if let Err(err) = fs::write(self.path_for(user_id), json) {
                    tracing::warn!(user_id = %user_id, error = %err, "failed to write snapshot");
                }
                return;
            }
            let drop = (stored.history.len() / 2).max(1);
            stored.history.drain(..drop);
        }
    }

    /// Loads a user's snapshot.
    ///
    /// Returns `None` for missing, expired, or corrupt files; the latter two
    /// are deleted on the way out.
    #[must_use]
    pub fn load(&self, user_id: &str) -> Option<Snapshot> {
        let path = self.path_for(user_id);
        let contents = fs::read_to_string(&path).ok()?;

        let stored: StoredSnapshot = match serde_json::from_str(&contents) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "deleting corrupt snapshot");
                let _ = fs::remove_file(&path);
                return None;
            }
        };

        let age = current_timestamp().saturating_sub(stored.last_updated);
        if age > self.max_age_secs {
            tracing::debug!(user_id = %user_id, age_secs = age, "deleting expired snapshot");
            let _ = fs::remove_file(&path);
            return None;
        }

        Some(Snapshot {
            history: stored
                .history
                .into_iter()
                .map(|t| Turn {
                    role: Role::parse(&t.role),
                    content: t.content,
                })
                .collect(),
            user_signal: stored.user_signal.as_deref().and_then(UserSignal::parse),
            greeting_exchanged: stored.greeting_exchanged,
            message_count: stored.message_count,
        })
    }

    /// Deletes a user's snapshot if present.
    pub fn delete(&self, user_id: &str) {
        let _ = fs::remove_file(self.path_for(user_id));
    }

    /// Persists many snapshots (process shutdown).
    pub fn save_all<'a>(&self, snapshots: impl IntoIterator<Item = (&'a str, &'a Snapshot)>) {
        for (user_id, snapshot) in snapshots {
            self.save(user_id, snapshot);
        }
    }

    /// Loads every valid snapshot in the directory (process startup).
    /// Expired and corrupt files are pruned as a side effect.
    #[must_use]
    pub fn load_all(&self) -> Vec<(String, Snapshot)> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let user_id = name.strip_suffix(".json")?.to_string();
                let snapshot = self.load(&user_id)?;
                Some((user_id, snapshot))
            })
            .collect()
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_user_id(user_id)))
    }

    /// The snapshot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Replaces non-alphanumeric characters with `_` and caps the length, so a
/// caller-supplied id can never escape the snapshot directory.
fn sanitize_user_id(user_id: &str) -> String {
    let sanitized: String = user_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(MAX_ID_LEN)
        .collect();
    if sanitized.is_empty() {
        "anonymous".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_age: u64, max_bytes: usize) -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), max_age, max_bytes).unwrap();
        (dir, store)
    }

    fn sample() -> Snapshot {
        Snapshot {
            history: vec![Turn::user("hello"), Turn::assistant("hi, how can we help")],
            user_signal: Some(UserSignal::PriceSensitive),
            greeting_exchanged: true,
            message_count: 1,
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_dir, store) = store(3600, 64 * 1024);
        store.save("u1", &sample());
        let loaded = store.load("u1").unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_sanitizes_user_id() {
        let (_dir, store) = store(3600, 64 * 1024);
        store.save("../evil/../id", &sample());
        assert!(store.load("../evil/../id").is_some());
        // The file lives inside the store dir under a flattened name
        assert!(store.dir().join("___evil____id.json").exists());
    }

    #[test]
    fn test_corrupt_file_deleted() {
        let (_dir, store) = store(3600, 64 * 1024);
        let path = store.dir().join("u1.json");
        fs::write(&path, "{not json").unwrap();
        assert!(store.load("u1").is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_expired_file_deleted() {
        let (_dir, store) = store(60, 64 * 1024);
        let stale = StoredSnapshot {
            history: Vec::new(),
            user_signal: None,
            greeting_exchanged: false,
            message_count: 0,
            last_updated: current_timestamp() - 120,
        };
        let path = store.dir().join("u1.json");
        fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();
        assert!(store.load("u1").is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_oversize_snapshot_truncates_history() {
        let (_dir, store) = store(3600, 600);
        let mut snapshot = sample();
        for i in 0..50 {
            snapshot
                .history
                .push(Turn::user(format!("message number {i} with some padding text")));
        }
        store.save("u1", &snapshot);
        let loaded = store.load("u1").unwrap();
        assert!(loaded.history.len() < snapshot.history.len());
        // The newest turn survives truncation
        assert_eq!(
            loaded.history.last().unwrap().content,
            snapshot.history.last().unwrap().content
        );
    }

    #[test]
    fn test_load_all() {
        let (_dir, store) = store(3600, 64 * 1024);
        store.save("u1", &sample());
        store.save("u2", &Snapshot::default());
        let mut all = store.load_all();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "u1");
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = store(3600, 64 * 1024);
        store.save("u1", &sample());
        store.delete("u1");
        assert!(store.load("u1").is_none());
    }
}
