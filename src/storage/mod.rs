//! Per-user state stores and the on-disk knowledge corpus.
//!
//! All stores are single-process and in-memory except the snapshot store,
//! which writes one JSON file per user. Concurrent requests for the same
//! user can interleave read-modify-write sequences across stores; each
//! individual store operation is atomic behind its lock, nothing more.

mod documents;
mod history;
mod snapshot;
mod social;

pub use documents::{DocumentStore, DocumentSummary};
pub use history::HistoryStore;
pub use snapshot::{Snapshot, SnapshotStore};
pub use social::{SocialState, SocialStateStore};
