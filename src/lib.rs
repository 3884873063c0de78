//! # Educhat
//!
//! Customer-support chatbot pipeline for a children's education school.
//!
//! Educhat turns a free-text user message into a grounded answer through a
//! multi-stage pipeline: a regex social-intent detector, a classification
//! LLM ("router") that decomposes the message and selects knowledge
//! documents, deterministic repair heuristics layered on the router output,
//! and a generation LLM whose prose is normalized by an ordered chain of
//! text transforms. Conversation state (history, greeting flags, CTA
//! eligibility) is carried across turns in per-user stores.
//!
//! ## Example
//!
//! ```rust,ignore
//! use educhat::{ChatRequest, ChatService};
//!
//! let service = ChatService::from_config(&config)?;
//! let reply = service.handle(&ChatRequest {
//!     user_id: "u1".to_string(),
//!     message: "Hello! Do you have courses for a 10-year-old?".to_string(),
//! });
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod generator;
pub mod intent;
pub mod llm;
pub mod models;
pub mod observability;
pub mod router;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{CtaPolicy, EduchatConfig, LlmConfig};
pub use generator::ResponseGenerator;
pub use llm::LlmProvider;
pub use models::{
    ChatRequest, ChatResponse, CtaKind, GenerationMetadata, Role, RouterResult, RouterStatus,
    SocialContext, Turn, UserSignal,
};
pub use router::Router;
pub use services::{ChatService, CompletedActionHandler, CtaTracker};
pub use storage::{DocumentStore, HistoryStore, SnapshotStore, SocialStateStore};

/// Error type for educhat operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// Upstream LLM failures never reach callers of the pipeline as errors: each
/// component that talks to a model degrades to a canned fallback and logs the
/// cause. These variants cover the remaining fallible surfaces (config,
/// persistence, direct provider use).
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A request carries an empty `user_id` or message
    /// - A config file value fails to parse
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - An LLM request fails (transport error, non-200, empty body)
    /// - Filesystem I/O on snapshots or documents fails
    /// - A config file cannot be read or parsed
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for educhat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized so every store ages entries against the same clock. Falls
/// back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
