//! Pipeline services: orchestration, completed-action detection, CTA
//! tracking, and injectable randomness.

pub mod chat;
pub mod chooser;
pub mod completed_action;
pub mod cta;

pub use chat::ChatService;
pub use chooser::{Chooser, FixedChooser, RandomChooser};
pub use completed_action::CompletedActionHandler;
pub use cta::{ActionTag, BlockDecision, CtaTracker, RefusalKind};
