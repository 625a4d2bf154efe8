//! # Conversation Feature
//!
//! Per-user multi-step note creation dialogue.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod engine;

pub use engine::{ConversationEngine, SessionState};
