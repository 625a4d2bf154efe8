//! # Features Layer
//!
//! The bot's two units of behavior: the per-user conversation flow that
//! collects note fields, and the reminder dispatcher that delivers due
//! notes. They never share state directly; all coordination happens
//! through the note store's serialized access.

pub mod conversation;
pub mod reminders;

pub use conversation::{ConversationEngine, SessionState};
pub use reminders::{DuePolicy, ReminderDispatcher};
