//! # Reminders Feature
//!
//! Periodic delivery of due notes, exactly once each.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Catch-up due matching, bounded send timeout
//! - 1.0.0: Initial minute-tick dispatcher

pub mod dispatcher;

pub use dispatcher::{DuePolicy, ReminderDispatcher};
