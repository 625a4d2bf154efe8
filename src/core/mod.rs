//! # Core Module
//!
//! Configuration and shared time helpers for the note bot.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add clock module with the canonical minute format
//! - 1.0.0: Initial creation with config module

pub mod clock;
pub mod config;

// Re-export commonly used items
pub use clock::{format_minute, parse_minute, MinuteClock, MINUTE_FORMAT};
pub use config::Config;
