//! Minute-resolution time handling
//!
//! Reminders are scheduled and matched at minute granularity. Everything
//! that touches a timestamp goes through the one canonical format defined
//! here so that a stored `remind_at` always parses back to the identical
//! minute.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use chrono::{FixedOffset, NaiveDateTime, Offset, Timelike, Utc};

/// The canonical textual format for scheduled times: `YYYY-MM-DD HH:MM`.
pub const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Render a timestamp in the canonical minute format.
///
/// Seconds and sub-second precision are dropped by the format itself, so
/// `parse_minute(&format_minute(t))` always yields `t` truncated to its
/// minute.
pub fn format_minute(t: NaiveDateTime) -> String {
    t.format(MINUTE_FORMAT).to_string()
}

/// Parse a timestamp in the canonical minute format.
///
/// Strict: trailing characters (including seconds) are rejected, matching
/// the validation the conversation flow promises users.
pub fn parse_minute(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, MINUTE_FORMAT)
}

/// Clock producing "now" truncated to the minute in a fixed UTC offset.
///
/// The offset is the single configured zone the bot runs in; per-user
/// timezones are out of scope.
#[derive(Debug, Clone, Copy)]
pub struct MinuteClock {
    offset: FixedOffset,
}

impl MinuteClock {
    /// Clock in UTC.
    pub fn utc() -> Self {
        MinuteClock { offset: Utc.fix() }
    }

    /// Clock with a fixed offset from UTC.
    pub fn with_offset(offset: FixedOffset) -> Self {
        MinuteClock { offset }
    }

    /// Current wall-clock time in the configured zone, truncated to the
    /// minute.
    pub fn now_minute(&self) -> NaiveDateTime {
        let local = Utc::now().with_timezone(&self.offset).naive_local();
        truncate_to_minute(local)
    }
}

/// Drop seconds and nanoseconds from a timestamp.
pub fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    // with_second(0)/with_nanosecond(0) cannot fail for these arguments;
    // fall back to the input rather than panic.
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}
