//! Environment-based configuration
//!
//! All runtime knobs come from environment variables (usually via a `.env`
//! file loaded by the binary before this runs). Only the pieces the core
//! needs are parsed here; the gateway token is carried opaquely for the
//! transport adapter.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{anyhow, Context, Result};
use chrono::FixedOffset;

/// Default path of the JSON note store.
pub const DEFAULT_DATABASE_PATH: &str = "db.json";

/// Default dispatcher tick interval in seconds. One minute, matching the
/// minute resolution of scheduled times.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 60;

/// Default per-send timeout in seconds for reminder delivery.
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration for the bot.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the messaging transport. The core never inspects it;
    /// it is handed to whatever gateway adapter is wired in.
    pub gateway_token: Option<String>,
    /// Path of the JSON note store.
    pub database_path: String,
    /// Dispatcher tick interval in seconds.
    pub tick_interval_secs: u64,
    /// Per-send timeout in seconds for reminder delivery.
    pub send_timeout_secs: u64,
    /// Fixed offset from UTC used to compute "now" for reminder matching.
    pub utc_offset: FixedOffset,
    /// Log level filter passed to the logger (e.g. "info", "debug").
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `GATEWAY_TOKEN` — transport credential (optional here; the
    ///   transport decides whether it is required)
    /// - `DATABASE_PATH` — note store path (default `db.json`)
    /// - `TICK_INTERVAL_SECS` — dispatcher interval (default 60)
    /// - `SEND_TIMEOUT_SECS` — delivery timeout (default 30)
    /// - `UTC_OFFSET` — zone offset like `+02:00` or `-05:30` (default UTC)
    /// - `LOG_LEVEL` — logger filter (default `info`)
    pub fn from_env() -> Result<Self> {
        let gateway_token = std::env::var("GATEWAY_TOKEN").ok().filter(|t| !t.is_empty());

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());

        let tick_interval_secs = parse_env_u64("TICK_INTERVAL_SECS", DEFAULT_TICK_INTERVAL_SECS)?;
        if tick_interval_secs == 0 {
            return Err(anyhow!("TICK_INTERVAL_SECS must be greater than zero"));
        }

        let send_timeout_secs = parse_env_u64("SEND_TIMEOUT_SECS", DEFAULT_SEND_TIMEOUT_SECS)?;

        let utc_offset = match std::env::var("UTC_OFFSET") {
            Ok(raw) if !raw.trim().is_empty() => parse_utc_offset(raw.trim())
                .with_context(|| format!("invalid UTC_OFFSET value: {raw:?}"))?,
            _ => chrono::FixedOffset::east_opt(0)
                .ok_or_else(|| anyhow!("constructing the UTC offset failed"))?,
        };

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Config {
            gateway_token,
            database_path,
            tick_interval_secs,
            send_timeout_secs,
            utc_offset,
            log_level,
        })
    }
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{name} must be an integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

/// Parse an offset of the form `+HH:MM`, `-HH:MM`, `+HH` or `-HH`.
fn parse_utc_offset(s: &str) -> Result<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1i32, &s[1..]),
        Some(b'-') => (-1i32, &s[1..]),
        _ => (1i32, s),
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (
            h.parse::<i32>().context("offset hours")?,
            m.parse::<i32>().context("offset minutes")?,
        ),
        None => (rest.parse::<i32>().context("offset hours")?, 0),
    };

    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(anyhow!("offset out of range: {s}"));
    }

    let total_secs = sign * (hours * 3600 + minutes * 60);
    FixedOffset::east_opt(total_secs).ok_or_else(|| anyhow!("offset out of range: {s}"))
}
