use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Login times carried inside signed tokens use this layout.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn current_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

pub fn format_timestamp(ts: u64) -> String {
    match DateTime::<Utc>::from_timestamp(ts as i64, 0) {
        Some(time) => time.format(DATE_FORMAT).to_string(),
        None => String::new(),
    }
}

pub fn parse_timestamp(s: &str) -> Result<u64> {
    let time = NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .with_context(|| format!("invalid time '{s}'"))?;
    Ok(time.and_utc().timestamp() as u64)
}

/// Whether a record created at `create_time` is older than `expiry` seconds.
/// An expiry of zero never expires.
pub fn is_expired(create_time: u64, expiry: u64) -> bool {
    if expiry == 0 {
        return false;
    }
    current_timestamp() >= create_time.saturating_add(expiry)
}
