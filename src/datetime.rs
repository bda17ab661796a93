use crate::error::{AccessError, Result};
use crate::models::DATETIME_FORMAT;
use chrono::NaiveDateTime;

/// Join a date (`YYYY-MM-DD`) and a time (`HH:MM:SS` or `HH:MM`) into one
/// datetime. A time without seconds gets `:00`.
pub fn normalize_datetime(date: &str, time: &str) -> Result<NaiveDateTime> {
    let joined = format!("{} {}", date.trim(), time.trim());
    if let Ok(dt) = NaiveDateTime::parse_from_str(&joined, DATETIME_FORMAT) {
        return Ok(dt);
    }

    // 'YYYY-MM-DD HH:MM'
    if joined.len() == 16 {
        let with_seconds = format!("{joined}:00");
        if let Ok(dt) = NaiveDateTime::parse_from_str(&with_seconds, DATETIME_FORMAT) {
            return Ok(dt);
        }
    }

    Err(AccessError::Datetime(format!(
        "cannot parse '{joined}' as {DATETIME_FORMAT}"
    )))
}
