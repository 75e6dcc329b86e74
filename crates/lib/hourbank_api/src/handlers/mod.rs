//! Request handlers.

pub mod health;
pub mod integrations;
pub mod time_bank;
pub mod time_entries;

use crate::error::AppError;

/// Parse an optional positive id from a query string value.
pub(crate) fn parse_optional_id(raw: Option<&str>, field: &str) -> Result<Option<i64>, AppError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => parse_id(v, field).map(Some),
    }
}

/// Parse a positive id from a path or query value.
pub(crate) fn parse_id(raw: &str, field: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Validation(format!("invalid {field}")))
}

/// Parse an optional `limit` and clamp it into `1..=max`.
pub(crate) fn parse_limit(raw: Option<&str>, default: i64, max: i64) -> Result<i64, AppError> {
    let requested = match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => None,
        Some(v) => Some(
            v.parse::<i64>()
                .map_err(|_| AppError::Validation("limit must be a positive number".into()))?,
        ),
    };
    hourbank_core::timebank::clamp_limit(requested, default, max).map_err(AppError::Validation)
}
