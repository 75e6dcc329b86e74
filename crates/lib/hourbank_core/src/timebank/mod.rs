//! Time-bank ledger: balances, adjustments and period closures.

pub mod adjustment;
pub mod closure;
pub mod settings;
pub mod summary;

use thiserror::Error;

use crate::store::StoreError;

/// Time-bank errors.
#[derive(Debug, Error)]
pub enum TimeBankError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type TimeBankResult<T> = Result<T, TimeBankError>;

/// Longest stored reason or note, in characters.
pub const MAX_NOTE_CHARS: usize = 255;

/// Trim a free-text note; blanks become `None` and long notes are cut.
pub fn normalize_note(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_NOTE_CHARS).collect())
}

/// Clamp a requested page size into `1..=max`, defaulting when absent.
pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> Result<i64, String> {
    match requested {
        None => Ok(default),
        Some(n) if n <= 0 => Err("limit must be a positive number".into()),
        Some(n) => Ok(n.min(max)),
    }
}
