//! Ledger listing.

use axum::Json;
use axum::extract::{Query, State};
use hourbank_core::dates::parse_optional_date;
use hourbank_core::models::ledger::{
    DEFAULT_ENTRIES_LIMIT, EntryFilter, LedgerEntry, MAX_ENTRIES_LIMIT,
};

use super::{parse_limit, parse_optional_id};
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;

/// `GET /time-entries`: ledger rows, newest first.
pub async fn list_entries(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Query(query): Query<crate::models::EntriesQuery>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    let start_date = parse_optional_date(query.start_date.as_deref(), "start_date")
        .map_err(AppError::Validation)?;
    let end_date =
        parse_optional_date(query.end_date.as_deref(), "end_date").map_err(AppError::Validation)?;
    if let (Some(start), Some(end)) = (start_date, end_date)
        && end < start
    {
        return Err(AppError::Validation("end_date must be >= start_date".into()));
    }

    let filter = EntryFilter {
        employee_id: parse_optional_id(query.employee_id.as_deref(), "employee_id")?,
        start_date,
        end_date,
        limit: parse_limit(query.limit.as_deref(), DEFAULT_ENTRIES_LIMIT, MAX_ENTRIES_LIMIT)?,
    };
    let entries = state.store.list_entries(user.tenant_id(), &filter).await?;
    Ok(Json(entries))
}
