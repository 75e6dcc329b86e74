//! Time-bank handlers: settings, balances, adjustments and closures.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use hourbank_core::dates::{DateRange, parse_date, time_bank_range};
use hourbank_core::models::timebank::{
    Adjustment, AdjustmentFilter, AdjustmentStatus, Closure, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
    TimeBankSettings, TimeBankSummary,
};
use hourbank_core::timebank::adjustment::{self, AdjustmentRequest};
use hourbank_core::timebank::settings::{self, SettingsPatch};
use hourbank_core::timebank::{closure, summary};

use super::{parse_id, parse_limit, parse_optional_id};
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::JsonBody;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    AdjustmentsQuery, CloseBody, ClosureEmployeesResponse, LimitQuery, NoteBody, RangeQuery,
};

fn range_from(start: Option<&str>, end: Option<&str>) -> AppResult<DateRange> {
    time_bank_range(start, end, Utc::now().date_naive()).map_err(AppError::Validation)
}

// ---- settings ----

/// `GET /time-bank/settings`
pub async fn get_settings(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<TimeBankSettings>> {
    let current = settings::get_settings(state.store.as_ref(), user.tenant_id()).await?;
    Ok(Json(current))
}

/// `PUT /time-bank/settings`: partial update.
pub async fn put_settings(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    JsonBody(patch): JsonBody<SettingsPatch>,
) -> AppResult<Json<TimeBankSettings>> {
    let saved = settings::update_settings(state.store.as_ref(), user.tenant_id(), &patch).await?;
    Ok(Json(saved))
}

// ---- summary ----

/// `GET /time-bank/summary`: per-employee balances over a range.
pub async fn get_summary(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<TimeBankSummary>> {
    let range = range_from(query.start_date.as_deref(), query.end_date.as_deref())?;
    let summary =
        summary::build_summary(state.store.as_ref(), user.tenant_id(), range, Utc::now()).await?;
    Ok(Json(summary))
}

// ---- adjustments ----

/// `GET /time-bank/adjustments`
pub async fn list_adjustments(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Query(query): Query<AdjustmentsQuery>,
) -> AppResult<Json<Vec<Adjustment>>> {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => Some(raw.parse::<AdjustmentStatus>().map_err(AppError::Validation)?),
    };
    let filter = AdjustmentFilter {
        range: range_from(query.start_date.as_deref(), query.end_date.as_deref())?,
        employee_id: parse_optional_id(query.employee_id.as_deref(), "employee_id")?,
        status,
        limit: parse_limit(query.limit.as_deref(), DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT)?,
    };
    let rows = adjustment::list_adjustments(state.store.as_ref(), user.tenant_id(), &filter).await?;
    Ok(Json(rows))
}

/// `POST /time-bank/adjustments`: create a pending adjustment.
pub async fn create_adjustment(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    JsonBody(body): JsonBody<AdjustmentRequest>,
) -> AppResult<Json<Adjustment>> {
    let created = adjustment::create_adjustment(
        state.store.as_ref(),
        user.tenant_id(),
        &body,
        Some(user.user_id()),
    )
    .await?;
    Ok(Json(created))
}

async fn decide(
    state: &AppState,
    user: &AuthenticatedUser,
    raw_id: &str,
    status: AdjustmentStatus,
    body: Option<JsonBody<NoteBody>>,
) -> AppResult<Json<Adjustment>> {
    let id = parse_id(raw_id, "adjustment id")?;
    let note = body.and_then(|JsonBody(b)| b.note);
    let decided = adjustment::decide_adjustment(
        state.store.as_ref(),
        user.tenant_id(),
        id,
        status,
        note.as_deref(),
        Some(user.user_id()),
    )
    .await?;
    Ok(Json(decided))
}

/// `POST /time-bank/adjustments/{id}/approve`
pub async fn approve_adjustment(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Option<JsonBody<NoteBody>>,
) -> AppResult<Json<Adjustment>> {
    decide(&state, &user, &id, AdjustmentStatus::Approved, body).await
}

/// `POST /time-bank/adjustments/{id}/reject`
pub async fn reject_adjustment(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Option<JsonBody<NoteBody>>,
) -> AppResult<Json<Adjustment>> {
    decide(&state, &user, &id, AdjustmentStatus::Rejected, body).await
}

// ---- closures ----

/// `GET /time-bank/closures`
pub async fn list_closures(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<Closure>>> {
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT)?;
    let rows = closure::list_closures(state.store.as_ref(), user.tenant_id(), limit).await?;
    Ok(Json(rows))
}

/// `POST /time-bank/closures/close`: lock a period and snapshot balances.
pub async fn close_period(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    JsonBody(body): JsonBody<CloseBody>,
) -> AppResult<Json<Closure>> {
    let start = parse_date(&body.start_date, "start_date").map_err(AppError::Validation)?;
    let end = parse_date(&body.end_date, "end_date").map_err(AppError::Validation)?;
    let range = DateRange::new(start, end).map_err(AppError::Validation)?;
    let closed = closure::close_period(
        state.store.as_ref(),
        user.tenant_id(),
        range,
        body.note.as_deref(),
        Some(user.user_id()),
        Utc::now(),
    )
    .await?;
    Ok(Json(closed))
}

/// `POST /time-bank/closures/{id}/reopen`
pub async fn reopen_period(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Option<JsonBody<NoteBody>>,
) -> AppResult<Json<Closure>> {
    let id = parse_id(&id, "closure id")?;
    let note = body.and_then(|JsonBody(b)| b.note);
    let reopened = closure::reopen_period(
        state.store.as_ref(),
        user.tenant_id(),
        id,
        note.as_deref(),
        Some(user.user_id()),
    )
    .await?;
    Ok(Json(reopened))
}

/// `GET /time-bank/closures/{id}/employees`: frozen per-employee totals.
pub async fn closure_employees(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ClosureEmployeesResponse>> {
    let id = parse_id(&id, "closure id")?;
    let (closure, employees) =
        closure::closure_items(state.store.as_ref(), user.tenant_id(), id).await?;
    Ok(Json(ClosureEmployeesResponse { closure, employees }))
}

/// `GET /time-bank/closures/{id}/export.csv`
pub async fn export_closure(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id, "closure id")?;
    let (closure, body) =
        closure::export_closure_csv(state.store.as_ref(), user.tenant_id(), id).await?;
    let disposition = format!(
        "attachment; filename=\"time-bank-{}-{}.csv\"",
        closure.period_start, closure.period_end
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
