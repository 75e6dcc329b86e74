//! Manual balance corrections: `pending -> approved | rejected`.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use super::{TimeBankError, TimeBankResult, normalize_note};
use crate::dates::parse_date;
use crate::models::timebank::{
    Adjustment, AdjustmentDecision, AdjustmentFilter, AdjustmentStatus, NewAdjustment,
};
use crate::models::{EmployeeId, TenantId};
use crate::store::TimeStore;

/// Request body for a new adjustment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdjustmentRequest {
    #[serde(default)]
    pub employee_id: EmployeeId,
    #[serde(default)]
    pub effective_date: String,
    pub seconds_delta: Option<i64>,
    pub minutes_delta: Option<i64>,
    pub reason: Option<String>,
}

/// Largest accepted correction in either direction: one leap year.
pub const MAX_DELTA_SECONDS: i64 = 366 * 24 * 60 * 60;

/// Resolve the delta from exactly one of seconds or minutes.
pub fn parse_delta(seconds_delta: Option<i64>, minutes_delta: Option<i64>) -> Result<i64, String> {
    let delta = match (seconds_delta, minutes_delta) {
        (Some(_), Some(_)) => {
            return Err("seconds_delta and minutes_delta cannot be used together".into());
        }
        (Some(seconds), None) => seconds,
        (None, Some(minutes)) => minutes
            .checked_mul(60)
            .ok_or_else(|| "minutes_delta is out of range".to_string())?,
        (None, None) => return Err("seconds_delta or minutes_delta is required".into()),
    };
    if delta == 0 {
        return Err("delta must be non-zero".into());
    }
    if delta.unsigned_abs() > MAX_DELTA_SECONDS.unsigned_abs() {
        return Err(format!(
            "delta must be within {MAX_DELTA_SECONDS} seconds in either direction"
        ));
    }
    Ok(delta)
}

impl AdjustmentRequest {
    /// Validate the request into a pending adjustment.
    pub fn validate(&self, created_by: Option<&str>) -> Result<NewAdjustment, String> {
        if self.employee_id <= 0 {
            return Err("employee_id is required".into());
        }
        let effective_date: NaiveDate = parse_date(&self.effective_date, "effective_date")?;
        let seconds_delta = parse_delta(self.seconds_delta, self.minutes_delta)?;
        Ok(NewAdjustment {
            employee_id: self.employee_id,
            effective_date,
            seconds_delta,
            reason: normalize_note(self.reason.as_deref()),
            created_by: created_by.map(str::to_string),
        })
    }
}

pub async fn create_adjustment(
    store: &dyn TimeStore,
    tenant_id: TenantId,
    request: &AdjustmentRequest,
    created_by: Option<&str>,
) -> TimeBankResult<Adjustment> {
    let new = request
        .validate(created_by)
        .map_err(TimeBankError::Validation)?;
    let created = store.create_adjustment(tenant_id, &new).await?;
    info!(
        tenant_id,
        adjustment_id = created.id,
        employee_id = created.employee_id,
        seconds_delta = created.seconds_delta,
        "time-bank adjustment created"
    );
    Ok(created)
}

/// Approve or reject a pending adjustment.
pub async fn decide_adjustment(
    store: &dyn TimeStore,
    tenant_id: TenantId,
    adjustment_id: i64,
    status: AdjustmentStatus,
    note: Option<&str>,
    reviewed_by: Option<&str>,
) -> TimeBankResult<Adjustment> {
    if status == AdjustmentStatus::Pending {
        return Err(TimeBankError::Validation("invalid status transition".into()));
    }
    let decision = AdjustmentDecision {
        status,
        note: normalize_note(note),
        reviewed_by: reviewed_by.map(str::to_string),
    };
    let decided = store
        .decide_adjustment(tenant_id, adjustment_id, &decision)
        .await?;
    info!(
        tenant_id,
        adjustment_id,
        status = status.as_str(),
        "time-bank adjustment decided"
    );
    Ok(decided)
}

pub async fn list_adjustments(
    store: &dyn TimeStore,
    tenant_id: TenantId,
    filter: &AdjustmentFilter,
) -> TimeBankResult<Vec<Adjustment>> {
    Ok(store.list_adjustments(tenant_id, filter).await?)
}
