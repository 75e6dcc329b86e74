//! Time-bank models: settings, adjustments, closures and balances.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{EmployeeId, TenantId};
use crate::dates::DateRange;

/// Default daily target: eight hours.
pub const DEFAULT_TARGET_DAILY_MINUTES: i32 = 480;

/// Upper bound for the daily target: sixteen hours.
pub const MAX_TARGET_DAILY_MINUTES: i32 = 960;

/// Default page size for adjustment and closure listings.
pub const DEFAULT_LIST_LIMIT: i64 = 30;

/// Upper bound for adjustment and closure listings.
pub const MAX_LIST_LIMIT: i64 = 200;

/// Per-tenant time-bank configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimeBankSettings {
    pub target_daily_minutes: i32,
    pub include_saturday: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for TimeBankSettings {
    fn default() -> Self {
        Self {
            target_daily_minutes: DEFAULT_TARGET_DAILY_MINUTES,
            include_saturday: false,
            updated_at: None,
        }
    }
}

/// Adjustment lifecycle. `approved` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "time_bank_adjustment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl AdjustmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for AdjustmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err("status must be pending, approved or rejected".into()),
        }
    }
}

/// A manual balance correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Adjustment {
    pub id: i64,
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub effective_date: NaiveDate,
    pub seconds_delta: i64,
    pub status: AdjustmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdjustment {
    pub employee_id: EmployeeId,
    pub effective_date: NaiveDate,
    pub seconds_delta: i64,
    pub reason: Option<String>,
    pub created_by: Option<String>,
}

/// Reviewer decision on a pending adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentDecision {
    pub status: AdjustmentStatus,
    pub note: Option<String>,
    pub reviewed_by: Option<String>,
}

/// Filters for listing adjustments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentFilter {
    pub range: DateRange,
    pub employee_id: Option<EmployeeId>,
    pub status: Option<AdjustmentStatus>,
    pub limit: i64,
}

/// Closure lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "time_bank_closure_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ClosureStatus {
    Closed,
    Reopened,
}

/// A locked (or previously locked) accounting period with its aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Closure {
    pub id: i64,
    pub tenant_id: TenantId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: ClosureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reopened_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reopened_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub employees_count: i64,
    pub total_worked_seconds: i64,
    pub total_expected_seconds: i64,
    pub total_adjustment_seconds: i64,
    pub total_balance_seconds: i64,
}

impl Closure {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.period_start,
            end: self.period_end,
        }
    }
}

/// Frozen per-employee totals of a closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClosureItem {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub worked_seconds: i64,
    pub expected_seconds: i64,
    pub adjustment_seconds: i64,
    pub balance_seconds: i64,
}

/// Input for closing a period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosePeriod {
    pub range: DateRange,
    pub note: Option<String>,
    pub closed_by: Option<String>,
    pub items: Vec<ClosureItem>,
}

/// Input for reopening a closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReopenPeriod {
    pub closure_id: i64,
    pub note: Option<String>,
    pub reopened_by: Option<String>,
}

/// Balance of one employee over a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeBalance {
    pub employee_id: EmployeeId,
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hire_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_date: Option<NaiveDate>,
    pub worked_seconds: i64,
    pub expected_seconds: i64,
    pub adjustment_seconds: i64,
    pub balance_seconds: i64,
}

/// Sum of the balances of every employee in a summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTotals {
    pub worked_seconds: i64,
    pub expected_seconds: i64,
    pub adjustment_seconds: i64,
    pub balance_seconds: i64,
}

/// Time-bank summary for a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBankSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_daily_minutes: i32,
    pub include_saturday: bool,
    pub employees: Vec<EmployeeBalance>,
    pub totals: BalanceTotals,
}

impl TimeBankSummary {
    /// Snapshot rows written into a closure.
    pub fn closure_items(&self) -> Vec<ClosureItem> {
        self.employees
            .iter()
            .map(|e| ClosureItem {
                employee_id: e.employee_id,
                employee_name: e.name.clone(),
                worked_seconds: e.worked_seconds,
                expected_seconds: e.expected_seconds,
                adjustment_seconds: e.adjustment_seconds,
                balance_seconds: e.balance_seconds,
            })
            .collect()
    }
}
