//! Ledger entry models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{EmployeeId, TenantId};

/// Source tag for entries pulled from Clockify.
pub const SOURCE_CLOCKIFY: &str = "clockify";

/// Default page size for ledger listings.
pub const DEFAULT_ENTRIES_LIMIT: i64 = 200;

/// Upper bound for ledger listings.
pub const MAX_ENTRIES_LIMIT: i64 = 1000;

/// A stored time entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub tenant_id: TenantId,
    pub employee_id: Option<EmployeeId>,
    pub source: String,
    pub external_entry_id: String,
    pub external_user_id: String,
    pub workspace_id: String,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub description: Option<String>,
    pub tag_ids: serde_json::Value,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub is_running: bool,
    pub billable: bool,
    pub synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalized entry ready to be upserted.
///
/// `(tenant_id, source, external_entry_id)` is the idempotency key; every
/// other field overwrites the stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub tenant_id: TenantId,
    pub employee_id: Option<EmployeeId>,
    pub source: String,
    pub external_entry_id: String,
    pub external_user_id: String,
    pub workspace_id: String,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub description: Option<String>,
    pub tag_ids: serde_json::Value,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub is_running: bool,
    pub billable: bool,
    pub raw: serde_json::Value,
    pub synced_at: DateTime<Utc>,
}

/// Filters for listing ledger entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    pub employee_id: Option<EmployeeId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: i64,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            employee_id: None,
            start_date: None,
            end_date: None,
            limit: DEFAULT_ENTRIES_LIMIT,
        }
    }
}
