//! Provider connection and identity link models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::employee::UnmappedEmployee;
use super::{EmployeeId, TenantId};

/// Per-tenant credentials for the external time provider.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Connection {
    pub tenant_id: TenantId,
    pub workspace_id: String,
    pub api_key: String,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted mapping between a provider user and an internal employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentityLink {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub external_user_id: String,
    pub external_user_name: Option<String>,
    pub external_user_email: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Aggregates shown on the integration status page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_entry_start_at: Option<DateTime<Utc>>,
    pub last_entry_end_at: Option<DateTime<Utc>>,
    pub entries_total: i64,
    pub entries_last_7_days: i64,
    pub entries_running: i64,
    pub active_employees: i64,
    pub mapped_employees: i64,
    pub active_unmapped_employees: i64,
    pub unmapped_employees_preview: Vec<UnmappedEmployee>,
}

/// Mask a credential for display: keep four characters on each side.
///
/// Values of eight characters or fewer are fully masked.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}
