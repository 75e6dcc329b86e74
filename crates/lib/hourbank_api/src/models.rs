//! Request and response bodies.
//!
//! Numeric query parameters arrive as strings so malformed values produce
//! the same `{error, message}` body as every other validation failure.

use chrono::{DateTime, Utc};
use hourbank_core::models::provider::{IdentityLink, IntegrationStats};
use hourbank_core::models::timebank::{Closure, ClosureItem};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub version: String,
    pub store_connected: bool,
}

// ---- integrations ----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionRequest {
    pub api_key: String,
    pub workspace_id: String,
}

/// Provider configuration as shown to clients; the key is always masked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionResponse {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_masked: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Users seen while validating a new credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_found: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationStatusResponse {
    pub configured: bool,
    #[serde(flatten)]
    pub stats: IntegrationStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncBody {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub allow_closed_period: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinkBody {
    pub employee_id: i64,
    pub external_user_id: String,
    pub external_user_name: Option<String>,
    pub external_user_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksResponse {
    pub links: Vec<IdentityLink>,
}

// ---- time entries ----

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntriesQuery {
    pub employee_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<String>,
}

// ---- time-bank ----

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdjustmentsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub employee_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NoteBody {
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CloseBody {
    pub start_date: String,
    pub end_date: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureEmployeesResponse {
    pub closure: Closure,
    pub employees: Vec<ClosureItem>,
}
