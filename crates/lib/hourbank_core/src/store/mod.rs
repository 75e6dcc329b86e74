//! Ledger persistence.
//!
//! [`TimeStore`] is the only way the domain modules touch storage. Writes that
//! must check-then-act (closing a period, creating or deciding adjustments)
//! are single trait calls so each backend can make them atomic.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::dates::DateRange;
use crate::models::employee::Employee;
use crate::models::ledger::{EntryFilter, LedgerEntry, NewLedgerEntry};
use crate::models::provider::{Connection, IdentityLink, IntegrationStats};
use crate::models::timebank::{
    Adjustment, AdjustmentDecision, AdjustmentFilter, ClosePeriod, Closure, ClosureItem,
    NewAdjustment, ReopenPeriod, TimeBankSettings,
};
use crate::models::{EmployeeId, TenantId};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("date {0} is inside a closed period")]
    PeriodClosed(chrono::NaiveDate),

    #[error("period overlaps closed period {0}")]
    Overlap(DateRange),

    #[error("invalid status transition")]
    InvalidTransition,

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Tenant-scoped persistence for the time-bank.
#[async_trait]
pub trait TimeStore: Send + Sync {
    /// Cheap reachability check.
    async fn ping(&self) -> StoreResult<()>;

    // ---- provider connections ----

    async fn get_connection(&self, tenant_id: TenantId) -> StoreResult<Option<Connection>>;

    async fn upsert_connection(
        &self,
        tenant_id: TenantId,
        workspace_id: &str,
        api_key: &str,
        actor: Option<&str>,
    ) -> StoreResult<Connection>;

    /// Every configured tenant, ordered by tenant id.
    async fn list_connections(&self) -> StoreResult<Vec<Connection>>;

    // ---- employees (read-only) ----

    /// Employees whose status is not terminated.
    async fn list_active_employees(&self, tenant_id: TenantId) -> StoreResult<Vec<Employee>>;

    async fn get_employee(
        &self,
        tenant_id: TenantId,
        employee_id: EmployeeId,
    ) -> StoreResult<Option<Employee>>;

    /// Employees employed at some point of `range`, ordered by name then id.
    async fn list_employees_in_range(
        &self,
        tenant_id: TenantId,
        range: DateRange,
    ) -> StoreResult<Vec<Employee>>;

    // ---- identity links ----

    async fn list_links(&self, tenant_id: TenantId) -> StoreResult<Vec<IdentityLink>>;

    /// Insert or refresh a link keyed by external user id.
    async fn upsert_link(&self, link: &IdentityLink) -> StoreResult<()>;

    /// Set a link by hand, dropping any link that holds the same employee or
    /// the same external user.
    async fn replace_link(&self, link: &IdentityLink) -> StoreResult<IdentityLink>;

    // ---- ledger ----

    /// Insert or overwrite an entry by its idempotency key.
    ///
    /// With `respect_closed`, an entry starting inside a closed period fails
    /// with [`StoreError::PeriodClosed`]; the check runs under the same
    /// tenant lock as closing, so a period closed mid-sync is honoured.
    async fn upsert_entry(&self, entry: &NewLedgerEntry, respect_closed: bool)
    -> StoreResult<()>;

    /// Entries newest first (`start_at DESC, id DESC`).
    async fn list_entries(
        &self,
        tenant_id: TenantId,
        filter: &EntryFilter,
    ) -> StoreResult<Vec<LedgerEntry>>;

    /// Worked seconds per employee for entries starting inside `range`.
    /// Running entries count `now - start_at`.
    async fn worked_seconds(
        &self,
        tenant_id: TenantId,
        range: DateRange,
        now: DateTime<Utc>,
    ) -> StoreResult<HashMap<EmployeeId, i64>>;

    async fn integration_stats(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
        preview_limit: i64,
    ) -> StoreResult<IntegrationStats>;

    // ---- settings ----

    /// Stored settings or the defaults.
    async fn get_settings(&self, tenant_id: TenantId) -> StoreResult<TimeBankSettings>;

    async fn save_settings(
        &self,
        tenant_id: TenantId,
        settings: &TimeBankSettings,
    ) -> StoreResult<TimeBankSettings>;

    // ---- adjustments ----

    /// Sum of approved deltas per employee with effective date inside `range`.
    async fn approved_adjustment_seconds(
        &self,
        tenant_id: TenantId,
        range: DateRange,
    ) -> StoreResult<HashMap<EmployeeId, i64>>;

    async fn list_adjustments(
        &self,
        tenant_id: TenantId,
        filter: &AdjustmentFilter,
    ) -> StoreResult<Vec<Adjustment>>;

    /// Insert a pending adjustment. Fails with `NotFound` for an unknown
    /// employee and `PeriodClosed` when the date is locked.
    async fn create_adjustment(
        &self,
        tenant_id: TenantId,
        adjustment: &NewAdjustment,
    ) -> StoreResult<Adjustment>;

    /// Move a pending adjustment to a terminal status. Fails with
    /// `InvalidTransition` when it is not pending and `PeriodClosed` when its
    /// date is locked.
    async fn decide_adjustment(
        &self,
        tenant_id: TenantId,
        adjustment_id: i64,
        decision: &AdjustmentDecision,
    ) -> StoreResult<Adjustment>;

    // ---- closures ----

    /// Ranges of every closure currently in `closed` status.
    async fn closed_periods(&self, tenant_id: TenantId) -> StoreResult<Vec<DateRange>>;

    /// Lock a period and replace its snapshot. Reuses the closure for the
    /// exact same range; fails with `Overlap` if another closed period
    /// intersects it.
    async fn close_period(
        &self,
        tenant_id: TenantId,
        close: &ClosePeriod,
    ) -> StoreResult<Closure>;

    async fn reopen_period(
        &self,
        tenant_id: TenantId,
        reopen: &ReopenPeriod,
    ) -> StoreResult<Closure>;

    async fn get_closure(
        &self,
        tenant_id: TenantId,
        closure_id: i64,
    ) -> StoreResult<Option<Closure>>;

    /// Closures newest `period_end` first.
    async fn list_closures(&self, tenant_id: TenantId, limit: i64) -> StoreResult<Vec<Closure>>;

    /// Snapshot rows ordered by employee name.
    async fn closure_items(
        &self,
        tenant_id: TenantId,
        closure_id: i64,
    ) -> StoreResult<Vec<ClosureItem>>;
}

/// Whether `day` falls inside any of `periods`.
pub fn is_closed(periods: &[DateRange], day: chrono::NaiveDate) -> bool {
    periods.iter().any(|p| p.contains(day))
}
