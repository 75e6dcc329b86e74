//! PostgreSQL [`TimeStore`].
//!
//! Raw SQLx queries. Closing and reopening a period take a per-tenant
//! transaction-scoped advisory lock in exclusive mode. Adjustment writes and
//! lock-respecting ledger upserts take the same lock in shared mode, so they
//! cannot interleave with a close of the range that covers them.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};

use super::{StoreError, StoreResult, TimeStore};
use crate::dates::{DateRange, days_before, start_of_day};
use crate::models::employee::{Employee, UnmappedEmployee};
use crate::models::ledger::{EntryFilter, LedgerEntry, NewLedgerEntry};
use crate::models::provider::{Connection, IdentityLink, IntegrationStats};
use crate::models::timebank::{
    Adjustment, AdjustmentDecision, AdjustmentFilter, AdjustmentStatus, ClosePeriod, Closure,
    ClosureItem, NewAdjustment, ReopenPeriod, TimeBankSettings,
};
use crate::models::{EmployeeId, TenantId};

const CONNECTION_COLUMNS: &str =
    "tenant_id, workspace_id, api_key, created_by, updated_by, created_at, updated_at";

const EMPLOYEE_COLUMNS: &str =
    "id, tenant_id, name, email, status, hire_date, termination_date";

const LINK_COLUMNS: &str = "tenant_id, employee_id, external_user_id, external_user_name, \
     external_user_email, last_synced_at";

const ENTRY_COLUMNS: &str = "id, tenant_id, employee_id, source, external_entry_id, \
     external_user_id, workspace_id, project_id, task_id, description, tag_ids, start_at, end_at, \
     duration_seconds, is_running, billable, synced_at, created_at, updated_at";

const ADJUSTMENT_SELECT: &str = r#"
    SELECT a.id, a.tenant_id, a.employee_id, COALESCE(e.name, '') AS employee_name,
           a.effective_date, a.seconds_delta, a.status, a.reason, a.review_note,
           a.created_by, a.reviewed_by, a.reviewed_at, a.created_at
    FROM time_bank_adjustments a
    LEFT JOIN employees e ON e.tenant_id = a.tenant_id AND e.id = a.employee_id
"#;

const CLOSURE_SELECT: &str = r#"
    SELECT c.id, c.tenant_id, c.period_start, c.period_end, c.status, c.note,
           c.closed_at, c.closed_by, c.reopened_at, c.reopened_by, c.created_at, c.updated_at,
           COUNT(i.employee_id) AS employees_count,
           COALESCE(SUM(i.worked_seconds), 0)::BIGINT AS total_worked_seconds,
           COALESCE(SUM(i.expected_seconds), 0)::BIGINT AS total_expected_seconds,
           COALESCE(SUM(i.adjustment_seconds), 0)::BIGINT AS total_adjustment_seconds,
           COALESCE(SUM(i.balance_seconds), 0)::BIGINT AS total_balance_seconds
    FROM time_bank_closures c
    LEFT JOIN time_bank_closure_items i ON i.closure_id = c.id
"#;

/// Store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Serialize time-bank writes of one tenant until the transaction ends.
async fn lock_tenant(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    shared: bool,
) -> Result<(), sqlx::Error> {
    let sql = if shared {
        "SELECT pg_advisory_xact_lock_shared(hashtextextended('time_bank', $1))"
    } else {
        "SELECT pg_advisory_xact_lock(hashtextextended('time_bank', $1))"
    };
    sqlx::query(sql).bind(tenant_id).execute(&mut **tx).await?;
    Ok(())
}

async fn date_is_closed<'e>(
    exec: impl PgExecutor<'e>,
    tenant_id: TenantId,
    day: NaiveDate,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM time_bank_closures
            WHERE tenant_id = $1 AND status = 'closed'
              AND $2 BETWEEN period_start AND period_end
        )
        "#,
    )
    .bind(tenant_id)
    .bind(day)
    .fetch_one(exec)
    .await
}

async fn fetch_adjustment<'e>(
    exec: impl PgExecutor<'e>,
    tenant_id: TenantId,
    adjustment_id: i64,
) -> Result<Option<Adjustment>, sqlx::Error> {
    sqlx::query_as::<_, Adjustment>(&format!(
        "{ADJUSTMENT_SELECT} WHERE a.tenant_id = $1 AND a.id = $2"
    ))
    .bind(tenant_id)
    .bind(adjustment_id)
    .fetch_optional(exec)
    .await
}

async fn fetch_closure<'e>(
    exec: impl PgExecutor<'e>,
    tenant_id: TenantId,
    closure_id: i64,
) -> Result<Option<Closure>, sqlx::Error> {
    sqlx::query_as::<_, Closure>(&format!(
        "{CLOSURE_SELECT} WHERE c.tenant_id = $1 AND c.id = $2 GROUP BY c.id"
    ))
    .bind(tenant_id)
    .bind(closure_id)
    .fetch_optional(exec)
    .await
}

#[async_trait]
impl TimeStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Connections
    // =========================================================================

    async fn get_connection(&self, tenant_id: TenantId) -> StoreResult<Option<Connection>> {
        let row = sqlx::query_as::<_, Connection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM provider_connections WHERE tenant_id = $1"
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_connection(
        &self,
        tenant_id: TenantId,
        workspace_id: &str,
        api_key: &str,
        actor: Option<&str>,
    ) -> StoreResult<Connection> {
        let row = sqlx::query_as::<_, Connection>(&format!(
            r#"
            INSERT INTO provider_connections (tenant_id, workspace_id, api_key, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (tenant_id) DO UPDATE SET
                workspace_id = EXCLUDED.workspace_id,
                api_key = EXCLUDED.api_key,
                updated_by = EXCLUDED.updated_by,
                updated_at = now()
            RETURNING {CONNECTION_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(workspace_id)
        .bind(api_key)
        .bind(actor)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_connections(&self) -> StoreResult<Vec<Connection>> {
        let rows = sqlx::query_as::<_, Connection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM provider_connections ORDER BY tenant_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Employees
    // =========================================================================

    async fn list_active_employees(&self, tenant_id: TenantId) -> StoreResult<Vec<Employee>> {
        let rows = sqlx::query_as::<_, Employee>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees \
             WHERE tenant_id = $1 AND status <> 'terminated' ORDER BY id"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_employee(
        &self,
        tenant_id: TenantId,
        employee_id: EmployeeId,
    ) -> StoreResult<Option<Employee>> {
        let row = sqlx::query_as::<_, Employee>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_employees_in_range(
        &self,
        tenant_id: TenantId,
        range: DateRange,
    ) -> StoreResult<Vec<Employee>> {
        let rows = sqlx::query_as::<_, Employee>(&format!(
            r#"
            SELECT {EMPLOYEE_COLUMNS} FROM employees
            WHERE tenant_id = $1
              AND (hire_date IS NULL OR hire_date <= $3)
              AND (termination_date IS NULL OR termination_date >= $2)
            ORDER BY name, id
            "#
        ))
        .bind(tenant_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Identity links
    // =========================================================================

    async fn list_links(&self, tenant_id: TenantId) -> StoreResult<Vec<IdentityLink>> {
        let rows = sqlx::query_as::<_, IdentityLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM provider_user_links WHERE tenant_id = $1 ORDER BY employee_id"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_link(&self, link: &IdentityLink) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_user_links (
                tenant_id, employee_id, external_user_id,
                external_user_name, external_user_email, last_synced_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id, external_user_id) DO UPDATE SET
                employee_id = EXCLUDED.employee_id,
                external_user_name = EXCLUDED.external_user_name,
                external_user_email = EXCLUDED.external_user_email,
                last_synced_at = EXCLUDED.last_synced_at,
                updated_at = now()
            "#,
        )
        .bind(link.tenant_id)
        .bind(link.employee_id)
        .bind(&link.external_user_id)
        .bind(&link.external_user_name)
        .bind(&link.external_user_email)
        .bind(link.last_synced_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_link(&self, link: &IdentityLink) -> StoreResult<IdentityLink> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            DELETE FROM provider_user_links
            WHERE tenant_id = $1 AND (employee_id = $2 OR external_user_id = $3)
            "#,
        )
        .bind(link.tenant_id)
        .bind(link.employee_id)
        .bind(&link.external_user_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, IdentityLink>(&format!(
            r#"
            INSERT INTO provider_user_links (
                tenant_id, employee_id, external_user_id,
                external_user_name, external_user_email, last_synced_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {LINK_COLUMNS}
            "#
        ))
        .bind(link.tenant_id)
        .bind(link.employee_id)
        .bind(&link.external_user_id)
        .bind(&link.external_user_name)
        .bind(&link.external_user_email)
        .bind(link.last_synced_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row)
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    async fn upsert_entry(&self, entry: &NewLedgerEntry, respect_closed: bool) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        if respect_closed {
            lock_tenant(&mut tx, entry.tenant_id, true).await?;
            let day = entry.start_at.date_naive();
            if date_is_closed(&mut *tx, entry.tenant_id, day).await? {
                return Err(StoreError::PeriodClosed(day));
            }
        }
        sqlx::query(
            r#"
            INSERT INTO time_entries (
                tenant_id, employee_id, source, external_entry_id, external_user_id, workspace_id,
                project_id, task_id, description, tag_ids, start_at, end_at,
                duration_seconds, is_running, billable, raw, synced_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (tenant_id, source, external_entry_id) DO UPDATE SET
                employee_id = EXCLUDED.employee_id,
                external_user_id = EXCLUDED.external_user_id,
                workspace_id = EXCLUDED.workspace_id,
                project_id = EXCLUDED.project_id,
                task_id = EXCLUDED.task_id,
                description = EXCLUDED.description,
                tag_ids = EXCLUDED.tag_ids,
                start_at = EXCLUDED.start_at,
                end_at = EXCLUDED.end_at,
                duration_seconds = EXCLUDED.duration_seconds,
                is_running = EXCLUDED.is_running,
                billable = EXCLUDED.billable,
                raw = EXCLUDED.raw,
                synced_at = EXCLUDED.synced_at,
                updated_at = now()
            "#,
        )
        .bind(entry.tenant_id)
        .bind(entry.employee_id)
        .bind(&entry.source)
        .bind(&entry.external_entry_id)
        .bind(&entry.external_user_id)
        .bind(&entry.workspace_id)
        .bind(&entry.project_id)
        .bind(&entry.task_id)
        .bind(&entry.description)
        .bind(&entry.tag_ids)
        .bind(entry.start_at)
        .bind(entry.end_at)
        .bind(entry.duration_seconds)
        .bind(entry.is_running)
        .bind(entry.billable)
        .bind(&entry.raw)
        .bind(entry.synced_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_entries(
        &self,
        tenant_id: TenantId,
        filter: &EntryFilter,
    ) -> StoreResult<Vec<LedgerEntry>> {
        let from = filter.start_date.map(start_of_day);
        let until = filter
            .end_date
            .map(|d| DateRange { start: d, end: d }.end_exclusive_at());
        let rows = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM time_entries
            WHERE tenant_id = $1
              AND ($2::BIGINT IS NULL OR employee_id = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR start_at >= $3)
              AND ($4::TIMESTAMPTZ IS NULL OR start_at < $4)
            ORDER BY start_at DESC, id DESC
            LIMIT $5
            "#
        ))
        .bind(tenant_id)
        .bind(filter.employee_id)
        .bind(from)
        .bind(until)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn worked_seconds(
        &self,
        tenant_id: TenantId,
        range: DateRange,
        now: DateTime<Utc>,
    ) -> StoreResult<HashMap<EmployeeId, i64>> {
        let rows = sqlx::query_as::<_, (EmployeeId, i64)>(
            r#"
            SELECT employee_id,
                   COALESCE(SUM(
                       CASE WHEN is_running
                            THEN GREATEST(EXTRACT(EPOCH FROM ($4::TIMESTAMPTZ - start_at)), 0)::BIGINT
                            ELSE duration_seconds
                       END
                   ), 0)::BIGINT AS worked_seconds
            FROM time_entries
            WHERE tenant_id = $1 AND employee_id IS NOT NULL
              AND start_at >= $2 AND start_at < $3
            GROUP BY employee_id
            "#,
        )
        .bind(tenant_id)
        .bind(range.start_at())
        .bind(range.end_exclusive_at())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn integration_stats(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
        preview_limit: i64,
    ) -> StoreResult<IntegrationStats> {
        type EntryAgg = (
            Option<DateTime<Utc>>,
            Option<DateTime<Utc>>,
            Option<DateTime<Utc>>,
            i64,
            i64,
            i64,
        );
        let (last_sync_at, last_entry_start_at, last_entry_end_at, total, recent, running) =
            sqlx::query_as::<_, EntryAgg>(
                r#"
                SELECT MAX(synced_at), MAX(start_at), MAX(end_at),
                       COUNT(*),
                       COUNT(*) FILTER (WHERE start_at >= $2),
                       COUNT(*) FILTER (WHERE is_running)
                FROM time_entries
                WHERE tenant_id = $1
                "#,
            )
            .bind(tenant_id)
            .bind(start_of_day(days_before(now.date_naive(), 7)))
            .fetch_one(&self.pool)
            .await?;

        let (active, mapped, unmapped) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM employees
                 WHERE tenant_id = $1 AND status <> 'terminated'),
                (SELECT COUNT(*) FROM provider_user_links WHERE tenant_id = $1),
                (SELECT COUNT(*) FROM employees e
                 LEFT JOIN provider_user_links l
                   ON l.tenant_id = e.tenant_id AND l.employee_id = e.id
                 WHERE e.tenant_id = $1 AND e.status <> 'terminated' AND l.employee_id IS NULL)
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        let preview = sqlx::query_as::<_, UnmappedEmployee>(
            r#"
            SELECT e.id AS employee_id, e.name, COALESCE(e.email, '') AS email
            FROM employees e
            LEFT JOIN provider_user_links l ON l.tenant_id = e.tenant_id AND l.employee_id = e.id
            WHERE e.tenant_id = $1 AND e.status <> 'terminated' AND l.employee_id IS NULL
            ORDER BY e.name ASC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(preview_limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(IntegrationStats {
            last_sync_at,
            last_entry_start_at,
            last_entry_end_at,
            entries_total: total,
            entries_last_7_days: recent,
            entries_running: running,
            active_employees: active,
            mapped_employees: mapped,
            active_unmapped_employees: unmapped,
            unmapped_employees_preview: preview,
        })
    }

    // =========================================================================
    // Settings
    // =========================================================================

    async fn get_settings(&self, tenant_id: TenantId) -> StoreResult<TimeBankSettings> {
        let row = sqlx::query_as::<_, TimeBankSettings>(
            "SELECT target_daily_minutes, include_saturday, updated_at \
             FROM time_bank_settings WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.unwrap_or_default())
    }

    async fn save_settings(
        &self,
        tenant_id: TenantId,
        settings: &TimeBankSettings,
    ) -> StoreResult<TimeBankSettings> {
        let row = sqlx::query_as::<_, TimeBankSettings>(
            r#"
            INSERT INTO time_bank_settings (tenant_id, target_daily_minutes, include_saturday)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id) DO UPDATE SET
                target_daily_minutes = EXCLUDED.target_daily_minutes,
                include_saturday = EXCLUDED.include_saturday,
                updated_at = now()
            RETURNING target_daily_minutes, include_saturday, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(settings.target_daily_minutes)
        .bind(settings.include_saturday)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    // =========================================================================
    // Adjustments
    // =========================================================================

    async fn approved_adjustment_seconds(
        &self,
        tenant_id: TenantId,
        range: DateRange,
    ) -> StoreResult<HashMap<EmployeeId, i64>> {
        let rows = sqlx::query_as::<_, (EmployeeId, i64)>(
            r#"
            SELECT employee_id, COALESCE(SUM(seconds_delta), 0)::BIGINT
            FROM time_bank_adjustments
            WHERE tenant_id = $1 AND status = 'approved'
              AND effective_date BETWEEN $2 AND $3
            GROUP BY employee_id
            "#,
        )
        .bind(tenant_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn list_adjustments(
        &self,
        tenant_id: TenantId,
        filter: &AdjustmentFilter,
    ) -> StoreResult<Vec<Adjustment>> {
        let rows = sqlx::query_as::<_, Adjustment>(&format!(
            r#"
            {ADJUSTMENT_SELECT}
            WHERE a.tenant_id = $1
              AND a.effective_date BETWEEN $2 AND $3
              AND ($4::BIGINT IS NULL OR a.employee_id = $4)
              AND ($5::time_bank_adjustment_status IS NULL OR a.status = $5)
            ORDER BY a.effective_date DESC, a.id DESC
            LIMIT $6
            "#
        ))
        .bind(tenant_id)
        .bind(filter.range.start)
        .bind(filter.range.end)
        .bind(filter.employee_id)
        .bind(filter.status)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_adjustment(
        &self,
        tenant_id: TenantId,
        adjustment: &NewAdjustment,
    ) -> StoreResult<Adjustment> {
        let mut tx = self.pool.begin().await?;
        lock_tenant(&mut tx, tenant_id, true).await?;

        if date_is_closed(&mut *tx, tenant_id, adjustment.effective_date).await? {
            return Err(StoreError::PeriodClosed(adjustment.effective_date));
        }
        let employee_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM employees WHERE tenant_id = $1 AND id = $2)",
        )
        .bind(tenant_id)
        .bind(adjustment.employee_id)
        .fetch_one(&mut *tx)
        .await?;
        if !employee_exists {
            return Err(StoreError::NotFound("employee".into()));
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO time_bank_adjustments (
                tenant_id, employee_id, effective_date, seconds_delta, status, reason, created_by
            ) VALUES ($1, $2, $3, $4, 'pending', $5, $6)
            RETURNING id
            "#,
        )
        .bind(tenant_id)
        .bind(adjustment.employee_id)
        .bind(adjustment.effective_date)
        .bind(adjustment.seconds_delta)
        .bind(&adjustment.reason)
        .bind(&adjustment.created_by)
        .fetch_one(&mut *tx)
        .await?;

        let created = fetch_adjustment(&mut *tx, tenant_id, id)
            .await?
            .ok_or_else(|| StoreError::NotFound("adjustment".into()))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn decide_adjustment(
        &self,
        tenant_id: TenantId,
        adjustment_id: i64,
        decision: &AdjustmentDecision,
    ) -> StoreResult<Adjustment> {
        let mut tx = self.pool.begin().await?;
        lock_tenant(&mut tx, tenant_id, true).await?;

        let (status, effective_date) = sqlx::query_as::<_, (AdjustmentStatus, NaiveDate)>(
            r#"
            SELECT status, effective_date FROM time_bank_adjustments
            WHERE tenant_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(adjustment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound("adjustment".into()))?;

        if status != AdjustmentStatus::Pending {
            return Err(StoreError::InvalidTransition);
        }
        if date_is_closed(&mut *tx, tenant_id, effective_date).await? {
            return Err(StoreError::PeriodClosed(effective_date));
        }

        sqlx::query(
            r#"
            UPDATE time_bank_adjustments
            SET status = $3, review_note = $4, reviewed_by = $5,
                reviewed_at = now(), updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(adjustment_id)
        .bind(decision.status)
        .bind(&decision.note)
        .bind(&decision.reviewed_by)
        .execute(&mut *tx)
        .await?;

        let decided = fetch_adjustment(&mut *tx, tenant_id, adjustment_id)
            .await?
            .ok_or_else(|| StoreError::NotFound("adjustment".into()))?;
        tx.commit().await?;
        Ok(decided)
    }

    // =========================================================================
    // Closures
    // =========================================================================

    async fn closed_periods(&self, tenant_id: TenantId) -> StoreResult<Vec<DateRange>> {
        let rows = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
            r#"
            SELECT period_start, period_end FROM time_bank_closures
            WHERE tenant_id = $1 AND status = 'closed'
            ORDER BY period_start
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(start, end)| DateRange { start, end })
            .collect())
    }

    async fn close_period(
        &self,
        tenant_id: TenantId,
        close: &ClosePeriod,
    ) -> StoreResult<Closure> {
        let range = close.range;
        let mut tx = self.pool.begin().await?;
        lock_tenant(&mut tx, tenant_id, false).await?;

        let existing = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM time_bank_closures
            WHERE tenant_id = $1 AND period_start = $2 AND period_end = $3
            "#,
        )
        .bind(tenant_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_optional(&mut *tx)
        .await?;

        let conflict = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
            r#"
            SELECT period_start, period_end FROM time_bank_closures
            WHERE tenant_id = $1 AND status = 'closed'
              AND ($4::BIGINT IS NULL OR id <> $4)
              AND NOT (period_end < $2 OR period_start > $3)
            ORDER BY period_start
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(range.start)
        .bind(range.end)
        .bind(existing)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some((start, end)) = conflict {
            return Err(StoreError::Overlap(DateRange { start, end }));
        }

        let closure_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO time_bank_closures (
                tenant_id, period_start, period_end, status, note, closed_by, closed_at
            ) VALUES ($1, $2, $3, 'closed', $4, $5, now())
            ON CONFLICT (tenant_id, period_start, period_end) DO UPDATE SET
                status = 'closed',
                note = EXCLUDED.note,
                closed_by = EXCLUDED.closed_by,
                closed_at = EXCLUDED.closed_at,
                reopened_by = NULL,
                reopened_at = NULL,
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(tenant_id)
        .bind(range.start)
        .bind(range.end)
        .bind(&close.note)
        .bind(&close.closed_by)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM time_bank_closure_items WHERE closure_id = $1")
            .bind(closure_id)
            .execute(&mut *tx)
            .await?;

        for item in &close.items {
            sqlx::query(
                r#"
                INSERT INTO time_bank_closure_items (
                    closure_id, employee_id, employee_name, worked_seconds,
                    expected_seconds, adjustment_seconds, balance_seconds
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(closure_id)
            .bind(item.employee_id)
            .bind(&item.employee_name)
            .bind(item.worked_seconds)
            .bind(item.expected_seconds)
            .bind(item.adjustment_seconds)
            .bind(item.balance_seconds)
            .execute(&mut *tx)
            .await?;
        }

        let closure = fetch_closure(&mut *tx, tenant_id, closure_id)
            .await?
            .ok_or_else(|| StoreError::NotFound("closure".into()))?;
        tx.commit().await?;
        Ok(closure)
    }

    async fn reopen_period(
        &self,
        tenant_id: TenantId,
        reopen: &ReopenPeriod,
    ) -> StoreResult<Closure> {
        let mut tx = self.pool.begin().await?;
        lock_tenant(&mut tx, tenant_id, false).await?;

        let updated = sqlx::query(
            r#"
            UPDATE time_bank_closures
            SET status = 'reopened',
                note = COALESCE($3, note),
                reopened_by = $4,
                reopened_at = now(),
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(reopen.closure_id)
        .bind(&reopen.note)
        .bind(&reopen.reopened_by)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound("closure".into()));
        }

        let closure = fetch_closure(&mut *tx, tenant_id, reopen.closure_id)
            .await?
            .ok_or_else(|| StoreError::NotFound("closure".into()))?;
        tx.commit().await?;
        Ok(closure)
    }

    async fn get_closure(
        &self,
        tenant_id: TenantId,
        closure_id: i64,
    ) -> StoreResult<Option<Closure>> {
        Ok(fetch_closure(&self.pool, tenant_id, closure_id).await?)
    }

    async fn list_closures(&self, tenant_id: TenantId, limit: i64) -> StoreResult<Vec<Closure>> {
        let rows = sqlx::query_as::<_, Closure>(&format!(
            r#"
            {CLOSURE_SELECT}
            WHERE c.tenant_id = $1
            GROUP BY c.id
            ORDER BY c.period_end DESC, c.id DESC
            LIMIT $2
            "#
        ))
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn closure_items(
        &self,
        tenant_id: TenantId,
        closure_id: i64,
    ) -> StoreResult<Vec<ClosureItem>> {
        if fetch_closure(&self.pool, tenant_id, closure_id).await?.is_none() {
            return Err(StoreError::NotFound("closure".into()));
        }
        let rows = sqlx::query_as::<_, ClosureItem>(
            r#"
            SELECT employee_id, employee_name, worked_seconds, expected_seconds,
                   adjustment_seconds, balance_seconds
            FROM time_bank_closure_items
            WHERE closure_id = $1
            ORDER BY employee_name, employee_id
            "#,
        )
        .bind(closure_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
