//! Period closures: lock a date range and freeze per-employee totals.

use chrono::{DateTime, Utc};
use tracing::info;

use super::summary::build_summary;
use super::{TimeBankError, TimeBankResult, normalize_note};
use crate::dates::DateRange;
use crate::models::TenantId;
use crate::models::timebank::{ClosePeriod, Closure, ClosureItem, ReopenPeriod};
use crate::store::{StoreError, TimeStore};

/// Close `range`, snapshotting the current summary.
pub async fn close_period(
    store: &dyn TimeStore,
    tenant_id: TenantId,
    range: DateRange,
    note: Option<&str>,
    closed_by: Option<&str>,
    now: DateTime<Utc>,
) -> TimeBankResult<Closure> {
    let summary = build_summary(store, tenant_id, range, now).await?;
    let close = ClosePeriod {
        range,
        note: normalize_note(note),
        closed_by: closed_by.map(str::to_string),
        items: summary.closure_items(),
    };
    let closure = store.close_period(tenant_id, &close).await?;
    info!(
        tenant_id,
        closure_id = closure.id,
        period = %range,
        employees = closure.employees_count,
        "time-bank period closed"
    );
    Ok(closure)
}

/// Reopen a closure. Its snapshot is kept.
pub async fn reopen_period(
    store: &dyn TimeStore,
    tenant_id: TenantId,
    closure_id: i64,
    note: Option<&str>,
    reopened_by: Option<&str>,
) -> TimeBankResult<Closure> {
    let reopen = ReopenPeriod {
        closure_id,
        note: normalize_note(note),
        reopened_by: reopened_by.map(str::to_string),
    };
    let closure = store.reopen_period(tenant_id, &reopen).await?;
    info!(tenant_id, closure_id, "time-bank period reopened");
    Ok(closure)
}

pub async fn list_closures(
    store: &dyn TimeStore,
    tenant_id: TenantId,
    limit: i64,
) -> TimeBankResult<Vec<Closure>> {
    Ok(store.list_closures(tenant_id, limit).await?)
}

/// Snapshot rows of an existing closure.
pub async fn closure_items(
    store: &dyn TimeStore,
    tenant_id: TenantId,
    closure_id: i64,
) -> TimeBankResult<(Closure, Vec<ClosureItem>)> {
    let closure = store
        .get_closure(tenant_id, closure_id)
        .await?
        .ok_or_else(|| StoreError::NotFound("closure".into()))?;
    let items = store.closure_items(tenant_id, closure_id).await?;
    Ok((closure, items))
}

/// Render a snapshot as CSV.
pub fn closure_csv(items: &[ClosureItem]) -> TimeBankResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let encode = |e: csv::Error| TimeBankError::Validation(format!("csv encoding failed: {e}"));

    writer
        .write_record([
            "employee_id",
            "name",
            "worked_seconds",
            "expected_seconds",
            "adjustment_seconds",
            "balance_seconds",
        ])
        .map_err(encode)?;
    for item in items {
        writer
            .write_record([
                item.employee_id.to_string(),
                item.employee_name.clone(),
                item.worked_seconds.to_string(),
                item.expected_seconds.to_string(),
                item.adjustment_seconds.to_string(),
                item.balance_seconds.to_string(),
            ])
            .map_err(encode)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| TimeBankError::Validation(format!("csv encoding failed: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| TimeBankError::Validation(format!("csv encoding failed: {e}")))
}

/// CSV export of a closure snapshot; the closure is returned for naming.
pub async fn export_closure_csv(
    store: &dyn TimeStore,
    tenant_id: TenantId,
    closure_id: i64,
) -> TimeBankResult<(Closure, String)> {
    let (closure, items) = closure_items(store, tenant_id, closure_id).await?;
    let body = closure_csv(&items)?;
    Ok((closure, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::employee::Employee;
    use crate::models::timebank::ClosureStatus;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(day(start), day(end)).unwrap()
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_employee(Employee {
                id: 1,
                tenant_id: 1,
                name: "Ana, Jr.".into(),
                email: None,
                status: "active".into(),
                hire_date: None,
                termination_date: None,
            })
            .await;
        store
    }

    #[tokio::test]
    async fn overlapping_close_conflicts_until_reopened() {
        let store = store().await;
        let now = Utc::now();
        let first = close_period(&store, 1, range("2026-02-10", "2026-02-20"), None, None, now)
            .await
            .unwrap();

        for (start, end) in [("2026-02-01", "2026-02-15"), ("2026-02-16", "2026-02-28")] {
            let err = close_period(&store, 1, range(start, end), None, None, now)
                .await
                .unwrap_err();
            assert!(matches!(err, TimeBankError::Store(StoreError::Overlap(_))));
        }

        close_period(&store, 1, range("2026-02-21", "2026-02-28"), None, None, now)
            .await
            .unwrap();

        let reopened = reopen_period(&store, 1, first.id, Some("late entries"), Some("hr-1"))
            .await
            .unwrap();
        assert_eq!(reopened.status, ClosureStatus::Reopened);
        assert_eq!(reopened.reopened_by.as_deref(), Some("hr-1"));

        close_period(&store, 1, range("2026-02-01", "2026-02-15"), None, None, now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn snapshot_is_kept_after_reopen() {
        let store = store().await;
        let closure = close_period(
            &store,
            1,
            range("2026-02-09", "2026-02-13"),
            Some(" payroll "),
            None,
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(closure.note.as_deref(), Some("payroll"));
        assert_eq!(closure.employees_count, 1);
        assert_eq!(closure.total_expected_seconds, 144_000);

        reopen_period(&store, 1, closure.id, None, None).await.unwrap();

        let (_, items) = closure_items(&store, 1, closure.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].balance_seconds, -144_000);
    }

    #[tokio::test]
    async fn unknown_closure_is_not_found() {
        let store = store().await;
        let err = reopen_period(&store, 1, 42, None, None).await.unwrap_err();
        assert!(matches!(err, TimeBankError::Store(StoreError::NotFound(_))));
        let err = export_closure_csv(&store, 1, 42).await.unwrap_err();
        assert!(matches!(err, TimeBankError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn csv_export_quotes_names() {
        let store = store().await;
        let closure = close_period(
            &store,
            1,
            range("2026-02-09", "2026-02-09"),
            None,
            None,
            Utc::now(),
        )
        .await
        .unwrap();

        let (_, body) = export_closure_csv(&store, 1, closure.id).await.unwrap();
        let mut lines = body.lines();
        assert_eq!(
            lines.next(),
            Some("employee_id,name,worked_seconds,expected_seconds,adjustment_seconds,balance_seconds")
        );
        assert_eq!(lines.next(), Some("1,\"Ana, Jr.\",0,28800,0,-28800"));
        assert_eq!(lines.next(), None);
    }
}
