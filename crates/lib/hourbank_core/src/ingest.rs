//! Entry ingestion: one sync pass per tenant.
//!
//! Users are resolved through [`crate::identity`], then each mapped user's
//! entries for `[start 00:00Z, end+1 00:00Z)` are normalized and upserted by
//! `(tenant, source, external_entry_id)`. Entries that start inside a closed
//! period are skipped unless the caller explicitly overrides the lock.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dates::DateRange;
use crate::identity::resolve_links;
use crate::models::ledger::{NewLedgerEntry, SOURCE_CLOCKIFY};
use crate::models::provider::Connection;
use crate::models::{EmployeeId, TenantId};
use crate::provider::{ExternalEntry, ExternalUser, ProviderConnector, ProviderError, TimeProvider};
use crate::store::{StoreError, TimeStore, is_closed};

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("valid duration pattern")
});

/// Errors from a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("time provider is not configured")]
    NotConfigured,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parameters of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub tenant_id: TenantId,
    pub range: DateRange,
    pub allow_closed_period: bool,
}

/// Counters reported after a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub employees_total: usize,
    pub users_found: usize,
    pub employees_mapped: usize,
    pub entries_processed: usize,
    pub entries_upserted: usize,
    pub entries_skipped_closed: usize,
    pub running_entries: usize,
    pub synced_at: DateTime<Utc>,
}

/// Load the tenant's connection and run a pass against it.
pub async fn sync_configured_tenant(
    store: &dyn TimeStore,
    connector: &dyn ProviderConnector,
    request: &SyncRequest,
    cancel: &CancellationToken,
) -> Result<SyncSummary, SyncError> {
    let connection = store
        .get_connection(request.tenant_id)
        .await?
        .ok_or(SyncError::NotConfigured)?;
    let provider = connector.connect(&connection.api_key)?;
    sync_tenant(store, provider.as_ref(), &connection, request, cancel).await
}

/// Check a credential by listing the workspace's users.
pub async fn verify_credentials(
    connector: &dyn ProviderConnector,
    workspace_id: &str,
    api_key: &str,
    cancel: &CancellationToken,
) -> Result<Vec<ExternalUser>, ProviderError> {
    connector
        .connect(api_key)?
        .list_users(workspace_id, cancel)
        .await
}

/// Run one sync pass for a tenant.
///
/// Partial progress stays in place if the pass fails or is cancelled midway.
pub async fn sync_tenant(
    store: &dyn TimeStore,
    provider: &dyn TimeProvider,
    connection: &Connection,
    request: &SyncRequest,
    cancel: &CancellationToken,
) -> Result<SyncSummary, SyncError> {
    let tenant_id = request.tenant_id;
    let workspace_id = connection.workspace_id.as_str();

    let users = provider.list_users(workspace_id, cancel).await?;
    let employees = store.list_active_employees(tenant_id).await?;
    let existing = store.list_links(tenant_id).await?;

    let now = Utc::now();
    let resolved = resolve_links(tenant_id, &users, &employees, &existing, now);
    for r in &resolved {
        store.upsert_link(&r.link).await?;
    }

    let mut summary = SyncSummary {
        range_start: request.range.start,
        range_end: request.range.end,
        employees_total: employees.len(),
        users_found: users.len(),
        employees_mapped: resolved.len(),
        entries_processed: 0,
        entries_upserted: 0,
        entries_skipped_closed: 0,
        running_entries: 0,
        synced_at: now,
    };

    let (from, until) = (request.range.start_at(), request.range.end_exclusive_at());
    for r in &resolved {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled.into());
        }
        // Closures may change while a pass runs, so reload per user.
        let closed = if request.allow_closed_period {
            Vec::new()
        } else {
            store.closed_periods(tenant_id).await?
        };

        let entries = provider
            .list_entries(workspace_id, &r.link.external_user_id, from, until, cancel)
            .await?;
        debug!(
            tenant_id,
            employee_id = r.link.employee_id,
            entries = entries.len(),
            "fetched provider entries"
        );

        for entry in entries {
            summary.entries_processed += 1;
            let target = EntryTarget {
                tenant_id,
                employee_id: r.link.employee_id,
                external_user_id: &r.link.external_user_id,
                workspace_id,
            };
            match normalize_entry(&target, entry, &closed, Utc::now()) {
                EntryOutcome::Invalid => {}
                EntryOutcome::Closed => summary.entries_skipped_closed += 1,
                EntryOutcome::Ready(row) => {
                    match store.upsert_entry(&row, !request.allow_closed_period).await {
                        Ok(()) => {}
                        // Closed after this user's periods were loaded.
                        Err(StoreError::PeriodClosed(_)) => {
                            summary.entries_skipped_closed += 1;
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    }
                    if row.is_running {
                        summary.running_entries += 1;
                    }
                    summary.entries_upserted += 1;
                }
            }
        }
    }

    info!(
        tenant_id,
        range = %request.range,
        users_found = summary.users_found,
        employees_mapped = summary.employees_mapped,
        entries_upserted = summary.entries_upserted,
        entries_skipped_closed = summary.entries_skipped_closed,
        "provider sync finished"
    );
    Ok(summary)
}

/// Ownership of the entries being normalized.
struct EntryTarget<'a> {
    tenant_id: TenantId,
    employee_id: EmployeeId,
    external_user_id: &'a str,
    workspace_id: &'a str,
}

enum EntryOutcome {
    /// Missing id or unparsable timestamps.
    Invalid,
    /// Starts inside a closed period.
    Closed,
    Ready(Box<NewLedgerEntry>),
}

fn normalize_entry(
    target: &EntryTarget<'_>,
    entry: ExternalEntry,
    closed: &[DateRange],
    now: DateTime<Utc>,
) -> EntryOutcome {
    let external_entry_id = entry.id.trim();
    if external_entry_id.is_empty() {
        return EntryOutcome::Invalid;
    }
    let Some(start_at) = parse_timestamp(&entry.time_interval.start) else {
        return EntryOutcome::Invalid;
    };
    if is_closed(closed, start_at.date_naive()) {
        return EntryOutcome::Closed;
    }
    let end_at = match entry.time_interval.end.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match parse_timestamp(raw) {
            Some(end) => Some(end),
            None => return EntryOutcome::Invalid,
        },
    };

    let duration_seconds = entry_duration_seconds(
        start_at,
        end_at,
        entry.time_interval.duration.as_deref(),
        now,
    );

    EntryOutcome::Ready(Box::new(NewLedgerEntry {
        tenant_id: target.tenant_id,
        employee_id: Some(target.employee_id),
        source: SOURCE_CLOCKIFY.to_string(),
        external_entry_id: external_entry_id.to_string(),
        external_user_id: target.external_user_id.to_string(),
        workspace_id: target.workspace_id.to_string(),
        project_id: non_blank(entry.project_id),
        task_id: non_blank(entry.task_id),
        description: non_blank(entry.description),
        tag_ids: serde_json::Value::from(entry.tag_ids),
        start_at,
        end_at,
        duration_seconds,
        is_running: end_at.is_none(),
        billable: entry.billable,
        raw: entry.raw,
        synced_at: now,
    }))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Duration of an entry in seconds.
///
/// A known end wins; otherwise a positive ISO-8601 duration; otherwise the
/// entry is running and counts up to `now`. Never negative.
pub fn entry_duration_seconds(
    start_at: DateTime<Utc>,
    end_at: Option<DateTime<Utc>>,
    iso_duration: Option<&str>,
    now: DateTime<Utc>,
) -> i64 {
    if let Some(end_at) = end_at {
        return (end_at - start_at).num_seconds().max(0);
    }
    let declared = iso_duration.map_or(0, parse_iso_duration_seconds);
    if declared > 0 {
        return declared;
    }
    (now - start_at).num_seconds().max(0)
}

/// Seconds in a `PT#H#M#S` duration; `0` when the value does not match.
pub fn parse_iso_duration_seconds(raw: &str) -> i64 {
    let Some(caps) = ISO_DURATION.captures(raw.trim()) else {
        return 0;
    };
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(0)
    };
    part(1)
        .saturating_mul(3600)
        .saturating_add(part(2).saturating_mul(60))
        .saturating_add(part(3))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parses_iso_durations() {
        assert_eq!(parse_iso_duration_seconds("PT1H30M"), 5400);
        assert_eq!(parse_iso_duration_seconds("PT45S"), 45);
        assert_eq!(parse_iso_duration_seconds("PT2H0M5S"), 7205);
        assert_eq!(parse_iso_duration_seconds(" PT8H "), 28800);
        assert_eq!(parse_iso_duration_seconds("PT"), 0);
        assert_eq!(parse_iso_duration_seconds("P1D"), 0);
        assert_eq!(parse_iso_duration_seconds("1h"), 0);
        assert_eq!(parse_iso_duration_seconds(""), 0);
    }

    #[test]
    fn duration_prefers_end_then_declared_then_now() {
        let start = at("2026-02-09T08:00:00Z");
        let now = at("2026-02-09T09:00:00Z");

        assert_eq!(
            entry_duration_seconds(start, Some(at("2026-02-09T10:00:00Z")), Some("PT1M"), now),
            7200
        );
        assert_eq!(entry_duration_seconds(start, None, Some("PT30M"), now), 1800);
        assert_eq!(entry_duration_seconds(start, None, Some("PT0S"), now), 3600);
        assert_eq!(entry_duration_seconds(start, None, None, now), 3600);
    }

    #[test]
    fn duration_is_never_negative() {
        let start = at("2026-02-09T08:00:00Z");
        assert_eq!(
            entry_duration_seconds(start, Some(at("2026-02-09T07:00:00Z")), None, start),
            0
        );
        assert_eq!(entry_duration_seconds(start, None, None, at("2026-02-09T07:00:00Z")), 0);
    }

    fn entry(id: &str, start: &str, end: Option<&str>) -> ExternalEntry {
        ExternalEntry {
            id: id.into(),
            description: Some("  ".into()),
            tag_ids: vec!["t1".into()],
            time_interval: crate::provider::TimeInterval {
                start: start.into(),
                end: end.map(str::to_string),
                duration: None,
            },
            ..Default::default()
        }
    }

    fn target() -> EntryTarget<'static> {
        EntryTarget {
            tenant_id: 1,
            employee_id: 7,
            external_user_id: "u1",
            workspace_id: "ws1",
        }
    }

    #[test]
    fn normalizes_finished_entry() {
        let outcome = normalize_entry(
            &target(),
            entry("e1", "2026-02-09T08:00:00Z", Some("2026-02-09T16:00:00Z")),
            &[],
            at("2026-02-10T00:00:00Z"),
        );
        let EntryOutcome::Ready(row) = outcome else {
            panic!("expected a ready row");
        };
        assert_eq!(row.duration_seconds, 8 * 3600);
        assert!(!row.is_running);
        assert_eq!(row.description, None);
        assert_eq!(row.tag_ids, serde_json::json!(["t1"]));
        assert_eq!(row.source, SOURCE_CLOCKIFY);
    }

    #[test]
    fn skips_invalid_and_closed_entries() {
        let closed = [DateRange::new(
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
        )
        .unwrap()];
        let now = at("2026-02-10T00:00:00Z");

        assert!(matches!(
            normalize_entry(&target(), entry(" ", "2026-02-10T08:00:00Z", None), &[], now),
            EntryOutcome::Invalid
        ));
        assert!(matches!(
            normalize_entry(&target(), entry("e1", "yesterday", None), &[], now),
            EntryOutcome::Invalid
        ));
        assert!(matches!(
            normalize_entry(&target(), entry("e1", "2026-02-10T08:00:00Z", Some("later")), &[], now),
            EntryOutcome::Invalid
        ));
        assert!(matches!(
            normalize_entry(&target(), entry("e1", "2026-02-09T23:00:00Z", None), &closed, now),
            EntryOutcome::Closed
        ));
    }

    #[test]
    fn missing_end_marks_running() {
        let outcome = normalize_entry(
            &target(),
            entry("e1", "2026-02-09T08:00:00Z", None),
            &[],
            at("2026-02-09T08:30:00Z"),
        );
        let EntryOutcome::Ready(row) = outcome else {
            panic!("expected a ready row");
        };
        assert!(row.is_running);
        assert_eq!(row.duration_seconds, 1800);
    }
}
