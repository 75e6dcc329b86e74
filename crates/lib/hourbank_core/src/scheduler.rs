//! Daily background sync of every configured tenant.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::dates::{DateRange, days_before};
use crate::ingest::{SyncRequest, sync_configured_tenant};
use crate::models::TenantId;
use crate::provider::ProviderConnector;
use crate::store::TimeStore;

pub const DEFAULT_SYNC_HOUR_UTC: u32 = 3;
pub const DEFAULT_LOOKBACK_DAYS: u64 = 1;

/// Auto-sync settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub hour_utc: u32,
    pub lookback_days: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hour_utc: DEFAULT_SYNC_HOUR_UTC,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

impl SchedulerConfig {
    /// Build from raw values; an hour outside `0..=23` falls back to the
    /// default and the lookback is at least one day.
    pub fn new(enabled: bool, hour_utc: i64, lookback_days: i64) -> Self {
        let hour_utc = u32::try_from(hour_utc)
            .ok()
            .filter(|h| *h <= 23)
            .unwrap_or(DEFAULT_SYNC_HOUR_UTC);
        let lookback_days = u64::try_from(lookback_days).unwrap_or(0).max(1);
        Self {
            enabled,
            hour_utc,
            lookback_days,
        }
    }
}

/// Next occurrence of `hour_utc:00`, strictly after `now`.
pub fn next_run_at(now: DateTime<Utc>, hour_utc: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour_utc.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(time));
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Outcome of one pass over all tenants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoSyncReport {
    pub synced: Vec<TenantId>,
    pub failed: Vec<TenantId>,
}

/// Sync every configured tenant over `[today - lookback, today]`.
///
/// A failing tenant is logged and skipped; the pass continues.
pub async fn run_auto_sync(
    store: &dyn TimeStore,
    connector: &dyn ProviderConnector,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> AutoSyncReport {
    let mut report = AutoSyncReport::default();
    let connections = match store.list_connections().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "auto-sync: failed to list provider connections");
            return report;
        }
    };

    let today = now.date_naive();
    let range = DateRange {
        start: days_before(today, config.lookback_days),
        end: today,
    };

    for connection in connections {
        if cancel.is_cancelled() {
            break;
        }
        let request = SyncRequest {
            tenant_id: connection.tenant_id,
            range,
            allow_closed_period: false,
        };
        match sync_configured_tenant(store, connector, &request, cancel).await {
            Ok(summary) => {
                info!(
                    tenant_id = connection.tenant_id,
                    entries_upserted = summary.entries_upserted,
                    entries_skipped_closed = summary.entries_skipped_closed,
                    "auto-sync: tenant synced"
                );
                report.synced.push(connection.tenant_id);
            }
            Err(e) => {
                warn!(tenant_id = connection.tenant_id, error = %e, "auto-sync: tenant failed");
                report.failed.push(connection.tenant_id);
            }
        }
    }
    report
}

/// Run a pass now, then once a day at the configured hour until cancelled.
pub async fn run_scheduler(
    store: Arc<dyn TimeStore>,
    connector: Arc<dyn ProviderConnector>,
    config: SchedulerConfig,
    cancel: CancellationToken,
) {
    if !config.enabled {
        info!("auto-sync disabled");
        return;
    }
    info!(
        hour_utc = config.hour_utc,
        lookback_days = config.lookback_days,
        "auto-sync enabled"
    );

    loop {
        run_auto_sync(store.as_ref(), connector.as_ref(), &config, Utc::now(), &cancel).await;

        let now = Utc::now();
        let next = next_run_at(now, config.hour_utc);
        info!(next_run_utc = %next.to_rfc3339(), "auto-sync: next run scheduled");
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("auto-sync stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }
}
