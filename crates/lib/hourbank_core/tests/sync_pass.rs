//! End-to-end sync passes against the in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;

use hourbank_core::dates::DateRange;
use hourbank_core::ingest::{SyncError, SyncRequest, sync_configured_tenant};
use hourbank_core::models::employee::Employee;
use hourbank_core::models::ledger::EntryFilter;
use hourbank_core::models::timebank::ClosePeriod;
use hourbank_core::provider::{
    ExternalEntry, ExternalUser, ProviderConnector, ProviderError, TimeInterval, TimeProvider,
};
use hourbank_core::scheduler::{SchedulerConfig, run_auto_sync};
use hourbank_core::store::{MemoryStore, TimeStore};

const TENANT: i64 = 1;

#[derive(Default)]
struct FakeProvider {
    users: Vec<ExternalUser>,
    entries: Vec<(String, ExternalEntry)>,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl TimeProvider for FakeProvider {
    async fn list_users(
        &self,
        _workspace_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ExternalUser>, ProviderError> {
        Ok(self.users.clone())
    }

    async fn list_entries(
        &self,
        _workspace_id: &str,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ExternalEntry>, ProviderError> {
        self.calls.lock().unwrap().push(user_id.to_string());
        Ok(self
            .entries
            .iter()
            .filter(|(owner, _)| owner == user_id)
            .filter(|(_, e)| {
                let at = DateTime::parse_from_rfc3339(&e.time_interval.start).unwrap();
                at >= start && at < end
            })
            .map(|(_, e)| e.clone())
            .collect())
    }
}

struct FakeConnector(Arc<FakeProvider>);

impl ProviderConnector for FakeConnector {
    fn connect(&self, _api_key: &str) -> Result<Arc<dyn TimeProvider>, ProviderError> {
        Ok(self.0.clone())
    }
}

/// Rejects one api key with a 401, serves everything else.
struct KeyedConnector {
    provider: Arc<FakeProvider>,
    rejected_key: &'static str,
}

impl ProviderConnector for KeyedConnector {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn TimeProvider>, ProviderError> {
        if api_key == self.rejected_key {
            return Err(ProviderError::Status {
                status: 401,
                message: "invalid api key".into(),
            });
        }
        Ok(self.provider.clone())
    }
}

/// Closes a period on the store while entries are being fetched.
struct ClosingProvider {
    inner: FakeProvider,
    store: Arc<MemoryStore>,
    closing: DateRange,
}

#[async_trait]
impl TimeProvider for ClosingProvider {
    async fn list_users(
        &self,
        workspace_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExternalUser>, ProviderError> {
        self.inner.list_users(workspace_id, cancel).await
    }

    async fn list_entries(
        &self,
        workspace_id: &str,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExternalEntry>, ProviderError> {
        self.store
            .close_period(
                TENANT,
                &ClosePeriod {
                    range: self.closing,
                    note: None,
                    closed_by: None,
                    items: Vec::new(),
                },
            )
            .await
            .unwrap();
        self.inner
            .list_entries(workspace_id, user_id, start, end, cancel)
            .await
    }
}

struct ClosingConnector(Arc<ClosingProvider>);

impl ProviderConnector for ClosingConnector {
    fn connect(&self, _api_key: &str) -> Result<Arc<dyn TimeProvider>, ProviderError> {
        Ok(self.0.clone())
    }
}

fn ana(tenant_id: i64) -> Employee {
    Employee {
        id: 10,
        tenant_id,
        name: "Ana".into(),
        email: Some("ana@example.com".into()),
        status: "active".into(),
        hire_date: None,
        termination_date: None,
    }
}

fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn entry(id: &str, start: &str, end: Option<&str>) -> ExternalEntry {
    ExternalEntry {
        id: id.into(),
        time_interval: TimeInterval {
            start: start.into(),
            end: end.map(str::to_string),
            duration: None,
        },
        ..Default::default()
    }
}

async fn setup(provider: FakeProvider) -> (MemoryStore, FakeConnector) {
    let store = MemoryStore::new();
    store
        .insert_employee(Employee {
            id: 10,
            tenant_id: TENANT,
            name: "Ana".into(),
            email: Some("ana@example.com".into()),
            status: "active".into(),
            hire_date: None,
            termination_date: None,
        })
        .await;
    store
        .upsert_connection(TENANT, "ws-1", "key-1", Some("owner-1"))
        .await
        .unwrap();
    (store, FakeConnector(Arc::new(provider)))
}

fn provider() -> FakeProvider {
    FakeProvider {
        users: vec![
            ExternalUser {
                id: "u-ana".into(),
                name: Some("Ana".into()),
                email: Some("ANA@example.com".into()),
            },
            ExternalUser {
                id: "u-ghost".into(),
                name: None,
                email: Some("ghost@example.com".into()),
            },
        ],
        entries: vec![
            (
                "u-ana".into(),
                entry("e1", "2026-02-10T09:00:00Z", Some("2026-02-10T17:00:00Z")),
            ),
            (
                "u-ana".into(),
                entry("e2", "2026-02-12T09:00:00Z", Some("2026-02-12T12:30:00Z")),
            ),
            ("u-ana".into(), entry("e3", "2026-02-13T08:00:00Z", None)),
        ],
        calls: Mutex::new(Vec::new()),
    }
}

fn request(allow_closed_period: bool) -> SyncRequest {
    SyncRequest {
        tenant_id: TENANT,
        range: DateRange::new(day("2026-02-09"), day("2026-02-13")).unwrap(),
        allow_closed_period,
    }
}

#[tokio::test]
async fn repeated_sync_is_idempotent() {
    let (store, connector) = setup(provider()).await;
    let cancel = CancellationToken::new();

    let first = sync_configured_tenant(&store, &connector, &request(false), &cancel)
        .await
        .unwrap();
    assert_eq!(first.users_found, 2);
    assert_eq!(first.employees_mapped, 1);
    assert_eq!(first.entries_upserted, 3);
    assert_eq!(first.running_entries, 1);

    let second = sync_configured_tenant(&store, &connector, &request(false), &cancel)
        .await
        .unwrap();
    assert_eq!(second.entries_upserted, 3);

    let rows = store.list_entries(TENANT, &EntryFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].external_entry_id, "e3");
    assert!(rows[0].is_running);
    assert_eq!(rows[1].duration_seconds, 3 * 3600 + 1800);

    let links = store.list_links(TENANT).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].employee_id, 10);

    // unmapped users are never queried for entries
    let calls = connector.0.calls.lock().unwrap().clone();
    assert_eq!(calls, vec!["u-ana", "u-ana"]);
}

#[tokio::test]
async fn closed_period_entries_are_skipped_unless_allowed() {
    let (store, connector) = setup(provider()).await;
    let cancel = CancellationToken::new();
    store
        .close_period(
            TENANT,
            &ClosePeriod {
                range: DateRange::new(day("2026-02-01"), day("2026-02-10")).unwrap(),
                note: None,
                closed_by: None,
                items: Vec::new(),
            },
        )
        .await
        .unwrap();

    let summary = sync_configured_tenant(&store, &connector, &request(false), &cancel)
        .await
        .unwrap();
    assert_eq!(summary.entries_processed, 3);
    assert_eq!(summary.entries_skipped_closed, 1);
    assert_eq!(summary.entries_upserted, 2);

    let summary = sync_configured_tenant(&store, &connector, &request(true), &cancel)
        .await
        .unwrap();
    assert_eq!(summary.entries_skipped_closed, 0);
    assert_eq!(summary.entries_upserted, 3);
    let rows = store.list_entries(TENANT, &EntryFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn unconfigured_tenant_fails() {
    let store = MemoryStore::new();
    let connector = FakeConnector(Arc::new(FakeProvider::default()));
    let err = sync_configured_tenant(&store, &connector, &request(false), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotConfigured));
}

#[tokio::test]
async fn cancelled_pass_stops_before_fetching_entries() {
    let (store, connector) = setup(provider()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = sync_configured_tenant(&store, &connector, &request(false), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Provider(ProviderError::Cancelled)));
    assert!(connector.0.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn period_closed_during_pass_is_honoured() {
    let store = Arc::new(MemoryStore::new());
    store.insert_employee(ana(TENANT)).await;
    store
        .upsert_connection(TENANT, "ws-1", "key-1", None)
        .await
        .unwrap();
    let connector = ClosingConnector(Arc::new(ClosingProvider {
        inner: provider(),
        store: store.clone(),
        closing: DateRange::new(day("2026-02-01"), day("2026-02-10")).unwrap(),
    }));

    let summary = sync_configured_tenant(
        store.as_ref(),
        &connector,
        &request(false),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(summary.entries_processed, 3);
    assert_eq!(summary.entries_skipped_closed, 1);
    assert_eq!(summary.entries_upserted, 2);

    let rows = store.list_entries(TENANT, &EntryFilter::default()).await.unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.external_entry_id.as_str()).collect();
    assert_eq!(ids, vec!["e3", "e2"]);
}

#[tokio::test]
async fn auto_sync_isolates_failing_tenants() {
    let store = MemoryStore::new();
    store.insert_employee(ana(1)).await;
    store.insert_employee(ana(2)).await;
    store.upsert_connection(1, "ws-1", "revoked", None).await.unwrap();
    store.upsert_connection(2, "ws-2", "key-2", None).await.unwrap();
    let connector = KeyedConnector {
        provider: Arc::new(provider()),
        rejected_key: "revoked",
    };

    let now = DateTime::parse_from_rfc3339("2026-02-13T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let config = SchedulerConfig::new(true, 3, 1);
    let report = run_auto_sync(&store, &connector, &config, now, &CancellationToken::new()).await;
    assert_eq!(report.failed, vec![1]);
    assert_eq!(report.synced, vec![2]);

    // lookback of one day covers 02-12 and 02-13
    let rows = store.list_entries(2, &EntryFilter::default()).await.unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.external_entry_id.as_str()).collect();
    assert_eq!(ids, vec!["e3", "e2"]);
    assert!(store.list_entries(1, &EntryFilter::default()).await.unwrap().is_empty());
}
