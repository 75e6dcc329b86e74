//! In-process [`TimeStore`] backed by a single mutex.
//!
//! Every call holds the lock for its whole duration, which serializes all
//! writes. Used by tests and for running the API without a database.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use super::{StoreError, StoreResult, TimeStore, is_closed};
use crate::dates::{DateRange, days_before, start_of_day};
use crate::models::employee::{Employee, UnmappedEmployee};
use crate::models::ledger::{EntryFilter, LedgerEntry, NewLedgerEntry};
use crate::models::provider::{Connection, IdentityLink, IntegrationStats};
use crate::models::timebank::{
    Adjustment, AdjustmentDecision, AdjustmentFilter, AdjustmentStatus, ClosePeriod, Closure,
    ClosureItem, ClosureStatus, NewAdjustment, ReopenPeriod, TimeBankSettings,
};
use crate::models::{EmployeeId, TenantId};

#[derive(Default)]
struct State {
    next_id: i64,
    employees: Vec<Employee>,
    connections: BTreeMap<TenantId, Connection>,
    links: Vec<IdentityLink>,
    entries: Vec<LedgerEntry>,
    settings: HashMap<TenantId, TimeBankSettings>,
    adjustments: Vec<Adjustment>,
    closures: Vec<Closure>,
    items: HashMap<i64, Vec<ClosureItem>>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn closed_periods(&self, tenant_id: TenantId) -> Vec<DateRange> {
        self.closures
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.status == ClosureStatus::Closed)
            .map(Closure::range)
            .collect()
    }

    fn employee(&self, tenant_id: TenantId, employee_id: EmployeeId) -> Option<&Employee> {
        self.employees
            .iter()
            .find(|e| e.tenant_id == tenant_id && e.id == employee_id)
    }

    fn refresh_aggregates(&mut self, closure_id: i64) {
        let items = self.items.get(&closure_id).cloned().unwrap_or_default();
        if let Some(closure) = self.closures.iter_mut().find(|c| c.id == closure_id) {
            closure.employees_count = items.len() as i64;
            closure.total_worked_seconds = items.iter().map(|i| i.worked_seconds).sum();
            closure.total_expected_seconds = items.iter().map(|i| i.expected_seconds).sum();
            closure.total_adjustment_seconds = items.iter().map(|i| i.adjustment_seconds).sum();
            closure.total_balance_seconds = items.iter().map(|i| i.balance_seconds).sum();
        }
    }
}

/// Volatile store. Employees are seeded with [`MemoryStore::insert_employee`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an employee record.
    pub async fn insert_employee(&self, employee: Employee) {
        let mut state = self.state.lock().await;
        state
            .employees
            .retain(|e| !(e.tenant_id == employee.tenant_id && e.id == employee.id));
        state.employees.push(employee);
    }
}

#[async_trait]
impl TimeStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get_connection(&self, tenant_id: TenantId) -> StoreResult<Option<Connection>> {
        Ok(self.state.lock().await.connections.get(&tenant_id).cloned())
    }

    async fn upsert_connection(
        &self,
        tenant_id: TenantId,
        workspace_id: &str,
        api_key: &str,
        actor: Option<&str>,
    ) -> StoreResult<Connection> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let connection = state
            .connections
            .entry(tenant_id)
            .and_modify(|c| {
                c.workspace_id = workspace_id.to_string();
                c.api_key = api_key.to_string();
                c.updated_by = actor.map(str::to_string);
                c.updated_at = now;
            })
            .or_insert_with(|| Connection {
                tenant_id,
                workspace_id: workspace_id.to_string(),
                api_key: api_key.to_string(),
                created_by: actor.map(str::to_string),
                updated_by: actor.map(str::to_string),
                created_at: now,
                updated_at: now,
            });
        Ok(connection.clone())
    }

    async fn list_connections(&self) -> StoreResult<Vec<Connection>> {
        Ok(self.state.lock().await.connections.values().cloned().collect())
    }

    async fn list_active_employees(&self, tenant_id: TenantId) -> StoreResult<Vec<Employee>> {
        let state = self.state.lock().await;
        let mut employees: Vec<Employee> = state
            .employees
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.is_active())
            .cloned()
            .collect();
        employees.sort_by_key(|e| e.id);
        Ok(employees)
    }

    async fn get_employee(
        &self,
        tenant_id: TenantId,
        employee_id: EmployeeId,
    ) -> StoreResult<Option<Employee>> {
        Ok(self.state.lock().await.employee(tenant_id, employee_id).cloned())
    }

    async fn list_employees_in_range(
        &self,
        tenant_id: TenantId,
        range: DateRange,
    ) -> StoreResult<Vec<Employee>> {
        let state = self.state.lock().await;
        let mut employees: Vec<Employee> = state
            .employees
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| e.hire_date.is_none_or(|d| d <= range.end))
            .filter(|e| e.termination_date.is_none_or(|d| d >= range.start))
            .cloned()
            .collect();
        employees.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(employees)
    }

    async fn list_links(&self, tenant_id: TenantId) -> StoreResult<Vec<IdentityLink>> {
        let state = self.state.lock().await;
        let mut links: Vec<IdentityLink> = state
            .links
            .iter()
            .filter(|l| l.tenant_id == tenant_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| l.employee_id);
        Ok(links)
    }

    async fn upsert_link(&self, link: &IdentityLink) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        match state.links.iter_mut().find(|l| {
            l.tenant_id == link.tenant_id && l.external_user_id == link.external_user_id
        }) {
            Some(existing) => *existing = link.clone(),
            None => state.links.push(link.clone()),
        }
        Ok(())
    }

    async fn replace_link(&self, link: &IdentityLink) -> StoreResult<IdentityLink> {
        let mut state = self.state.lock().await;
        state.links.retain(|l| {
            l.tenant_id != link.tenant_id
                || (l.employee_id != link.employee_id
                    && l.external_user_id != link.external_user_id)
        });
        state.links.push(link.clone());
        Ok(link.clone())
    }

    async fn upsert_entry(&self, entry: &NewLedgerEntry, respect_closed: bool) -> StoreResult<()> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let day = entry.start_at.date_naive();
        if respect_closed && is_closed(&state.closed_periods(entry.tenant_id), day) {
            return Err(StoreError::PeriodClosed(day));
        }
        let existing = state.entries.iter().position(|e| {
            e.tenant_id == entry.tenant_id
                && e.source == entry.source
                && e.external_entry_id == entry.external_entry_id
        });
        let (id, created_at) = match existing {
            Some(index) => {
                let old = state.entries.remove(index);
                (old.id, old.created_at)
            }
            None => (state.next_id(), now),
        };
        state.entries.push(LedgerEntry {
            id,
            tenant_id: entry.tenant_id,
            employee_id: entry.employee_id,
            source: entry.source.clone(),
            external_entry_id: entry.external_entry_id.clone(),
            external_user_id: entry.external_user_id.clone(),
            workspace_id: entry.workspace_id.clone(),
            project_id: entry.project_id.clone(),
            task_id: entry.task_id.clone(),
            description: entry.description.clone(),
            tag_ids: entry.tag_ids.clone(),
            start_at: entry.start_at,
            end_at: entry.end_at,
            duration_seconds: entry.duration_seconds,
            is_running: entry.is_running,
            billable: entry.billable,
            synced_at: entry.synced_at,
            created_at,
            updated_at: now,
        });
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
        let state = self.state.lock().await;
        let mut entries: Vec<LedgerEntry> = state
            .entries
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| filter.employee_id.is_none() || e.employee_id == filter.employee_id)
            .filter(|e| from.is_none_or(|f| e.start_at >= f))
            .filter(|e| until.is_none_or(|u| e.start_at < u))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.start_at.cmp(&a.start_at).then(b.id.cmp(&a.id)));
        entries.truncate(filter.limit.max(0) as usize);
        Ok(entries)
    }

    async fn worked_seconds(
        &self,
        tenant_id: TenantId,
        range: DateRange,
        now: DateTime<Utc>,
    ) -> StoreResult<HashMap<EmployeeId, i64>> {
        let (from, until) = (range.start_at(), range.end_exclusive_at());
        let state = self.state.lock().await;
        let mut worked = HashMap::new();
        for entry in state.entries.iter().filter(|e| e.tenant_id == tenant_id) {
            let Some(employee_id) = entry.employee_id else {
                continue;
            };
            if entry.start_at < from || entry.start_at >= until {
                continue;
            }
            let seconds = if entry.is_running {
                (now - entry.start_at).num_seconds().max(0)
            } else {
                entry.duration_seconds
            };
            let total = worked.entry(employee_id).or_insert(0_i64);
            *total = total.saturating_add(seconds);
        }
        Ok(worked)
    }

    async fn integration_stats(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
        preview_limit: i64,
    ) -> StoreResult<IntegrationStats> {
        let window_start = start_of_day(days_before(now.date_naive(), 7));
        let state = self.state.lock().await;
        let entries: Vec<&LedgerEntry> = state
            .entries
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .collect();
        let linked: Vec<EmployeeId> = state
            .links
            .iter()
            .filter(|l| l.tenant_id == tenant_id)
            .map(|l| l.employee_id)
            .collect();
        let mut unmapped: Vec<&Employee> = state
            .employees
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.is_active() && !linked.contains(&e.id))
            .collect();
        unmapped.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(IntegrationStats {
            last_sync_at: entries.iter().map(|e| e.synced_at).max(),
            last_entry_start_at: entries.iter().map(|e| e.start_at).max(),
            last_entry_end_at: entries.iter().filter_map(|e| e.end_at).max(),
            entries_total: entries.len() as i64,
            entries_last_7_days: entries.iter().filter(|e| e.start_at >= window_start).count()
                as i64,
            entries_running: entries.iter().filter(|e| e.is_running).count() as i64,
            active_employees: state
                .employees
                .iter()
                .filter(|e| e.tenant_id == tenant_id && e.is_active())
                .count() as i64,
            mapped_employees: linked.len() as i64,
            active_unmapped_employees: unmapped.len() as i64,
            unmapped_employees_preview: unmapped
                .into_iter()
                .take(preview_limit.max(0) as usize)
                .map(|e| UnmappedEmployee {
                    employee_id: e.id,
                    name: e.name.clone(),
                    email: e.email.clone().unwrap_or_default(),
                })
                .collect(),
        })
    }

    async fn get_settings(&self, tenant_id: TenantId) -> StoreResult<TimeBankSettings> {
        let state = self.state.lock().await;
        Ok(state.settings.get(&tenant_id).cloned().unwrap_or_default())
    }

    async fn save_settings(
        &self,
        tenant_id: TenantId,
        settings: &TimeBankSettings,
    ) -> StoreResult<TimeBankSettings> {
        let saved = TimeBankSettings {
            updated_at: Some(Utc::now()),
            ..settings.clone()
        };
        self.state
            .lock()
            .await
            .settings
            .insert(tenant_id, saved.clone());
        Ok(saved)
    }

    async fn approved_adjustment_seconds(
        &self,
        tenant_id: TenantId,
        range: DateRange,
    ) -> StoreResult<HashMap<EmployeeId, i64>> {
        let state = self.state.lock().await;
        let mut totals = HashMap::new();
        for adjustment in state.adjustments.iter().filter(|a| {
            a.tenant_id == tenant_id
                && a.status == AdjustmentStatus::Approved
                && range.contains(a.effective_date)
        }) {
            let total = totals.entry(adjustment.employee_id).or_insert(0_i64);
            *total = total.saturating_add(adjustment.seconds_delta);
        }
        Ok(totals)
    }

    async fn list_adjustments(
        &self,
        tenant_id: TenantId,
        filter: &AdjustmentFilter,
    ) -> StoreResult<Vec<Adjustment>> {
        let state = self.state.lock().await;
        let mut adjustments: Vec<Adjustment> = state
            .adjustments
            .iter()
            .filter(|a| a.tenant_id == tenant_id && filter.range.contains(a.effective_date))
            .filter(|a| filter.employee_id.is_none_or(|id| a.employee_id == id))
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .cloned()
            .collect();
        adjustments.sort_by(|a, b| {
            b.effective_date
                .cmp(&a.effective_date)
                .then(b.id.cmp(&a.id))
        });
        adjustments.truncate(filter.limit.max(0) as usize);
        Ok(adjustments)
    }

    async fn create_adjustment(
        &self,
        tenant_id: TenantId,
        adjustment: &NewAdjustment,
    ) -> StoreResult<Adjustment> {
        let mut state = self.state.lock().await;
        if is_closed(&state.closed_periods(tenant_id), adjustment.effective_date) {
            return Err(StoreError::PeriodClosed(adjustment.effective_date));
        }
        let employee_name = state
            .employee(tenant_id, adjustment.employee_id)
            .map(|e| e.name.clone())
            .ok_or_else(|| StoreError::NotFound("employee".into()))?;
        let created = Adjustment {
            id: state.next_id(),
            tenant_id,
            employee_id: adjustment.employee_id,
            employee_name,
            effective_date: adjustment.effective_date,
            seconds_delta: adjustment.seconds_delta,
            status: AdjustmentStatus::Pending,
            reason: adjustment.reason.clone(),
            review_note: None,
            created_by: adjustment.created_by.clone(),
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };
        state.adjustments.push(created.clone());
        Ok(created)
    }

    async fn decide_adjustment(
        &self,
        tenant_id: TenantId,
        adjustment_id: i64,
        decision: &AdjustmentDecision,
    ) -> StoreResult<Adjustment> {
        let mut state = self.state.lock().await;
        let closed = state.closed_periods(tenant_id);
        let adjustment = state
            .adjustments
            .iter_mut()
            .find(|a| a.tenant_id == tenant_id && a.id == adjustment_id)
            .ok_or_else(|| StoreError::NotFound("adjustment".into()))?;
        if adjustment.status != AdjustmentStatus::Pending {
            return Err(StoreError::InvalidTransition);
        }
        if is_closed(&closed, adjustment.effective_date) {
            return Err(StoreError::PeriodClosed(adjustment.effective_date));
        }
        adjustment.status = decision.status;
        adjustment.review_note = decision.note.clone();
        adjustment.reviewed_by = decision.reviewed_by.clone();
        adjustment.reviewed_at = Some(Utc::now());
        Ok(adjustment.clone())
    }

    async fn closed_periods(&self, tenant_id: TenantId) -> StoreResult<Vec<DateRange>> {
        let mut periods = self.state.lock().await.closed_periods(tenant_id);
        periods.sort_by_key(|p| p.start);
        Ok(periods)
    }

    async fn close_period(
        &self,
        tenant_id: TenantId,
        close: &ClosePeriod,
    ) -> StoreResult<Closure> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let existing = state
            .closures
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.range() == close.range)
            .map(|c| c.id);
        if let Some(conflict) = state.closures.iter().find(|c| {
            c.tenant_id == tenant_id
                && c.status == ClosureStatus::Closed
                && Some(c.id) != existing
                && c.range().overlaps(&close.range)
        }) {
            return Err(StoreError::Overlap(conflict.range()));
        }

        let id = match existing {
            Some(id) => id,
            None => {
                let id = state.next_id();
                state.closures.push(Closure {
                    id,
                    tenant_id,
                    period_start: close.range.start,
                    period_end: close.range.end,
                    status: ClosureStatus::Closed,
                    note: None,
                    closed_at: None,
                    closed_by: None,
                    reopened_at: None,
                    reopened_by: None,
                    created_at: now,
                    updated_at: now,
                    employees_count: 0,
                    total_worked_seconds: 0,
                    total_expected_seconds: 0,
                    total_adjustment_seconds: 0,
                    total_balance_seconds: 0,
                });
                id
            }
        };
        if let Some(closure) = state.closures.iter_mut().find(|c| c.id == id) {
            closure.status = ClosureStatus::Closed;
            closure.note = close.note.clone();
            closure.closed_at = Some(now);
            closure.closed_by = close.closed_by.clone();
            closure.reopened_at = None;
            closure.reopened_by = None;
            closure.updated_at = now;
        }
        state.items.insert(id, close.items.clone());
        state.refresh_aggregates(id);

        state
            .closures
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("closure".into()))
    }

    async fn reopen_period(
        &self,
        tenant_id: TenantId,
        reopen: &ReopenPeriod,
    ) -> StoreResult<Closure> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let closure = state
            .closures
            .iter_mut()
            .find(|c| c.tenant_id == tenant_id && c.id == reopen.closure_id)
            .ok_or_else(|| StoreError::NotFound("closure".into()))?;
        closure.status = ClosureStatus::Reopened;
        if reopen.note.is_some() {
            closure.note = reopen.note.clone();
        }
        closure.reopened_at = Some(now);
        closure.reopened_by = reopen.reopened_by.clone();
        closure.updated_at = now;
        Ok(closure.clone())
    }

    async fn get_closure(
        &self,
        tenant_id: TenantId,
        closure_id: i64,
    ) -> StoreResult<Option<Closure>> {
        let state = self.state.lock().await;
        Ok(state
            .closures
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.id == closure_id)
            .cloned())
    }

    async fn list_closures(&self, tenant_id: TenantId, limit: i64) -> StoreResult<Vec<Closure>> {
        let state = self.state.lock().await;
        let mut closures: Vec<Closure> = state
            .closures
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        closures.sort_by(|a, b| b.period_end.cmp(&a.period_end).then(b.id.cmp(&a.id)));
        closures.truncate(limit.max(0) as usize);
        Ok(closures)
    }

    async fn closure_items(
        &self,
        tenant_id: TenantId,
        closure_id: i64,
    ) -> StoreResult<Vec<ClosureItem>> {
        let state = self.state.lock().await;
        if !state
            .closures
            .iter()
            .any(|c| c.tenant_id == tenant_id && c.id == closure_id)
        {
            return Err(StoreError::NotFound("closure".into()));
        }
        let mut items = state.items.get(&closure_id).cloned().unwrap_or_default();
        items.sort_by(|a, b| {
            a.employee_name
                .cmp(&b.employee_name)
                .then(a.employee_id.cmp(&b.employee_id))
        });
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(day(start), day(end)).unwrap()
    }

    fn close(start: &str, end: &str) -> ClosePeriod {
        ClosePeriod {
            range: range(start, end),
            note: None,
            closed_by: Some("hr-1".into()),
            items: vec![],
        }
    }

    #[tokio::test]
    async fn overlapping_close_is_rejected() {
        let store = MemoryStore::new();
        store.close_period(1, &close("2026-02-10", "2026-02-20")).await.unwrap();

        let err = store
            .close_period(1, &close("2026-02-01", "2026-02-15"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Overlap(r) if r == range("2026-02-10", "2026-02-20")));

        store.close_period(1, &close("2026-02-21", "2026-02-28")).await.unwrap();
        // other tenants are unaffected
        store.close_period(2, &close("2026-02-01", "2026-02-15")).await.unwrap();
    }

    #[tokio::test]
    async fn reclosing_same_range_reuses_row() {
        let store = MemoryStore::new();
        let first = store.close_period(1, &close("2026-02-01", "2026-02-07")).await.unwrap();
        let second = store.close_period(1, &close("2026-02-01", "2026-02-07")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_closures(1, 30).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reopened_period_no_longer_blocks() {
        let store = MemoryStore::new();
        let closure = store.close_period(1, &close("2026-02-10", "2026-02-20")).await.unwrap();
        store
            .reopen_period(
                1,
                &ReopenPeriod {
                    closure_id: closure.id,
                    note: None,
                    reopened_by: None,
                },
            )
            .await
            .unwrap();
        assert!(store.closed_periods(1).await.unwrap().is_empty());
        store.close_period(1, &close("2026-02-01", "2026-02-15")).await.unwrap();
    }
}
