//! Balance computation.
//!
//! `balance = worked + approved adjustments - expected`, all in seconds.
//! Expected time counts workdays inside the employee's employment window:
//! Sundays never count and Saturdays only when the tenant enables them.

use chrono::{DateTime, Datelike, Utc, Weekday};

use super::TimeBankResult;
use crate::dates::DateRange;
use crate::models::TenantId;
use crate::models::employee::Employee;
use crate::models::timebank::{BalanceTotals, EmployeeBalance, TimeBankSettings, TimeBankSummary};
use crate::store::TimeStore;

/// Number of workdays in `range`.
pub fn count_workdays(range: DateRange, include_saturday: bool) -> i64 {
    range
        .days()
        .filter(|d| match d.weekday() {
            Weekday::Sun => false,
            Weekday::Sat => include_saturday,
            _ => true,
        })
        .count() as i64
}

/// Expected seconds for `employee` over `range`, clamped to hire/termination.
pub fn expected_seconds(employee: &Employee, range: DateRange, settings: &TimeBankSettings) -> i64 {
    range
        .clamp(employee.hire_date, employee.termination_date)
        .map_or(0, |window| {
            count_workdays(window, settings.include_saturday)
                * i64::from(settings.target_daily_minutes)
                * 60
        })
}

/// Assemble one employee's balance row.
pub fn employee_balance(
    employee: &Employee,
    range: DateRange,
    settings: &TimeBankSettings,
    worked_seconds: i64,
    adjustment_seconds: i64,
) -> EmployeeBalance {
    let expected_seconds = expected_seconds(employee, range, settings);
    EmployeeBalance {
        employee_id: employee.id,
        name: employee.name.clone(),
        status: employee.status.clone(),
        hire_date: employee.hire_date,
        termination_date: employee.termination_date,
        worked_seconds,
        expected_seconds,
        adjustment_seconds,
        balance_seconds: worked_seconds
            .saturating_add(adjustment_seconds)
            .saturating_sub(expected_seconds),
    }
}

/// Summary of every employee employed during `range`.
pub async fn build_summary(
    store: &dyn TimeStore,
    tenant_id: TenantId,
    range: DateRange,
    now: DateTime<Utc>,
) -> TimeBankResult<TimeBankSummary> {
    let settings = store.get_settings(tenant_id).await?;
    let employees = store.list_employees_in_range(tenant_id, range).await?;
    let worked = store.worked_seconds(tenant_id, range, now).await?;
    let adjustments = store.approved_adjustment_seconds(tenant_id, range).await?;

    let rows: Vec<EmployeeBalance> = employees
        .iter()
        .map(|e| {
            employee_balance(
                e,
                range,
                &settings,
                worked.get(&e.id).copied().unwrap_or(0),
                adjustments.get(&e.id).copied().unwrap_or(0),
            )
        })
        .collect();

    let totals = rows.iter().fold(BalanceTotals::default(), |acc, r| BalanceTotals {
        worked_seconds: acc.worked_seconds.saturating_add(r.worked_seconds),
        expected_seconds: acc.expected_seconds.saturating_add(r.expected_seconds),
        adjustment_seconds: acc.adjustment_seconds.saturating_add(r.adjustment_seconds),
        balance_seconds: acc.balance_seconds.saturating_add(r.balance_seconds),
    });

    Ok(TimeBankSummary {
        start_date: range.start,
        end_date: range.end,
        target_daily_minutes: settings.target_daily_minutes,
        include_saturday: settings.include_saturday,
        employees: rows,
        totals,
    })
}
