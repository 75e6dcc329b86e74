//! Employee records consumed read-only from the HR module.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{EmployeeId, TenantId};

/// Status value marking a terminated employee. Any other status counts as active.
pub const STATUS_TERMINATED: &str = "terminated";

/// An employee as seen by the time-bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub id: EmployeeId,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: Option<String>,
    pub status: String,
    pub hire_date: Option<NaiveDate>,
    pub termination_date: Option<NaiveDate>,
}

impl Employee {
    pub fn is_active(&self) -> bool {
        self.status != STATUS_TERMINATED
    }

    /// Lower-cased, trimmed email, if any is on file.
    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
    }
}

/// Canonical form used when matching emails across systems.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Active employee without an identity link, listed on the status page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UnmappedEmployee {
    pub employee_id: EmployeeId,
    pub name: String,
    pub email: String,
}
