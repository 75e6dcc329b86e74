//! Domain models shared by the core modules and the HTTP layer.

pub mod employee;
pub mod ledger;
pub mod provider;
pub mod timebank;

/// Tenant identifier. Every query and write is scoped by it.
pub type TenantId = i64;

/// Internal employee identifier.
pub type EmployeeId = i64;
