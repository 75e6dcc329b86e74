//! Identity linking between provider users and internal employees.
//!
//! A persisted link for the external user id always wins. Otherwise the
//! user's email is matched (trimmed, case-insensitive) against active
//! employees. An employee already held by a persisted link, or claimed
//! earlier in the same pass, is never handed to a second external user.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::employee::{Employee, normalize_email};
use crate::models::provider::IdentityLink;
use crate::models::{EmployeeId, TenantId};
use crate::provider::ExternalUser;

/// How a mapping was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    Persisted,
    Email,
}

/// One resolved provider user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub link: IdentityLink,
    pub source: LinkSource,
}

/// Resolve provider users to employees.
///
/// The returned links carry refreshed name, email and `last_synced_at` and
/// are ready to be upserted. Users without a match are left out.
pub fn resolve_links(
    tenant_id: TenantId,
    users: &[ExternalUser],
    employees: &[Employee],
    existing: &[IdentityLink],
    now: DateTime<Utc>,
) -> Vec<ResolvedLink> {
    let persisted: HashMap<&str, EmployeeId> = existing
        .iter()
        .map(|l| (l.external_user_id.as_str(), l.employee_id))
        .collect();

    let mut by_email: HashMap<String, EmployeeId> = HashMap::new();
    for employee in employees.iter().filter(|e| e.is_active()) {
        if let Some(email) = employee.normalized_email() {
            by_email.entry(email).or_insert(employee.id);
        }
    }

    let mut claimed: HashSet<EmployeeId> = existing.iter().map(|l| l.employee_id).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut resolved = Vec::new();

    for user in users {
        let external_user_id = user.id.trim();
        if external_user_id.is_empty() || !seen.insert(external_user_id) {
            continue;
        }

        let (employee_id, source) = match persisted.get(external_user_id) {
            Some(id) => (*id, LinkSource::Persisted),
            None => {
                let Some(email) = user
                    .email
                    .as_deref()
                    .map(normalize_email)
                    .filter(|e| !e.is_empty())
                else {
                    continue;
                };
                match by_email.get(&email) {
                    Some(id) if !claimed.contains(id) => (*id, LinkSource::Email),
                    _ => continue,
                }
            }
        };
        claimed.insert(employee_id);

        resolved.push(ResolvedLink {
            link: IdentityLink {
                tenant_id,
                employee_id,
                external_user_id: external_user_id.to_string(),
                external_user_name: trimmed(user.name.as_deref()),
                external_user_email: trimmed(user.email.as_deref()),
                last_synced_at: Some(now),
            },
            source,
        });
    }

    resolved
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
