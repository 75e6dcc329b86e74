//! Per-tenant time-bank settings.

use serde::Deserialize;

use super::{TimeBankError, TimeBankResult};
use crate::models::TenantId;
use crate::models::timebank::{MAX_TARGET_DAILY_MINUTES, TimeBankSettings};
use crate::store::TimeStore;

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsPatch {
    pub target_daily_minutes: Option<i32>,
    pub include_saturday: Option<bool>,
}

impl SettingsPatch {
    pub fn apply(&self, current: &TimeBankSettings) -> TimeBankResult<TimeBankSettings> {
        let mut next = current.clone();
        if let Some(minutes) = self.target_daily_minutes {
            if !(1..=MAX_TARGET_DAILY_MINUTES).contains(&minutes) {
                return Err(TimeBankError::Validation(format!(
                    "target_daily_minutes must be between 1 and {MAX_TARGET_DAILY_MINUTES}"
                )));
            }
            next.target_daily_minutes = minutes;
        }
        if let Some(include_saturday) = self.include_saturday {
            next.include_saturday = include_saturday;
        }
        Ok(next)
    }
}

pub async fn get_settings(
    store: &dyn TimeStore,
    tenant_id: TenantId,
) -> TimeBankResult<TimeBankSettings> {
    Ok(store.get_settings(tenant_id).await?)
}

pub async fn update_settings(
    store: &dyn TimeStore,
    tenant_id: TenantId,
    patch: &SettingsPatch,
) -> TimeBankResult<TimeBankSettings> {
    let current = store.get_settings(tenant_id).await?;
    let next = patch.apply(&current)?;
    Ok(store.save_settings(tenant_id, &next).await?)
}
