//! Route paths.

pub const GET_API_HEALTH: &str = "/api/health";

pub const INTEGRATIONS_PROVIDER: &str = "/integrations/provider";
pub const INTEGRATIONS_PROVIDER_STATUS: &str = "/integrations/provider/status";
pub const INTEGRATIONS_PROVIDER_SYNC: &str = "/integrations/provider/sync";
pub const INTEGRATIONS_PROVIDER_LINKS: &str = "/integrations/provider/links";

pub const GET_TIME_ENTRIES: &str = "/time-entries";

pub const TIME_BANK_SETTINGS: &str = "/time-bank/settings";
pub const GET_TIME_BANK_SUMMARY: &str = "/time-bank/summary";
pub const TIME_BANK_ADJUSTMENTS: &str = "/time-bank/adjustments";
pub const POST_TIME_BANK_ADJUSTMENTS_ID_APPROVE: &str = "/time-bank/adjustments/{id}/approve";
pub const POST_TIME_BANK_ADJUSTMENTS_ID_REJECT: &str = "/time-bank/adjustments/{id}/reject";
pub const GET_TIME_BANK_CLOSURES: &str = "/time-bank/closures";
pub const POST_TIME_BANK_CLOSURES_CLOSE: &str = "/time-bank/closures/close";
pub const POST_TIME_BANK_CLOSURES_ID_REOPEN: &str = "/time-bank/closures/{id}/reopen";
pub const GET_TIME_BANK_CLOSURES_ID_EMPLOYEES: &str = "/time-bank/closures/{id}/employees";
pub const GET_TIME_BANK_CLOSURES_ID_EXPORT: &str = "/time-bank/closures/{id}/export.csv";
