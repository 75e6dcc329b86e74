//! # hourbank_core
//!
//! Core domain logic for Hourbank: the external time provider client, identity
//! linking, ledger ingestion, the time-bank ledger and its persistence seam.

pub mod auth;
pub mod dates;
pub mod identity;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod provider;
pub mod scheduler;
pub mod store;
pub mod timebank;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
