//! # hourbank_api
//!
//! HTTP API library for Hourbank.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use hourbank_core::provider::ProviderConnector;
use hourbank_core::store::TimeStore;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{health, integrations, time_bank, time_entries};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Ledger persistence.
    pub store: Arc<dyn TimeStore>,
    /// Builds provider clients from tenant credentials.
    pub providers: Arc<dyn ProviderConnector>,
    /// API configuration.
    pub config: ApiConfig,
    /// Cancelled on shutdown; request-scoped work runs under child tokens.
    pub shutdown: CancellationToken,
}

/// Run embedded database migrations.
///
/// Delegates to `hourbank_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    hourbank_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new().route(routes::GET_API_HEALTH, get(health::health));

    // Protected routes (owner or hr)
    let protected = Router::new()
        .route(
            routes::INTEGRATIONS_PROVIDER,
            get(integrations::get_provider).post(integrations::save_provider),
        )
        .route(
            routes::INTEGRATIONS_PROVIDER_STATUS,
            get(integrations::get_status),
        )
        .route(routes::INTEGRATIONS_PROVIDER_SYNC, post(integrations::sync))
        .route(
            routes::INTEGRATIONS_PROVIDER_LINKS,
            get(integrations::list_links).put(integrations::put_link),
        )
        .route(routes::GET_TIME_ENTRIES, get(time_entries::list_entries))
        .route(
            routes::TIME_BANK_SETTINGS,
            get(time_bank::get_settings).put(time_bank::put_settings),
        )
        .route(routes::GET_TIME_BANK_SUMMARY, get(time_bank::get_summary))
        .route(
            routes::TIME_BANK_ADJUSTMENTS,
            get(time_bank::list_adjustments).post(time_bank::create_adjustment),
        )
        .route(
            routes::POST_TIME_BANK_ADJUSTMENTS_ID_APPROVE,
            post(time_bank::approve_adjustment),
        )
        .route(
            routes::POST_TIME_BANK_ADJUSTMENTS_ID_REJECT,
            post(time_bank::reject_adjustment),
        )
        .route(routes::GET_TIME_BANK_CLOSURES, get(time_bank::list_closures))
        .route(
            routes::POST_TIME_BANK_CLOSURES_CLOSE,
            post(time_bank::close_period),
        )
        .route(
            routes::POST_TIME_BANK_CLOSURES_ID_REOPEN,
            post(time_bank::reopen_period),
        )
        .route(
            routes::GET_TIME_BANK_CLOSURES_ID_EMPLOYEES,
            get(time_bank::closure_employees),
        )
        .route(
            routes::GET_TIME_BANK_CLOSURES_ID_EXPORT,
            get(time_bank::export_closure),
        )
        .layer(axum::middleware::from_fn(middleware::auth::require_manager))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
