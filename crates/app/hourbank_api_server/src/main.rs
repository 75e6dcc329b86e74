//! Hourbank API server binary.
//!
//! Serves the REST API and, when enabled, runs the daily provider sync in
//! the background. Both stop on Ctrl-C.

use std::sync::Arc;

use clap::Parser;
use hourbank_core::provider::clockify::{CLOCKIFY_BASE_URL, ClockifyConnector};
use hourbank_core::scheduler::{SchedulerConfig, run_scheduler};
use hourbank_core::store::PgStore;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "hourbank_api_server", about = "Hourbank time-bank API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/hourbank"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Base URL of the time provider API.
    #[arg(long, env = "PROVIDER_BASE_URL", default_value = CLOCKIFY_BASE_URL)]
    provider_base_url: String,

    /// Run the daily background sync of every configured tenant.
    #[arg(long = "auto-sync", env = "AUTO_SYNC_ENABLED", default_value_t = false)]
    auto_sync: bool,

    /// Hour of day (UTC) for the daily sync; out-of-range values fall back to 3.
    #[arg(long, env = "AUTO_SYNC_HOUR_UTC", default_value_t = 3, allow_negative_numbers = true)]
    auto_sync_hour_utc: i64,

    /// Days before today included in each automatic pass (at least 1).
    #[arg(long, env = "AUTO_SYNC_LOOKBACK_DAYS", default_value_t = 1, allow_negative_numbers = true)]
    auto_sync_lookback_days: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,hourbank_api=debug,hourbank_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    info!(bind_addr = %args.bind_addr, "starting hourbank_api_server");
    info!(
        max_connections = args.max_connections,
        "configuring connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    hourbank_api::migrate(&pool).await?;

    let config = hourbank_api::config::ApiConfig {
        bind_addr: args.bind_addr.clone(),
        pg_connection_url: args.database_url.clone(),
        jwt_secret: hourbank_core::auth::resolve_jwt_secret()?,
    };

    let store: Arc<dyn hourbank_core::store::TimeStore> = Arc::new(PgStore::new(pool));
    let providers: Arc<dyn hourbank_core::provider::ProviderConnector> =
        Arc::new(ClockifyConnector::new(args.provider_base_url.as_str())?);
    let shutdown = CancellationToken::new();

    let scheduler_config = SchedulerConfig::new(
        args.auto_sync,
        args.auto_sync_hour_utc,
        args.auto_sync_lookback_days,
    );
    let scheduler = tokio::spawn(run_scheduler(
        store.clone(),
        providers.clone(),
        scheduler_config,
        shutdown.clone(),
    ));

    let state = hourbank_api::AppState {
        store,
        providers,
        config: config.clone(),
        shutdown: shutdown.clone(),
    };
    let app = hourbank_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {e}");
            }
            info!("shutdown requested");
            shutdown.cancel();
        }
    });

    let api_result = axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await;

    // When the REST API exits, also stop the scheduler.
    shutdown.cancel();
    let _ = scheduler.await;

    api_result?;

    Ok(())
}
