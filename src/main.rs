use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use clinic_core::{
    CoreConfig, Credentials, JsonFileBackend, RecordStore, config::token_ttl_days_from_env_value,
    constants::DEFAULT_DB_FILE,
};

/// Main entry point for the clinic service
///
/// Loads configuration, opens the JSON record store and serves the REST API (with Swagger UI)
/// until interrupted.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_DB_FILE`: JSON document store path (default: "data/db.json")
/// - `JWT_SECRET`: token signing secret (required)
/// - `JWT_TTL_DAYS`: token lifetime in days (default: 30)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the store cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_run=info".parse()?)
                .add_directive("clinic_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let db_file = std::env::var("CLINIC_DB_FILE").unwrap_or_else(|_| DEFAULT_DB_FILE.into());
    let token_ttl_days = token_ttl_days_from_env_value(std::env::var("JWT_TTL_DAYS").ok())?;
    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();

    let cfg = CoreConfig::new(db_file.into(), jwt_secret, token_ttl_days)?;
    tracing::info!("++ Opening record store at {}", cfg.db_file().display());

    let store = Arc::new(RecordStore::open(JsonFileBackend::new(cfg.db_file()))?);
    let credentials = Arc::new(Credentials::from_config(&cfg));
    let app = router(AppState::new(store, credentials));

    tracing::info!("++ Starting clinic REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- Clinic REST stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
