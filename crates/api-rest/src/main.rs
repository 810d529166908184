//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging against the Swagger UI. The workspace's main
//! `raccord-run` binary serves the same router.

use api_rest::{router, AppState};
use api_shared::config::{core_config_from_env, rest_addr_from_env};
use raccord_core::open_store;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the Raccord REST API server
///
/// # Environment Variables
/// - `RACCORD_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `RACCORD_STORE`, `RACCORD_DATA_DIR` and the retry settings read by `core_config_from_env`
/// - `API_KEY`: when set, every authenticated route requires a matching `x-api-key` header
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
                .add_directive("api_rest=info".parse()?)
                .add_directive("raccord_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = rest_addr_from_env();
    let cfg = Arc::new(core_config_from_env()?);
    let store = open_store(&cfg)?;

    tracing::info!("-- Starting Raccord REST API on {}", addr);

    let app = router(AppState::new(cfg, store));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
