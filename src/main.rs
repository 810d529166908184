use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use api_shared::config::{core_config_from_env, rest_addr_from_env};
use raccord_core::open_store;

/// Main entry point for the Raccord application
///
/// Reads the configuration once, opens the record store and serves the REST API with its
/// Swagger UI.
///
/// # Environment Variables
/// - `RACCORD_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `RACCORD_STORE`: `file` (default) or `memory`
/// - `RACCORD_DATA_DIR`: Root of the file store (default: "raccord_data")
/// - `RACCORD_CAS_ATTEMPTS`, `RACCORD_STORAGE_ATTEMPTS`, `RACCORD_RETRY_BACKOFF_MS`: retry bounds
/// - `RACCORD_LOCK_WAIT_MS`: How long a write waits on a record locked by another writer
/// - `API_KEY`: When set, required in the `x-api-key` header
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, store opening or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("raccord_run=info".parse()?)
                .add_directive("raccord_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = rest_addr_from_env();
    let cfg = Arc::new(core_config_from_env()?);
    let store = open_store(&cfg)?;

    tracing::info!("++ Starting Raccord REST on {}", rest_addr);

    let rest_app = router(AppState::new(cfg, store));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, rest_app).await?;

    Ok(())
}
