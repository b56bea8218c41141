//! Rolling Transaction Statistics: Binary Entrypoint
//! Boots the Axum HTTP server, wiring configuration, tracing, and routes.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENV_LOG_FORMAT: &str = "STATS_LOG_FORMAT";

/// Compact logs by default, JSON lines with STATS_LOG_FORMAT=json.
/// Filter comes from RUST_LOG. Leaves an already installed subscriber alone.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("transaction_statistics=info,warn"));

    let json = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed by the runtime");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let router = transaction_statistics::app().await?;
    tracing::info!("statistics service ready");

    Ok(router.into())
}
