// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod amount;
pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod rolling;
pub mod statistics;
pub mod telemetry;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::AppConfig;
pub use crate::error::StatsError;
pub use crate::rolling::SlidingWindowAggregator;
pub use crate::statistics::StatisticsSnapshot;

use std::sync::Arc;

use axum::Router;
use tracing::info;

/// Full application router with configuration read from file/env.
pub async fn app() -> anyhow::Result<Router> {
    let config = AppConfig::load()?;
    app_with(config).await
}

/// Full application router for an explicit configuration, on the system clock.
pub async fn app_with(config: AppConfig) -> anyhow::Result<Router> {
    info!(
        debug_routes = config.debug_routes,
        metrics = config.metrics_enabled,
        cors = config.cors_permissive,
        "building statistics router"
    );
    let stats = Arc::new(SlidingWindowAggregator::new());
    router(AppState::new(stats, config))
}
