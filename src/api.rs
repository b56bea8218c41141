use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics::counter;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::amount;
use crate::config::AppConfig;
use crate::error::StatsError;
use crate::rolling::SlidingWindowAggregator;
use crate::statistics::StatisticsSnapshot;
use crate::telemetry::Metrics;
use crate::window::WindowInfo;

#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<SlidingWindowAggregator>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(stats: Arc<SlidingWindowAggregator>, config: AppConfig) -> Self {
        Self {
            stats,
            config: Arc::new(config),
        }
    }
}

/// Build the public router. Optional routes follow `state.config`.
pub fn router(state: AppState) -> anyhow::Result<Router> {
    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/transactions", post(create_transaction))
        .route("/statistics", get(statistics));

    if state.config.debug_routes {
        app = app.route("/debug/window", get(debug_window));
    }
    if state.config.metrics_enabled {
        app = app.merge(Metrics::init()?.router::<AppState>());
    }
    if state.config.cors_permissive {
        app = app.layer(CorsLayer::very_permissive());
    }

    Ok(app.with_state(state))
}

/// Wire shape of a submitted transaction. Both fields are optional here so
/// that absence is reported as a client error rather than a parse failure.
#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl TransactionRequest {
    fn validate(self) -> Result<(f64, i64), StatsError> {
        let amount = self
            .amount
            .ok_or(StatsError::MissingField("The transaction's amount can not be null"))?;
        let timestamp = self
            .timestamp
            .ok_or(StatsError::MissingField("The transaction's time stamp can not be null"))?;
        Ok((amount, timestamp))
    }
}

impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        match self {
            // Not a failure from the client's point of view; nothing to report.
            StatsError::InvalidTimestamp => StatusCode::NO_CONTENT.into_response(),
            StatsError::MissingField(_) | StatsError::InvalidAmount => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            StatsError::AggregateOverflow { .. } => {
                warn!(error = %self, "transaction not recorded");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The transaction could not be recorded",
                )
                    .into_response()
            }
        }
    }
}

async fn create_transaction(
    State(state): State<AppState>,
    body: Result<Json<Option<TransactionRequest>>, JsonRejection>,
) -> Result<StatusCode, Response> {
    let Json(body) = body.map_err(|rejection| {
        debug!(status = %rejection.status(), "malformed transaction payload");
        counter!("transactions_rejected_total", "reason" => "malformed").increment(1);
        (StatusCode::BAD_REQUEST, "Malformed transaction payload").into_response()
    })?;

    let (amount, timestamp) = body
        .ok_or(StatsError::MissingField("The transaction can not be null"))
        .and_then(TransactionRequest::validate)
        .map_err(|e| {
            counter!("transactions_rejected_total", "reason" => e.reason()).increment(1);
            e.into_response()
        })?;

    // Engine-side failures are counted by the aggregator itself.
    let amount = amount::from_f64(amount).map_err(|e| {
        counter!("transactions_rejected_total", "reason" => e.reason()).increment(1);
        e.into_response()
    })?;
    state
        .stats
        .record(amount, timestamp)
        .map_err(IntoResponse::into_response)?;

    Ok(StatusCode::CREATED)
}

async fn statistics(State(state): State<AppState>) -> Json<StatisticsSnapshot> {
    Json(state.stats.snapshot())
}

async fn debug_window(State(state): State<AppState>) -> Json<WindowInfo> {
    Json(state.stats.window_info())
}
