use axum::{routing::get, Router};
use metrics::{describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::window::WINDOW_MILLIS;

// The recorder is process-global; every router built afterwards shares it.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish the
    /// static window-length gauge.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new().install_recorder()?;
                describe();
                anyhow::Ok(handle)
            })?
            .clone();

        gauge!("window_duration_ms").set(WINDOW_MILLIS as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("transactions_recorded_total", "Transactions merged into the window");
    describe_counter!(
        "transactions_rejected_total",
        "Transactions refused, labelled by reason"
    );
    describe_counter!(
        "transactions_expired_on_arrival_total",
        "Accepted transactions whose second had already left the window"
    );
    describe_counter!("statistics_queries_total", "Snapshots served");
    describe_counter!(
        "window_stale_buckets_cleared_total",
        "Buckets reset lazily during snapshots"
    );
}
