use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
#[cfg(target_os = "linux")]
use prometheus::process_collector::ProcessCollector;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{error, warn};

use crate::{http_server::AppState, services::auth_events::AuthEventBus};

lazy_static! {
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    )
    .unwrap();
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("http_request_duration_seconds", "HTTP request duration in seconds").buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0
        ]),
        &["method", "endpoint"]
    )
    .unwrap();
    pub static ref HTTP_REQUESTS_IN_FLIGHT: IntGauge = IntGauge::new(
        "http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();
    pub static ref HTTP_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("http_errors_total", "Total number of HTTP errors"),
        &["method", "endpoint", "status"]
    )
    .unwrap();

    // Authentication outcomes, fed from the auth event bus
    pub static ref AUTH_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("auth_events_total", "Total number of authentication events"),
        &["kind"]
    )
    .unwrap();

    // Outbound calls to the OAuth provider and the Ethereum RPC
    pub static ref PROVIDER_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("provider_calls_total", "Total number of outbound provider calls"),
        &["operation", "outcome"]
    )
    .unwrap();
    pub static ref PROVIDER_CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("provider_call_duration_seconds", "Outbound provider call duration in seconds")
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation"]
    )
    .unwrap();
}

#[derive(Debug, Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        #[cfg(target_os = "linux")]
        {
            let process_collector = ProcessCollector::for_self();
            registry.register(Box::new(process_collector)).unwrap();
        }

        registry.register(Box::new(HTTP_REQUESTS_TOTAL.clone())).unwrap();
        registry.register(Box::new(HTTP_REQUEST_DURATION.clone())).unwrap();
        registry.register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone())).unwrap();
        registry.register(Box::new(HTTP_ERRORS_TOTAL.clone())).unwrap();

        registry.register(Box::new(AUTH_EVENTS_TOTAL.clone())).unwrap();
        registry.register(Box::new(PROVIDER_CALLS_TOTAL.clone())).unwrap();
        registry.register(Box::new(PROVIDER_CALL_DURATION.clone())).unwrap();

        Self {
            registry: Arc::new(registry),
        }
    }
}

/// Collapses ids and wallet addresses so label cardinality stays bounded.
/// Example: /wallets/0xd8dA...6045/links/42 -> wallets/:address/links/:id
pub fn normalize_path(path: &str) -> String {
    let path_only = path.split('?').next().unwrap_or(path);

    path_only
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.len() == 42 && s.starts_with("0x") {
                ":address"
            } else if s.parse::<i64>().is_ok() || s.len() == 36 {
                ":id"
            } else {
                s
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub async fn track_metrics(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if path == "/metrics" {
        return next.run(req).await;
    }

    let endpoint = normalize_path(&path);

    HTTP_REQUESTS_IN_FLIGHT.inc();
    let start = Instant::now();

    let response = next.run(req).await;

    HTTP_REQUEST_DURATION
        .with_label_values(&[method.as_str(), &endpoint])
        .observe(start.elapsed().as_secs_f64());

    let status = response.status();
    let status_str = status.as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), &endpoint, &status_str])
        .inc();

    if status.is_client_error() || status.is_server_error() {
        HTTP_ERRORS_TOTAL
            .with_label_values(&[method.as_str(), &endpoint, &status_str])
            .inc();
    }

    HTTP_REQUESTS_IN_FLIGHT.dec();

    response
}

/// Times an outbound call and counts it by outcome.
///
/// # Arguments
/// * `operation` - e.g. "token_exchange", "jwks_fetch"
/// * `f` - the call to measure
pub async fn track_provider_call<T, E, F>(operation: &str, f: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = f.await;

    PROVIDER_CALL_DURATION
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());

    let outcome = if result.is_ok() { "ok" } else { "error" };
    PROVIDER_CALLS_TOTAL.with_label_values(&[operation, outcome]).inc();

    result
}

/// Counts every event published on `bus` until the bus is dropped.
pub fn spawn_auth_event_observer(bus: &AuthEventBus) -> JoinHandle<()> {
    let mut receiver = bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => AUTH_EVENTS_TOTAL.with_label_values(&[event.kind()]).inc(),
                Err(RecvError::Lagged(skipped)) => warn!("Auth event observer skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Failed to encode metrics"),
        );
    }

    match String::from_utf8(buffer) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Metrics output is not valid UTF-8: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("Failed to encode metrics"),
            )
        }
    }
}
