//! HTTP request handlers: scrape endpoint, health and collector status.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use tracing::{debug, error};

use winperf_core::exposition;

use crate::state::{AppState, StatusSnapshot};

/// Header Prometheus sets to announce its scrape timeout.
pub(crate) const SCRAPE_TIMEOUT_HEADER: &str = "X-Prometheus-Scrape-Timeout-Seconds";

// ============================================================
// Health
// ============================================================

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================
// Metrics
// ============================================================

pub(crate) async fn handle_metrics(State(state): AppState, headers: HeaderMap) -> Response {
    let announced = announced_timeout(&headers);

    let mut scheduler = state.scheduler.lock().await;
    let timeout = scheduler.config().effective_timeout(announced);
    let outcome = scheduler.scrape(timeout).await;
    let collectors = scheduler.descriptors();
    drop(scheduler);

    debug!(
        timeout_ms = timeout.as_millis() as u64,
        failed = outcome.failed_count(),
        "scrape served"
    );
    state.record(collectors, outcome.summary());

    match exposition::render(&outcome.metrics) {
        Ok(body) => ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn announced_timeout(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(SCRAPE_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
}

// ============================================================
// Collectors
// ============================================================

pub(crate) async fn handle_collectors(State(state): AppState) -> Json<StatusSnapshot> {
    Json(state.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_announced_timeout() {
        let mut headers = HeaderMap::new();
        assert_eq!(announced_timeout(&headers), None);

        headers.insert(SCRAPE_TIMEOUT_HEADER, HeaderValue::from_static("9.5"));
        assert_eq!(announced_timeout(&headers), Some(9.5));

        headers.insert(SCRAPE_TIMEOUT_HEADER, HeaderValue::from_static("soon"));
        assert_eq!(announced_timeout(&headers), None);
    }
}
