//! Per-request counters and latency histograms

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use marag_common::metrics::RequestMetrics;

/// Record method, matched route and status of every request
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let timer = RequestMetrics::start(request.method().as_str(), &endpoint);

    let response = next.run(request).await;
    timer.finish(response.status().as_u16());
    response
}
