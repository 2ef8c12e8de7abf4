//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use crate::AppState;
use marag_common::config::IndexBackend;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: ReadyChecks,
}

#[derive(Serialize)]
pub struct ReadyChecks {
    pub llm: CheckResult,
    pub document_index: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn up(detail: impl Into<String>) -> Self {
        Self {
            status: "up".to_string(),
            detail: Some(detail.into()),
        }
    }

    fn down(detail: impl Into<String>) -> Self {
        Self {
            status: "down".to_string(),
            detail: Some(detail.into()),
        }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: marag_common::VERSION,
    })
}

/// Readiness probe - 503 until the model and index are configured
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let llm = if state.config.llm.api_key.is_empty() {
        CheckResult::down("no API key configured")
    } else {
        CheckResult::up(state.config.llm.model.clone())
    };

    let index = &state.config.index;
    let document_index = match index.backend {
        IndexBackend::Remote if index.url.is_empty() => CheckResult::down("no index URL configured"),
        IndexBackend::Remote => CheckResult::up(index.url.clone()),
        IndexBackend::Memory => CheckResult::up("in-memory"),
    };

    let all_healthy = llm.is_up() && document_index.is_up();

    let status = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
            checks: ReadyChecks {
                llm,
                document_index,
            },
        }),
    )
}
