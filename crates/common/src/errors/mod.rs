//! Error types for MARAG
//!
//! Provides the orchestration error taxonomy with:
//! - Distinct variants for routing, retrieval, grading, synthesis and budget failures
//! - Recoverable vs. fatal classification used by the orchestrator
//! - HTTP status code mapping and structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evidence::SourceKind;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Orchestration errors (2xxx)
    RoutingFailed,
    RetrievalFailed,
    GradingFailed,
    SynthesisFailed,
    BudgetExhausted,

    // Run control (3xxx)
    Cancelled,
    Timeout,

    // Rate limiting (6xxx)
    RateLimited,

    // External service errors (8xxx)
    UpstreamError,
    LlmError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::RoutingFailed => 2001,
            ErrorCode::RetrievalFailed => 2002,
            ErrorCode::GradingFailed => 2003,
            ErrorCode::SynthesisFailed => 2004,
            ErrorCode::BudgetExhausted => 2005,

            ErrorCode::Cancelled => 3001,
            ErrorCode::Timeout => 3002,

            ErrorCode::RateLimited => 6001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::LlmError => 8002,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Orchestration errors
    #[error("Routing failed: {message}")]
    RoutingFailed { message: String },

    #[error("Retrieval from {source_kind} failed: {message}")]
    RetrievalFailed {
        source_kind: SourceKind,
        message: String,
    },

    #[error("Grading failed: {message}")]
    GradingFailed { message: String },

    #[error("Synthesis failed: {message}")]
    SynthesisFailed { message: String },

    #[error(
        "Budget exhausted: {reason} (retrievals={retrievals}, web_searches={web_searches}, generations={generations})"
    )]
    BudgetExhausted {
        reason: String,
        retrievals: u32,
        web_searches: u32,
        generations: u32,
    },

    // Run control
    #[error("Run cancelled")]
    Cancelled,

    #[error("Run timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // External service errors
    #[error("LLM service error: {message}")]
    LlmError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::RoutingFailed { .. } => ErrorCode::RoutingFailed,
            AppError::RetrievalFailed { .. } => ErrorCode::RetrievalFailed,
            AppError::GradingFailed { .. } => ErrorCode::GradingFailed,
            AppError::SynthesisFailed { .. } => ErrorCode::SynthesisFailed,
            AppError::BudgetExhausted { .. } => ErrorCode::BudgetExhausted,
            AppError::Cancelled => ErrorCode::Cancelled,
            AppError::Timeout { .. } => ErrorCode::Timeout,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::LlmError { .. } => ErrorCode::LlmError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 408 Request Timeout
            AppError::Cancelled => StatusCode::REQUEST_TIMEOUT,

            // 422 Unprocessable Entity
            AppError::BudgetExhausted { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::RoutingFailed { .. }
            | AppError::RetrievalFailed { .. }
            | AppError::GradingFailed { .. }
            | AppError::SynthesisFailed { .. }
            | AppError::LlmError { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Failures the orchestrator absorbs locally with a safe default
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::RetrievalFailed { .. } | AppError::GradingFailed { .. }
        )
    }

    /// Retries and escalation were used up; distinct from a tool error
    pub fn is_budget_exhausted(&self) -> bool {
        matches!(self, AppError::BudgetExhausted { .. })
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::BudgetExhausted {
                retrievals,
                web_searches,
                generations,
                ..
            } => Some(serde_json::json!({
                "retrievals": retrievals,
                "web_searches": web_searches,
                "generations": generations,
            })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::RoutingFailed {
            message: "unknown label".into(),
        };
        assert_eq!(err.code(), ErrorCode::RoutingFailed);
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_recoverable_classification() {
        let retrieval = AppError::RetrievalFailed {
            source_kind: SourceKind::WebSearch,
            message: "connection reset".into(),
        };
        let grading = AppError::GradingFailed {
            message: "bad label".into(),
        };
        let synthesis = AppError::SynthesisFailed {
            message: "empty".into(),
        };
        assert!(retrieval.is_recoverable());
        assert!(grading.is_recoverable());
        assert!(!synthesis.is_recoverable());
    }

    #[test]
    fn test_budget_exhausted_is_distinct() {
        let err = AppError::BudgetExhausted {
            reason: "web search budget spent".into(),
            retrievals: 2,
            web_searches: 2,
            generations: 3,
        };
        assert!(err.is_budget_exhausted());
        assert!(err.is_client_error());
        assert_eq!(err.code().as_code(), 2005);
        assert!(err.to_string().contains("retrievals=2"));
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "question is empty".into(),
            field: Some("question".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_retrieval_message_names_source() {
        let err = AppError::RetrievalFailed {
            source_kind: SourceKind::DocumentIndex,
            message: "index offline".into(),
        };
        assert_eq!(
            err.to_string(),
            "Retrieval from document_index failed: index offline"
        );
    }
}
