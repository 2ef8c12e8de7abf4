//! Question answering handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use marag_common::errors::{AppError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct AnswerRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub run_id: Uuid,
    pub retrieval_count: u32,
    pub web_search_count: u32,
}

/// Run one orchestrator invocation for the posted question
pub async fn answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>> {
    if request.question.trim().is_empty() {
        return Err(AppError::Validation {
            message: "question must not be blank".to_string(),
            field: Some("question".to_string()),
        });
    }
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("question".to_string()),
    })?;

    let outcome = state.answer(&request.question).await?;

    tracing::info!(
        run_id = %outcome.run_id,
        retrievals = outcome.retrieval_count,
        web_searches = outcome.web_search_count,
        generations = outcome.generation_count,
        "Answer accepted"
    );

    Ok(Json(AnswerResponse {
        answer: outcome.answer,
        run_id: outcome.run_id,
        retrieval_count: outcome.retrieval_count,
        web_search_count: outcome.web_search_count,
    }))
}
