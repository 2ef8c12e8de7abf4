//! Tool listing and invocation

use axum::{
    extract::{Path, State},
    Json,
};
use marag_common::errors::{AppError, Result};
use marag_context::tool::{ToolRegistry, ToolSpec};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct ToolList {
    pub tools: Vec<ToolSpec>,
}

pub async fn list_tools() -> Json<ToolList> {
    Json(ToolList {
        tools: ToolRegistry::specs(),
    })
}

/// Invoke a tool with the request body as its arguments
pub async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(args): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    if !ToolRegistry::contains(&name) {
        return Err(AppError::Validation {
            message: format!("unknown tool: {}", name),
            field: Some("name".to_string()),
        });
    }

    let result = state.invoke_tool(&name, args).await?;
    Ok(Json(result))
}
