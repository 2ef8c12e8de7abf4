//! Tool wrapper exposing the orchestrator to agent frameworks
//!
//! Tools are a static table from name to description, JSON-Schema
//! argument spec and a typed handler.

use crate::orchestrator::{Answer, Orchestrator};
use marag_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use validator::Validate;

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send + 'a>>;

type Handler =
    for<'a> fn(&'a Orchestrator, serde_json::Value, CancellationToken) -> ToolFuture<'a>;

/// Description of a tool as advertised to callers
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

struct ToolEntry {
    name: &'static str,
    description: &'static str,
    parameters: fn() -> serde_json::Value,
    handler: Handler,
}

const DATA_NODE_DESCRIPTION: &str = "Fetch internal data or online sources for one specific query. \
Ask for a single data point per call and include units (for example 'GDP of the US for 2020 in USD'); \
split broad questions into several specific queries.";

static TOOLS: &[ToolEntry] = &[ToolEntry {
    name: "data_node_tool",
    description: DATA_NODE_DESCRIPTION,
    parameters: data_node_parameters,
    handler: invoke_data_node,
}];

/// Arguments of `data_node_tool`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DataNodeArgs {
    /// The query to be processed for fetching data
    #[validate(length(min = 1, max = 2000))]
    pub query: String,
}

fn data_node_parameters() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The query to be processed for fetching data"
            }
        },
        "required": ["query"]
    })
}

fn invoke_data_node(
    orchestrator: &Orchestrator,
    args: serde_json::Value,
    cancel: CancellationToken,
) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: DataNodeArgs = serde_json::from_value(args).map_err(|e| AppError::Validation {
            message: format!("invalid arguments: {}", e),
            field: None,
        })?;
        if args.query.trim().is_empty() {
            return Err(AppError::Validation {
                message: "query must not be blank".to_string(),
                field: Some("query".to_string()),
            });
        }
        args.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: Some("query".to_string()),
        })?;

        let outcome = orchestrator.run_with_cancel(&args.query, cancel).await?;
        Ok(serde_json::to_value(Answer {
            answer: outcome.answer,
        })?)
    })
}

/// Static registry of the tools this crate provides
pub struct ToolRegistry;

impl ToolRegistry {
    pub fn specs() -> Vec<ToolSpec> {
        TOOLS
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name,
                description: tool.description,
                parameters: (tool.parameters)(),
            })
            .collect()
    }

    pub fn contains(name: &str) -> bool {
        TOOLS.iter().any(|tool| tool.name == name)
    }

    /// Run a tool by name with JSON arguments; `cancel` stops the run early
    pub async fn invoke(
        orchestrator: &Orchestrator,
        name: &str,
        args: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<serde_json::Value> {
        let tool = TOOLS
            .iter()
            .find(|tool| tool.name == name)
            .ok_or_else(|| AppError::Validation {
                message: format!("unknown tool: {}", name),
                field: Some("name".to_string()),
            })?;
        (tool.handler)(orchestrator, args, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judgment::testing::FnJudge;
    use crate::judgment::{Adequacy, Grounding, JudgmentRequest, JudgmentResponse, Relevance};
    use marag_common::config::OrchestratorConfig;
    use marag_common::evidence::{Passage, SourceKind};
    use marag_search::EvidenceSource;
    use std::sync::Arc;

    struct OnePassage(SourceKind);

    #[async_trait::async_trait]
    impl EvidenceSource for OnePassage {
        async fn retrieve(&self, query: &str) -> Result<Vec<Passage>> {
            Ok(vec![Passage::new(format!("about {}", query), self.0)])
        }

        fn kind(&self) -> SourceKind {
            self.0
        }
    }

    fn orchestrator() -> Orchestrator {
        let judge = Arc::new(FnJudge(|request: JudgmentRequest<'_>| {
            Ok(match request {
                JudgmentRequest::Route { .. } => JudgmentResponse::Route(SourceKind::DocumentIndex),
                JudgmentRequest::GradeRelevance { .. } => {
                    JudgmentResponse::Relevance(Relevance::Relevant)
                }
                JudgmentRequest::Synthesize { question, .. } => {
                    JudgmentResponse::Text(format!("answer to {}", question))
                }
                JudgmentRequest::GradeGrounding { .. } => {
                    JudgmentResponse::Grounding(Grounding::Supported)
                }
                JudgmentRequest::GradeAnswer { .. } => {
                    JudgmentResponse::Adequacy(Adequacy::Addresses)
                }
                JudgmentRequest::Rewrite { question } => JudgmentResponse::Text(question.into()),
            })
        }));
        Orchestrator::new(
            judge,
            Arc::new(OnePassage(SourceKind::DocumentIndex)),
            Arc::new(OnePassage(SourceKind::WebSearch)),
            &OrchestratorConfig::default(),
        )
    }

    #[test]
    fn test_specs_list_data_node_tool() {
        let specs = ToolRegistry::specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "data_node_tool");
        assert_eq!(specs[0].parameters["required"], serde_json::json!(["query"]));
        assert!(ToolRegistry::contains("data_node_tool"));
        assert!(!ToolRegistry::contains("npv_tool"));
    }

    #[tokio::test]
    async fn test_invoke_runs_orchestrator() {
        let result = ToolRegistry::invoke(
            &orchestrator(),
            "data_node_tool",
            serde_json::json!({ "query": "GDP of the US for 2020" }),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(
            result,
            serde_json::json!({ "answer": "answer to GDP of the US for 2020" })
        );
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected() {
        let orchestrator = orchestrator();
        for args in [
            serde_json::json!({}),
            serde_json::json!({ "query": "" }),
            serde_json::json!({ "query": "   " }),
        ] {
            let err =
                ToolRegistry::invoke(&orchestrator, "data_node_tool", args, CancellationToken::new())
                    .await
                    .unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }));
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = ToolRegistry::invoke(
            &orchestrator(),
            "missing",
            serde_json::json!({}),
            CancellationToken::new(),
        )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_tool_run() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ToolRegistry::invoke(
            &orchestrator(),
            "data_node_tool",
            serde_json::json!({ "query": "GDP of the US for 2020" }),
            cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
    }
}
