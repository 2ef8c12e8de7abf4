//! Judgment capability
//!
//! Every model-backed decision (routing, the three graders, rewriting and
//! synthesis) goes through one [`Judge`] with a request variant per call
//! type. The orchestrator only sees typed verdicts, so tests can script
//! them without a live model.

mod llm;

pub use llm::LlmJudge;

use async_trait::async_trait;
use marag_common::errors::Result;
use marag_common::evidence::{Passage, SourceKind};
use serde::{Deserialize, Serialize};

/// Relevance of one passage to the question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    Relevant,
    NotRelevant,
}

/// Whether an answer is supported by the evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grounding {
    Supported,
    Unsupported,
}

/// Whether an answer resolves the question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adequacy {
    Addresses,
    DoesNotAddress,
}

/// A judgment call and its inputs
#[derive(Debug, Clone, Copy)]
pub enum JudgmentRequest<'a> {
    Route {
        question: &'a str,
    },
    GradeRelevance {
        question: &'a str,
        passage: &'a Passage,
    },
    Synthesize {
        question: &'a str,
        evidence: &'a [Passage],
    },
    GradeGrounding {
        evidence: &'a [Passage],
        answer: &'a str,
    },
    GradeAnswer {
        question: &'a str,
        answer: &'a str,
    },
    Rewrite {
        question: &'a str,
    },
}

impl JudgmentRequest<'_> {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            JudgmentRequest::Route { .. } => "route",
            JudgmentRequest::GradeRelevance { .. } => "grade_relevance",
            JudgmentRequest::Synthesize { .. } => "synthesize",
            JudgmentRequest::GradeGrounding { .. } => "grade_grounding",
            JudgmentRequest::GradeAnswer { .. } => "grade_answer",
            JudgmentRequest::Rewrite { .. } => "rewrite",
        }
    }
}

/// Typed result of a judgment call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgmentResponse {
    Route(SourceKind),
    Relevance(Relevance),
    Grounding(Grounding),
    Adequacy(Adequacy),
    Text(String),
}

impl JudgmentResponse {
    fn variant(&self) -> &'static str {
        match self {
            JudgmentResponse::Route(_) => "route",
            JudgmentResponse::Relevance(_) => "relevance",
            JudgmentResponse::Grounding(_) => "grounding",
            JudgmentResponse::Adequacy(_) => "adequacy",
            JudgmentResponse::Text(_) => "text",
        }
    }

    /// Describe a response that does not fit the request it answered
    pub fn mismatch(&self, request_kind: &str) -> String {
        format!(
            "judge returned a {} response to a {} request",
            self.variant(),
            request_kind
        )
    }
}

/// Capability interface for all model-backed decisions
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, request: JudgmentRequest<'_>) -> Result<JudgmentResponse>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_kinds_are_distinct() {
        let passage = Passage::new("p", SourceKind::DocumentIndex);
        let kinds = [
            JudgmentRequest::Route { question: "q" }.kind(),
            JudgmentRequest::GradeRelevance {
                question: "q",
                passage: &passage,
            }
            .kind(),
            JudgmentRequest::Synthesize {
                question: "q",
                evidence: &[],
            }
            .kind(),
            JudgmentRequest::GradeGrounding {
                evidence: &[],
                answer: "a",
            }
            .kind(),
            JudgmentRequest::GradeAnswer {
                question: "q",
                answer: "a",
            }
            .kind(),
            JudgmentRequest::Rewrite { question: "q" }.kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn test_mismatch_message() {
        let response = JudgmentResponse::Text("hello".into());
        assert_eq!(
            response.mismatch("route"),
            "judge returned a text response to a route request"
        );
    }
}
