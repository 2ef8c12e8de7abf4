//! Judge backed by a chat-completion model
//!
//! Labelled judgments ask for a JSON object and read a single field:
//! `datasource` (`vectorstore` | `web_search`) for routing and
//! `binary_score` (`yes` | `no`) for the graders. Labels are matched
//! case-insensitively; anything else is a failed judgment.

use super::{Adequacy, Grounding, Judge, JudgmentRequest, JudgmentResponse, Relevance};
use async_trait::async_trait;
use marag_common::errors::{AppError, Result};
use marag_common::evidence::{format_passages, SourceKind};
use marag_common::llm::{LlmClient, Prompt};
use marag_common::metrics;
use std::sync::Arc;
use std::time::Instant;

const RELEVANCE_SYSTEM: &str = "You grade whether a retrieved document is relevant to a user question. \
A document is relevant if it contains keywords or meaning related to the question; the test does not need to be strict. \
Respond with a JSON object {\"binary_score\": \"yes\"} or {\"binary_score\": \"no\"}.";

const GROUNDING_SYSTEM: &str = "You grade whether an answer is grounded in and supported by a set of retrieved facts. \
Respond with a JSON object {\"binary_score\": \"yes\"} if every claim is supported, otherwise {\"binary_score\": \"no\"}.";

const ADEQUACY_SYSTEM: &str = "You grade whether an answer addresses and resolves a question. \
Respond with a JSON object {\"binary_score\": \"yes\"} or {\"binary_score\": \"no\"}.";

const REWRITE_SYSTEM: &str = "You rewrite a question into a better version optimized for document and web retrieval. \
Reason about the underlying intent and reply with the rewritten question only.";

const SYNTHESIS_SYSTEM: &str = "You answer questions using the retrieved context. \
If the context does not contain the answer, say that you don't know. Keep the answer concise.";

pub struct LlmJudge {
    client: Arc<LlmClient>,
    corpus_description: String,
}

impl LlmJudge {
    /// `corpus_description` tells the router what the document index holds
    pub fn new(client: Arc<LlmClient>, corpus_description: impl Into<String>) -> Self {
        Self {
            client,
            corpus_description: corpus_description.into(),
        }
    }

    fn route_system(&self) -> String {
        format!(
            "You route a user question to a vectorstore or to web search. \
The vectorstore contains {}. Use the vectorstore for questions on these topics; otherwise use web search. \
Respond with a JSON object {{\"datasource\": \"vectorstore\"}} or {{\"datasource\": \"web_search\"}}.",
            self.corpus_description
        )
    }

    fn prompt_for(&self, request: &JudgmentRequest<'_>) -> Prompt {
        match *request {
            JudgmentRequest::Route { question } => Prompt::json(self.route_system(), question),
            JudgmentRequest::GradeRelevance { question, passage } => Prompt::json(
                RELEVANCE_SYSTEM,
                format!(
                    "Retrieved document:\n\n{}\n\nUser question: {}",
                    passage.text, question
                ),
            ),
            JudgmentRequest::Synthesize { question, evidence } => Prompt::text(
                SYNTHESIS_SYSTEM,
                format!(
                    "Question: {}\n\nContext:\n{}\n\nAnswer:",
                    question,
                    format_passages(evidence)
                ),
            ),
            JudgmentRequest::GradeGrounding { evidence, answer } => Prompt::json(
                GROUNDING_SYSTEM,
                format!(
                    "Set of facts:\n\n{}\n\nLLM generation: {}",
                    format_passages(evidence),
                    answer
                ),
            ),
            JudgmentRequest::GradeAnswer { question, answer } => Prompt::json(
                ADEQUACY_SYSTEM,
                format!("User question:\n\n{}\n\nLLM generation: {}", question, answer),
            ),
            JudgmentRequest::Rewrite { question } => Prompt::text(
                REWRITE_SYSTEM,
                format!(
                    "Here is the initial question:\n\n{}\n\nFormulate an improved question.",
                    question
                ),
            ),
        }
    }

    fn interpret(request: &JudgmentRequest<'_>, content: String) -> Result<JudgmentResponse> {
        match request {
            JudgmentRequest::Route { .. } => {
                let label = read_label(&content, "datasource")
                    .map_err(|message| AppError::RoutingFailed { message })?;
                match label.as_str() {
                    "vectorstore" => Ok(JudgmentResponse::Route(SourceKind::DocumentIndex)),
                    "web_search" => Ok(JudgmentResponse::Route(SourceKind::WebSearch)),
                    other => Err(AppError::RoutingFailed {
                        message: format!("unknown datasource label: {}", other),
                    }),
                }
            }
            JudgmentRequest::GradeRelevance { .. } => Ok(JudgmentResponse::Relevance(
                if read_binary_score(&content)? {
                    Relevance::Relevant
                } else {
                    Relevance::NotRelevant
                },
            )),
            JudgmentRequest::GradeGrounding { .. } => Ok(JudgmentResponse::Grounding(
                if read_binary_score(&content)? {
                    Grounding::Supported
                } else {
                    Grounding::Unsupported
                },
            )),
            JudgmentRequest::GradeAnswer { .. } => Ok(JudgmentResponse::Adequacy(
                if read_binary_score(&content)? {
                    Adequacy::Addresses
                } else {
                    Adequacy::DoesNotAddress
                },
            )),
            JudgmentRequest::Synthesize { .. } | JudgmentRequest::Rewrite { .. } => {
                Ok(JudgmentResponse::Text(content))
            }
        }
    }
}

/// Read a string field from a JSON object reply, lowercased and trimmed
fn read_label(content: &str, field: &str) -> std::result::Result<String, String> {
    let value: serde_json::Value = serde_json::from_str(content.trim())
        .map_err(|e| format!("reply is not a JSON object: {}", e))?;
    value
        .get(field)
        .and_then(serde_json::Value::as_str)
        .map(|label| label.trim().to_ascii_lowercase())
        .ok_or_else(|| format!("reply has no string field `{}`", field))
}

fn read_binary_score(content: &str) -> Result<bool> {
    let label = read_label(content, "binary_score")
        .map_err(|message| AppError::GradingFailed { message })?;
    match label.as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        other => Err(AppError::GradingFailed {
            message: format!("unknown binary_score label: {}", other),
        }),
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge(&self, request: JudgmentRequest<'_>) -> Result<JudgmentResponse> {
        let started = Instant::now();
        let prompt = self.prompt_for(&request);

        let result = match self.client.complete(&prompt).await {
            Ok(content) => Self::interpret(&request, content),
            Err(e) => Err(e),
        };

        metrics::record_judgment(
            started.elapsed().as_secs_f64(),
            request.kind(),
            result.is_ok(),
        );
        if let Err(e) = &result {
            tracing::warn!(kind = request.kind(), error = %e, "Judgment call failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marag_common::config::LlmConfig;
    use marag_common::evidence::Passage;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn judge_replying(content: &str) -> (MockServer, LlmJudge) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": content } }]
            })))
            .mount(&server)
            .await;
        let judge = judge_for(&server);
        (server, judge)
    }

    fn judge_for(server: &MockServer) -> LlmJudge {
        let client = LlmClient::new(LlmConfig {
            endpoint: format!("{}/v1/chat/completions", server.uri()),
            api_key: "test-key".to_string(),
            ..LlmConfig::default()
        })
        .unwrap();
        LlmJudge::new(Arc::new(client), "company filings")
    }

    #[tokio::test]
    async fn test_route_labels() {
        let (_server, judge) = judge_replying("{\"datasource\": \"VectorStore\"}").await;
        let response = judge
            .judge(JudgmentRequest::Route { question: "10-K revenue?" })
            .await
            .unwrap();
        assert_eq!(response, JudgmentResponse::Route(SourceKind::DocumentIndex));

        let (_server, judge) = judge_replying("{\"datasource\": \"web_search\"}").await;
        let response = judge
            .judge(JudgmentRequest::Route { question: "Who won?" })
            .await
            .unwrap();
        assert_eq!(response, JudgmentResponse::Route(SourceKind::WebSearch));
    }

    #[tokio::test]
    async fn test_unknown_route_label_fails() {
        let (_server, judge) = judge_replying("{\"datasource\": \"library\"}").await;
        let err = judge
            .judge(JudgmentRequest::Route { question: "q" })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RoutingFailed { .. }));
    }

    #[tokio::test]
    async fn test_router_prompt_names_corpus() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("company filings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "{\"datasource\": \"vectorstore\"}" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let judge = judge_for(&server);
        judge
            .judge(JudgmentRequest::Route { question: "q" })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_binary_scores() {
        let passage = Passage::new("Revenue grew.", SourceKind::DocumentIndex);

        let (_server, judge) = judge_replying("{\"binary_score\": \"Yes\"}").await;
        let response = judge
            .judge(JudgmentRequest::GradeRelevance {
                question: "revenue?",
                passage: &passage,
            })
            .await
            .unwrap();
        assert_eq!(response, JudgmentResponse::Relevance(Relevance::Relevant));

        let (_server, judge) = judge_replying("{\"binary_score\": \"no\"}").await;
        let response = judge
            .judge(JudgmentRequest::GradeGrounding {
                evidence: std::slice::from_ref(&passage),
                answer: "Revenue fell.",
            })
            .await
            .unwrap();
        assert_eq!(response, JudgmentResponse::Grounding(Grounding::Unsupported));
    }

    #[tokio::test]
    async fn test_malformed_grade_is_grading_failure() {
        let (_server, judge) = judge_replying("definitely").await;
        let err = judge
            .judge(JudgmentRequest::GradeAnswer {
                question: "q",
                answer: "a",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GradingFailed { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_text_judgments_pass_through() {
        let (_server, judge) = judge_replying("What were 2023 revenues?").await;
        let response = judge
            .judge(JudgmentRequest::Rewrite {
                question: "revenue",
            })
            .await
            .unwrap();
        assert_eq!(
            response,
            JudgmentResponse::Text("What were 2023 revenues?".to_string())
        );
    }
}
