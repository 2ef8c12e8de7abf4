//! Answer synthesizer

use crate::judgment::{Judge, JudgmentRequest, JudgmentResponse};
use marag_common::errors::{AppError, Result};
use marag_common::evidence::Passage;
use marag_common::text::strip_search_queries;
use std::sync::Arc;

/// Generates an answer from the question and the current evidence.
///
/// Empty evidence is allowed and produces a no-context generation. Any
/// failure, including an answer that is empty after cleanup, is a
/// synthesis failure; there is no silent empty answer.
pub struct AnswerSynthesizer {
    judge: Arc<dyn Judge>,
}

impl AnswerSynthesizer {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    pub async fn synthesize(&self, question: &str, evidence: &[Passage]) -> Result<String> {
        let request = JudgmentRequest::Synthesize { question, evidence };
        let text = match self.judge.judge(request).await {
            Ok(JudgmentResponse::Text(text)) => text,
            Ok(other) => {
                return Err(AppError::SynthesisFailed {
                    message: other.mismatch(request.kind()),
                })
            }
            Err(e @ (AppError::Cancelled | AppError::Timeout { .. })) => return Err(e),
            Err(e) => {
                return Err(AppError::SynthesisFailed {
                    message: e.to_string(),
                })
            }
        };

        let answer = strip_search_queries(&text);
        if answer.is_empty() {
            return Err(AppError::SynthesisFailed {
                message: "model returned an empty answer".to_string(),
            });
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judgment::testing::FnJudge;
    use marag_common::evidence::SourceKind;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_answer_is_cleaned() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(FnJudge(|_: JudgmentRequest<'_>| {
            Ok(JudgmentResponse::Text(
                "Short-term and long-term.\n### Search Queries\n- memory".into(),
            ))
        })));
        let evidence = vec![Passage::new("memory types", SourceKind::DocumentIndex)];
        assert_eq!(
            synthesizer.synthesize("q", &evidence).await.unwrap(),
            "Short-term and long-term."
        );
    }

    #[tokio::test]
    async fn test_empty_evidence_still_generates() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(FnJudge(|request: JudgmentRequest<'_>| {
            match request {
                JudgmentRequest::Synthesize { evidence, .. } if evidence.is_empty() => {
                    Ok(JudgmentResponse::Text("I don't know.".into()))
                }
                _ => Ok(JudgmentResponse::Text("unexpected".into())),
            }
        })));
        assert_eq!(synthesizer.synthesize("q", &[]).await.unwrap(), "I don't know.");
    }

    #[tokio::test]
    async fn test_empty_answer_is_synthesis_failure() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(FnJudge(|_: JudgmentRequest<'_>| {
            Ok(JudgmentResponse::Text("### Search Queries\nonly queries".into()))
        })));
        let err = synthesizer.synthesize("q", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::SynthesisFailed { .. }));
    }

    #[tokio::test]
    async fn test_upstream_error_is_synthesis_failure() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(FnJudge(|_: JudgmentRequest<'_>| {
            Err(AppError::LlmError {
                message: "500".into(),
            })
        })));
        let err = synthesizer.synthesize("q", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::SynthesisFailed { .. }));
        assert!(!err.is_recoverable());
    }
}
