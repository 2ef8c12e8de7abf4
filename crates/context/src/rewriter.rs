//! Query rewriter

use crate::judgment::{Judge, JudgmentRequest, JudgmentResponse};
use std::sync::Arc;
use tracing::{info, warn};

/// Rewrites a question for better retrieval. A failed or empty rewrite
/// keeps the current question.
pub struct QueryRewriter {
    judge: Arc<dyn Judge>,
}

impl QueryRewriter {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    pub async fn rewrite(&self, question: &str) -> String {
        let request = JudgmentRequest::Rewrite { question };
        match self.judge.judge(request).await {
            Ok(JudgmentResponse::Text(text)) if !text.trim().is_empty() => {
                let rewritten = text.trim().to_string();
                info!(original = %question, rewritten = %rewritten, "Question rewritten");
                rewritten
            }
            Ok(JudgmentResponse::Text(_)) => {
                warn!("Rewrite returned empty text, keeping question");
                question.to_string()
            }
            Ok(other) => {
                warn!(error = %other.mismatch(request.kind()), "Rewrite failed, keeping question");
                question.to_string()
            }
            Err(e) => {
                warn!(error = %e, "Rewrite failed, keeping question");
                question.to_string()
            }
        }
    }
}
