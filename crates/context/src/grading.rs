//! Relevance, grounding and adequacy graders
//!
//! A failed judgment never aborts a run here. Each grader falls back to
//! its conservative verdict (not relevant, unsupported, does not address)
//! and logs the failure.

use crate::judgment::{Adequacy, Grounding, Judge, JudgmentRequest, JudgmentResponse, Relevance};
use futures::stream::{self, StreamExt};
use marag_common::errors::{AppError, Result};
use marag_common::evidence::Passage;
use std::sync::Arc;
use tracing::{debug, warn};

fn mismatch(response: &JudgmentResponse, request: &JudgmentRequest<'_>) -> AppError {
    AppError::GradingFailed {
        message: response.mismatch(request.kind()),
    }
}

/// Filters passages to those graded relevant, one independent call each
pub struct RelevanceGrader {
    judge: Arc<dyn Judge>,
    concurrency: usize,
}

impl RelevanceGrader {
    pub fn new(judge: Arc<dyn Judge>, concurrency: usize) -> Self {
        Self {
            judge,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn grade(&self, question: &str, passage: &Passage) -> Result<Relevance> {
        let request = JudgmentRequest::GradeRelevance { question, passage };
        match self.judge.judge(request).await? {
            JudgmentResponse::Relevance(verdict) => Ok(verdict),
            other => Err(mismatch(&other, &request)),
        }
    }

    /// Keep the relevant passages in their original order
    pub async fn filter(&self, question: &str, passages: Vec<Passage>) -> Vec<Passage> {
        let total = passages.len();
        let kept: Vec<Passage> = stream::iter(passages)
            .map(|passage| async move {
                let verdict = match self.grade(question, &passage).await {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        warn!(error = %e, "Relevance grading failed, treating passage as not relevant");
                        Relevance::NotRelevant
                    }
                };
                (passage, verdict)
            })
            .buffered(self.concurrency)
            .filter_map(|(passage, verdict)| async move {
                (verdict == Relevance::Relevant).then_some(passage)
            })
            .collect()
            .await;

        debug!(total, relevant = kept.len(), "Relevance filtering complete");
        kept
    }
}

/// Checks an answer against the evidence it was generated from
pub struct GroundingGrader {
    judge: Arc<dyn Judge>,
}

impl GroundingGrader {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    pub async fn grade(&self, evidence: &[Passage], answer: &str) -> Grounding {
        let request = JudgmentRequest::GradeGrounding { evidence, answer };
        let result = match self.judge.judge(request).await {
            Ok(JudgmentResponse::Grounding(verdict)) => Ok(verdict),
            Ok(other) => Err(mismatch(&other, &request)),
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "Grounding grading failed, treating answer as unsupported");
            Grounding::Unsupported
        })
    }
}

/// Checks whether an answer resolves the question
pub struct AdequacyGrader {
    judge: Arc<dyn Judge>,
}

impl AdequacyGrader {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    pub async fn grade(&self, question: &str, answer: &str) -> Adequacy {
        let request = JudgmentRequest::GradeAnswer { question, answer };
        let result = match self.judge.judge(request).await {
            Ok(JudgmentResponse::Adequacy(verdict)) => Ok(verdict),
            Ok(other) => Err(mismatch(&other, &request)),
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "Adequacy grading failed, treating answer as off-target");
            Adequacy::DoesNotAddress
        })
    }
}
