//! Question router

use crate::judgment::{Judge, JudgmentRequest, JudgmentResponse};
use marag_common::errors::{AppError, Result};
use marag_common::evidence::SourceKind;
use std::sync::Arc;

/// Chooses the evidence source a run starts from
pub struct Router {
    judge: Arc<dyn Judge>,
}

impl Router {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    /// Classify the question. There is no fallback source: any failure,
    /// including an unrecognised label, is a routing failure.
    pub async fn route(&self, question: &str) -> Result<SourceKind> {
        let request = JudgmentRequest::Route { question };
        match self.judge.judge(request).await {
            Ok(JudgmentResponse::Route(kind)) => Ok(kind),
            Ok(other) => Err(AppError::RoutingFailed {
                message: other.mismatch(request.kind()),
            }),
            Err(e @ AppError::RoutingFailed { .. }) => Err(e),
            Err(e) => Err(AppError::RoutingFailed {
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judgment::testing::FnJudge;

    #[tokio::test]
    async fn test_routes_to_returned_source() {
        let router = Router::new(Arc::new(FnJudge(|_: JudgmentRequest<'_>| {
            Ok(JudgmentResponse::Route(SourceKind::WebSearch))
        })));
        assert_eq!(router.route("who won?").await.unwrap(), SourceKind::WebSearch);
    }

    #[tokio::test]
    async fn test_wrong_variant_is_routing_failure() {
        let router = Router::new(Arc::new(FnJudge(|_: JudgmentRequest<'_>| {
            Ok(JudgmentResponse::Text("vectorstore".into()))
        })));
        let err = router.route("q").await.unwrap_err();
        assert!(matches!(err, AppError::RoutingFailed { .. }));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_upstream_error_becomes_routing_failure() {
        let router = Router::new(Arc::new(FnJudge(|_: JudgmentRequest<'_>| {
            Err(AppError::LlmError {
                message: "503".into(),
            })
        })));
        let err = router.route("q").await.unwrap_err();
        assert!(matches!(err, AppError::RoutingFailed { .. }));
        assert!(err.to_string().contains("503"));
    }
}
