//! Remote vector store client
//!
//! Speaks the Pathway document-store protocol: `POST {url}/v1/retrieve`
//! with the query, `k`, and an optional metadata filter. Results come
//! back ordered by ascending distance.

use super::EvidenceSource;
use marag_common::config::IndexConfig;
use marag_common::errors::{AppError, Result};
use marag_common::evidence::{Passage, SourceKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Document index backed by a remote vector store
pub struct RemoteIndex {
    client: reqwest::Client,
    url: String,
    top_k: usize,
    metadata_filter: Option<String>,
}

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata_filter: Option<&'a str>,
}

#[derive(Deserialize)]
struct RetrievedDocument {
    text: String,
    #[serde(default)]
    dist: Option<f32>,
    #[serde(default)]
    metadata: serde_json::Value,
}

fn retrieval_error(message: String) -> AppError {
    AppError::RetrievalFailed {
        source_kind: SourceKind::DocumentIndex,
        message,
    }
}

impl RemoteIndex {
    /// Create a new remote index client
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            top_k: config.top_k,
            metadata_filter: config.metadata_filter.clone(),
        })
    }
}

#[async_trait::async_trait]
impl EvidenceSource for RemoteIndex {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>> {
        let request = RetrieveRequest {
            query,
            k: self.top_k,
            metadata_filter: self.metadata_filter.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/v1/retrieve", self.url))
            .json(&request)
            .send()
            .await
            .map_err(|e| retrieval_error(format!("Index request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(retrieval_error(format!("Index error {}: {}", status, body)));
        }

        let documents: Vec<RetrievedDocument> = response
            .json()
            .await
            .map_err(|e| retrieval_error(format!("Failed to parse index response: {}", e)))?;

        let passages: Vec<Passage> = documents
            .into_iter()
            .take(self.top_k)
            .map(|doc| {
                let mut passage = Passage::new(doc.text, SourceKind::DocumentIndex);
                if let Some(path) = doc.metadata.get("path").and_then(|p| p.as_str()) {
                    passage = passage.with_origin(path);
                }
                if let Some(dist) = doc.dist {
                    passage = passage.with_score(1.0 - dist);
                }
                passage
            })
            .collect();

        tracing::debug!(count = passages.len(), top_k = self.top_k, "Remote index retrieval");
        Ok(passages)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::DocumentIndex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, top_k: usize) -> IndexConfig {
        IndexConfig {
            url: server.uri(),
            top_k,
            ..IndexConfig::default()
        }
    }

    #[tokio::test]
    async fn test_retrieve_maps_documents_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/retrieve"))
            .and(body_json(serde_json::json!({ "query": "revenue 2023", "k": 10 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "text": "Revenue grew 12%.", "dist": 0.1, "metadata": { "path": "filings/10k.pdf" } },
                { "text": "Operating costs fell.", "dist": 0.3, "metadata": {} }
            ])))
            .mount(&server)
            .await;

        let index = RemoteIndex::new(&config_for(&server, 10)).unwrap();
        let passages = index.retrieve("revenue 2023").await.unwrap();

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].text, "Revenue grew 12%.");
        assert_eq!(passages[0].origin.as_deref(), Some("filings/10k.pdf"));
        assert_eq!(passages[1].origin, None);
        assert!(passages[0].score > passages[1].score);
    }

    #[tokio::test]
    async fn test_metadata_filter_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "query": "q",
                "k": 2,
                "metadata_filter": "contains(path, `10k`)"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server, 2);
        config.metadata_filter = Some("contains(path, `10k`)".to_string());
        let index = RemoteIndex::new(&config).unwrap();
        assert!(index.retrieve("q").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_retrieval_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let index = RemoteIndex::new(&config_for(&server, 10)).unwrap();
        let err = index.retrieve("q").await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            AppError::RetrievalFailed {
                source_kind: SourceKind::DocumentIndex,
                ..
            }
        ));
    }
}
