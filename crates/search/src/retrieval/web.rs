//! Web search source (Tavily-compatible API)
//!
//! Result contents are joined with newlines into a single passage, so the
//! downstream grader sees the web results as one piece of evidence.

use super::EvidenceSource;
use marag_common::config::WebSearchConfig;
use marag_common::errors::{AppError, Result};
use marag_common::evidence::{Passage, SourceKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct WebSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_results: usize,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    url: Option<String>,
    content: String,
}

fn search_error(message: String) -> AppError {
    AppError::RetrievalFailed {
        source_kind: SourceKind::WebSearch,
        message,
    }
}

impl WebSearch {
    pub fn new(config: &WebSearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_results: config.max_results,
        })
    }
}

#[async_trait::async_trait]
impl EvidenceSource for WebSearch {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>> {
        let response = self
            .client
            .post(format!("{}/search", self.endpoint))
            .json(&SearchRequest {
                api_key: &self.api_key,
                query,
                max_results: self.max_results,
            })
            .send()
            .await
            .map_err(|e| search_error(format!("Web search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(search_error(format!("Web search error {}: {}", status, body)));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| search_error(format!("Failed to parse web search response: {}", e)))?;

        let results: Vec<SearchResult> = body.results.into_iter().take(self.max_results).collect();
        tracing::debug!(count = results.len(), "Web search results");
        if results.is_empty() {
            return Ok(Vec::new());
        }

        let origin = results.first().and_then(|r| r.url.clone());
        let text = results
            .into_iter()
            .map(|r| r.content)
            .collect::<Vec<_>>()
            .join("\n");

        let passage = Passage::new(text, SourceKind::WebSearch);
        Ok(vec![match origin {
            Some(url) => passage.with_origin(url),
            None => passage,
        }])
    }

    fn kind(&self) -> SourceKind {
        SourceKind::WebSearch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> WebSearchConfig {
        WebSearchConfig {
            endpoint: server.uri(),
            api_key: "tvly-test".to_string(),
            ..WebSearchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_results_concatenated_into_one_passage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({
                "query": "nfl draft first pick",
                "max_results": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "url": "https://a.example", "content": "First result." },
                    { "url": "https://b.example", "content": "Second result." }
                ]
            })))
            .mount(&server)
            .await;

        let search = WebSearch::new(&config_for(&server)).unwrap();
        let passages = search.retrieve("nfl draft first pick").await.unwrap();

        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "First result.\nSecond result.");
        assert_eq!(passages[0].source, SourceKind::WebSearch);
        assert_eq!(passages[0].origin.as_deref(), Some("https://a.example"));
    }

    #[tokio::test]
    async fn test_no_results_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [] })))
            .mount(&server)
            .await;

        let search = WebSearch::new(&config_for(&server)).unwrap();
        assert!(search.retrieve("q").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_is_retrieval_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let search = WebSearch::new(&config_for(&server)).unwrap();
        let err = search.retrieve("q").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::RetrievalFailed {
                source_kind: SourceKind::WebSearch,
                ..
            }
        ));
        assert!(err.to_string().contains("invalid key"));
    }
}
