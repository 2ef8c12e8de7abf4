//! Evidence source abstraction
//!
//! Two families share one trait:
//! - Document index (remote vector store or in-memory), top-K passages
//! - Web search, bounded results concatenated into one passage

mod memory;
mod remote;
mod web;

pub use memory::MemoryIndex;
pub use remote::RemoteIndex;
pub use web::WebSearch;

use marag_common::config::{AppConfig, IndexBackend};
use marag_common::embeddings::create_embedder;
use marag_common::errors::Result;
use marag_common::evidence::{Passage, SourceKind};
use std::sync::Arc;

/// Common trait for all evidence sources
#[async_trait::async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Retrieve passages for the query; an empty result is not an error
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>>;

    /// Which family this source belongs to
    fn kind(&self) -> SourceKind;
}

/// Build the configured document-index source
pub async fn build_document_source(config: &AppConfig) -> Result<Arc<dyn EvidenceSource>> {
    match config.index.backend {
        IndexBackend::Remote => {
            tracing::info!(url = %config.index.url, top_k = config.index.top_k, "Using remote document index");
            Ok(Arc::new(RemoteIndex::new(&config.index)?))
        }
        IndexBackend::Memory => {
            let embedder = create_embedder(&config.embedding)?;
            let index = MemoryIndex::new(embedder, config.index.top_k);
            if let Some(dir) = &config.index.data_dir {
                let chunks = index.ingest_dir(dir).await?;
                tracing::info!(data_dir = %dir, chunks, "Loaded in-memory document index");
            } else {
                tracing::warn!("In-memory document index has no data_dir; retrievals will be empty");
            }
            Ok(Arc::new(index))
        }
    }
}

/// Build the web-search source
pub fn build_web_source(config: &AppConfig) -> Result<Arc<dyn EvidenceSource>> {
    Ok(Arc::new(WebSearch::new(&config.web_search)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_without_data_dir_is_empty() {
        let mut config = AppConfig::default();
        config.index.backend = IndexBackend::Memory;
        let source = build_document_source(&config).await.unwrap();
        assert_eq!(source.kind(), SourceKind::DocumentIndex);
        assert!(source.retrieve("anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_backend_kind() {
        let config = AppConfig::default();
        let source = build_document_source(&config).await.unwrap();
        assert_eq!(source.kind(), SourceKind::DocumentIndex);

        let web = build_web_source(&config).unwrap();
        assert_eq!(web.kind(), SourceKind::WebSearch);
    }
}
