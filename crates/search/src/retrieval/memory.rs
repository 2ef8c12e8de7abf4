//! In-process document index
//!
//! Stores embedded chunks in memory and ranks them by cosine similarity.

use super::EvidenceSource;
use marag_common::embeddings::{cosine_similarity, Embedder};
use marag_common::errors::{AppError, Result};
use marag_common::evidence::{Passage, SourceKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Paragraphs are packed into chunks of at most this many characters
const MAX_CHUNK_CHARS: usize = 1000;

struct IndexedChunk {
    text: String,
    origin: Option<String>,
    embedding: Vec<f32>,
}

/// Cosine-similarity index over an embedder
pub struct MemoryIndex {
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    chunks: RwLock<Vec<IndexedChunk>>,
}

impl MemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            embedder,
            top_k,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Embed and store documents, optionally tagged with their origin
    pub async fn add_documents(&self, documents: &[(String, Option<String>)]) -> Result<usize> {
        let texts: Vec<String> = documents.iter().map(|(text, _)| text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(AppError::RetrievalFailed {
                source_kind: SourceKind::DocumentIndex,
                message: format!(
                    "Embedder returned {} vectors for {} documents",
                    embeddings.len(),
                    documents.len()
                ),
            });
        }

        let mut chunks = self.chunks.write().await;
        for ((text, origin), embedding) in documents.iter().zip(embeddings) {
            chunks.push(IndexedChunk {
                text: text.clone(),
                origin: origin.clone(),
                embedding,
            });
        }
        Ok(documents.len())
    }

    /// Load every `.txt` and `.md` file in `dir`, chunked by paragraph
    pub async fn ingest_dir(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(dir.as_ref()).await?;
        let mut paths: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_text = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext, "txt" | "md"));
            if is_text {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            let content = tokio::fs::read_to_string(&path).await?;
            let origin = path.display().to_string();
            for chunk in chunk_paragraphs(&content, MAX_CHUNK_CHARS) {
                documents.push((chunk, Some(origin.clone())));
            }
        }

        if documents.is_empty() {
            return Ok(0);
        }
        self.add_documents(&documents).await
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

/// Pack blank-line separated paragraphs into chunks up to `max_chars`.
/// A single paragraph longer than the limit becomes its own chunk.
fn chunk_paragraphs(content: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.len() + paragraph.len() + 2 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait::async_trait]
impl EvidenceSource for MemoryIndex {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>> {
        let chunks = self.chunks.read().await;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let mut scored: Vec<(f32, &IndexedChunk)> = chunks
            .iter()
            .map(|chunk| (cosine_similarity(&query_embedding, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(self.top_k)
            .map(|(score, chunk)| {
                let passage =
                    Passage::new(chunk.text.clone(), SourceKind::DocumentIndex).with_score(score);
                match &chunk.origin {
                    Some(origin) => passage.with_origin(origin.clone()),
                    None => passage,
                }
            })
            .collect())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::DocumentIndex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marag_common::embeddings::HashEmbedder;
    use pretty_assertions::assert_eq;

    fn index(top_k: usize) -> MemoryIndex {
        MemoryIndex::new(Arc::new(HashEmbedder::new(256)), top_k)
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_passages() {
        let index = index(10);
        assert!(index.is_empty().await);
        assert!(index.retrieve("anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ranks_by_similarity_and_bounds_k() {
        let index = index(2);
        index
            .add_documents(&[
                ("the bears won the football game".to_string(), None),
                ("agent memory stores past observations".to_string(), Some("agents.md".to_string())),
                ("quarterly revenue rose sharply".to_string(), None),
            ])
            .await
            .unwrap();
        assert_eq!(index.len().await, 3);

        let passages = index.retrieve("what is agent memory").await.unwrap();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].text, "agent memory stores past observations");
        assert_eq!(passages[0].origin.as_deref(), Some("agents.md"));
        assert_eq!(passages[0].source, SourceKind::DocumentIndex);
    }

    #[test]
    fn test_chunk_paragraphs_packs_and_splits() {
        let content = "aaaa\n\nbbbb\n\n\n\ncccc";
        assert_eq!(chunk_paragraphs(content, 10), vec!["aaaa\n\nbbbb", "cccc"]);
        assert_eq!(chunk_paragraphs(content, 3), vec!["aaaa", "bbbb", "cccc"]);
        assert!(chunk_paragraphs("   \n\n  ", 100).is_empty());
    }

    #[tokio::test]
    async fn test_ingest_dir_reads_text_files() {
        let dir = std::env::temp_dir().join(format!("marag-ingest-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("a.md"), "Agent memory.\n\nTool use.").await.unwrap();
        tokio::fs::write(dir.join("b.bin"), "ignored").await.unwrap();

        let index = index(10);
        let chunks = index.ingest_dir(&dir).await.unwrap();
        assert_eq!(chunks, 1);

        let passages = index.retrieve("agent memory").await.unwrap();
        assert_eq!(passages.len(), 1);
        assert!(passages[0].origin.as_deref().unwrap().ends_with("a.md"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
