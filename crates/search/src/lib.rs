//! MARAG evidence sources
//!
//! Every source answers `retrieve(query) -> Vec<Passage>`:
//! - Remote document index speaking the Pathway retrieve protocol
//! - In-process cosine-similarity index over an embedder
//! - Tavily-compatible web search

pub mod retrieval;

pub use retrieval::{
    build_document_source, build_web_source, EvidenceSource, MemoryIndex, RemoteIndex, WebSearch,
};
