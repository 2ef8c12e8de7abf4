//! MARAG Common Library
//!
//! Shared code for all MARAG crates including:
//! - Error taxonomy and HTTP mapping
//! - Configuration management
//! - Chat-completion client used by the judgment layer
//! - Embedding client abstraction
//! - Evidence types shared by sources and the orchestrator
//! - Metrics and observability
//! - Answer text cleanup

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod evidence;
pub mod llm;
pub mod metrics;
pub mod text;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use evidence::{Passage, SourceKind};
pub use llm::LlmClient;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default chat model used for every judgment call
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default embedding dimension for the in-memory index
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
