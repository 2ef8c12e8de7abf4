//! Configuration management for MARAG services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{AppError, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat model used for routing, grading, rewriting and synthesis
    #[serde(default)]
    pub llm: LlmConfig,

    /// Document index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding configuration (in-memory index only)
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Web search configuration
    #[serde(default)]
    pub web_search: WebSearchConfig,

    /// Retry and escalation budgets
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key; empty disables the live client
    #[serde(default)]
    pub api_key: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Per-request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Maximum attempts for transient failures
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
}

/// Document index backend
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    /// Remote vector store speaking the Pathway retrieve protocol
    Remote,
    /// In-process cosine-similarity index
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Backend to use
    #[serde(default = "default_index_backend")]
    pub backend: IndexBackend,

    /// Base URL of the remote vector store
    #[serde(default = "default_index_url")]
    pub url: String,

    /// Number of passages returned per retrieval
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Optional JMESPath metadata filter forwarded to the remote store
    #[serde(default)]
    pub metadata_filter: Option<String>,

    /// Directory of .txt/.md files loaded into the in-memory index at startup
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, hash
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebSearchConfig {
    /// Search API base URL
    #[serde(default = "default_web_endpoint")]
    pub endpoint: String,

    /// API key
    #[serde(default)]
    pub api_key: String,

    /// Results requested per query
    #[serde(default = "default_web_results")]
    pub max_results: usize,

    /// Request timeout in seconds
    #[serde(default = "default_web_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Document-index retrievals allowed before escalating to web search
    #[serde(default = "default_max_retrievals")]
    pub max_retrievals: u32,

    /// Web searches allowed per run
    #[serde(default = "default_max_web_searches")]
    pub max_web_searches: u32,

    /// Consecutive regenerations on the same evidence after an ungrounded answer
    #[serde(default = "default_max_regenerations")]
    pub max_regenerations: u32,

    /// Wall-clock budget for one run in seconds (0 disables)
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Passages graded concurrently (1 grades sequentially)
    #[serde(default = "default_grading_concurrency")]
    pub grading_concurrency: usize,

    /// What the document index holds; the router prefers it for these topics
    #[serde(default = "default_corpus_description")]
    pub corpus_description: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 120 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_llm_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_llm_model() -> String { crate::DEFAULT_CHAT_MODEL.to_string() }
fn default_llm_timeout() -> u64 { 30 }
fn default_llm_retries() -> u32 { 3 }
fn default_index_backend() -> IndexBackend { IndexBackend::Remote }
fn default_index_url() -> String { "http://localhost:8767".to_string() }
fn default_top_k() -> usize { 10 }
fn default_index_timeout() -> u64 { 15 }
fn default_embedding_provider() -> String { "hash".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_web_endpoint() -> String { "https://api.tavily.com".to_string() }
fn default_web_results() -> usize { 3 }
fn default_web_timeout() -> u64 { 15 }
fn default_max_retrievals() -> u32 { 2 }
fn default_max_web_searches() -> u32 { 2 }
fn default_max_regenerations() -> u32 { 2 }
fn default_run_timeout() -> u64 { 180 }
fn default_grading_concurrency() -> usize { 4 }
fn default_corpus_description() -> String { "financial documents such as company filings, annual reports and earnings statements".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "marag".to_string() }
fn default_rate_limit() -> u32 { 10 }
fn default_burst() -> u32 { 20 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__ORCHESTRATOR__MAX_RETRIEVALS=3
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.orchestrator.validate()?;
        if self.index.top_k == 0 {
            return Err(AppError::Configuration {
                message: "index.top_k must be at least 1".to_string(),
            });
        }
        if self.web_search.max_results == 0 {
            return Err(AppError::Configuration {
                message: "web_search.max_results must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retrievals == 0 {
            return Err(AppError::Configuration {
                message: "orchestrator.max_retrievals must be at least 1".to_string(),
            });
        }
        if self.max_web_searches == 0 {
            return Err(AppError::Configuration {
                message: "orchestrator.max_web_searches must be at least 1".to_string(),
            });
        }
        if self.grading_concurrency == 0 {
            return Err(AppError::Configuration {
                message: "orchestrator.grading_concurrency must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Run deadline, if one is configured
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout(),
            max_retries: default_llm_retries(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            url: default_index_url(),
            top_k: default_top_k(),
            metadata_filter: None,
            data_dir: None,
            timeout_secs: default_index_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
        }
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_web_endpoint(),
            api_key: String::new(),
            max_results: default_web_results(),
            timeout_secs: default_web_timeout(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retrievals: default_max_retrievals(),
            max_web_searches: default_max_web_searches(),
            max_regenerations: default_max_regenerations(),
            run_timeout_secs: default_run_timeout(),
            grading_concurrency: default_grading_concurrency(),
            corpus_description: default_corpus_description(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}
