//! Marag API Gateway
//!
//! HTTP front end for the adaptive retrieval orchestrator.
//! Handles:
//! - Question answering and tool invocation
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use marag_common::{config::AppConfig, errors::{AppError, Result}, metrics};
use marag_context::{Orchestrator, RunOutcome, ToolRegistry};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<Orchestrator>,
    /// Parent of every per-request cancellation token
    pub shutdown: CancellationToken,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            config,
            orchestrator,
            shutdown: CancellationToken::new(),
        }
    }

    /// Answer a question in its own orchestrator invocation
    pub async fn answer(&self, question: &str) -> Result<RunOutcome> {
        self.with_cancel(|cancel| self.orchestrator.run_with_cancel(question, cancel))
            .await
    }

    /// Invoke a registered tool in its own orchestrator invocation
    pub async fn invoke_tool(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.with_cancel(|cancel| ToolRegistry::invoke(&self.orchestrator, name, args, cancel))
            .await
    }

    /// Run `call` with a fresh child of the shutdown token. The token fires
    /// on server shutdown, on request timeout and when the handler future
    /// is dropped because the client went away.
    async fn with_cancel<F, Fut, T>(&self, call: F) -> Result<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cancel = self.shutdown.child_token();
        let _guard = cancel.clone().drop_guard();

        match tokio::time::timeout(self.request_timeout, call(cancel)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout {
                timeout_ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting Marag API Gateway v{}",
        marag_common::VERSION
    );
    config.validate()?;
    let config = Arc::new(config);

    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .add_global_label("service", config.observability.service_name.clone())
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "Metrics exporter listening");
    }
    metrics::register_metrics();

    let orchestrator = Arc::new(Orchestrator::from_config(&config).await?);
    let state = AppState::new(config.clone(), orchestrator);
    let shutdown = state.shutdown.clone();
    let grace = config.shutdown_timeout();

    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!(grace_secs = grace.as_secs(), "Draining in-flight requests");
            // In-flight runs get the grace period, then are cancelled
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                warn!("Grace period elapsed, cancelling in-flight runs");
                shutdown.cancel();
            });
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        .route("/answer", post(handlers::answer::answer))
        .route("/tools", get(handlers::tools::list_tools))
        .route("/tools/{name}", post(handlers::tools::invoke_tool));

    let limits = &state.config.rate_limit;
    if limits.enabled {
        let limiter =
            middleware::rate_limit::create_rate_limiter(limits.requests_per_second, limits.burst);
        let limit = limits.requests_per_second;
        api_routes = api_routes.layer(axum::middleware::from_fn(
            move |request: axum::extract::Request, next: axum::middleware::Next| {
                middleware::rate_limit::rate_limit_middleware(request, next, limiter.clone(), limit)
            },
        ));
    }

    Router::new()
        // Health endpoints (never rate limited)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
