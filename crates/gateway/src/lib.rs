//! HTTP gateway for IronQuill.
//!
//! One axum router: the SSE chat endpoint plus health, usage, and model
//! listing. Handlers stay thin; everything they need hangs off a shared
//! [`AppState`] assembled from an [`AppConfig`].

pub mod api;
pub mod registry;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::{DateTime, Utc};
use ironquill_config::AppConfig;
use ironquill_core::{MemoryStore, Provider, SessionError, ValidationError};
use ironquill_memory::build_store;
use ironquill_providers::build_provider;
use ironquill_relay::{SessionConfig, TurnDefaults, TurnRunner};
use ironquill_telemetry::{ModelPricing, TelemetryEngine};
use registry::ModelRegistry;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppState {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub memory: Option<Arc<dyn MemoryStore>>,
    pub telemetry: Arc<TelemetryEngine>,
    pub registry: Arc<ModelRegistry>,
    pub runner: TurnRunner,
    pub defaults: TurnDefaults,
    pub started_at: DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Assemble provider, memory store, telemetry, and the turn runner
    /// from configuration. Background tasks are not spawned here; `start`
    /// owns those.
    pub fn from_config(config: AppConfig) -> SharedState {
        let provider = build_provider(&config);
        let memory = build_store(&config);

        let telemetry =
            Arc::new(TelemetryEngine::new().with_retention(config.telemetry.retain_turns));
        for (model, price) in &config.telemetry.custom_pricing {
            telemetry.pricing().set(
                model.clone(),
                ModelPricing::new(price.input_per_m, price.output_per_m),
            );
        }

        let mut runner = TurnRunner::new(provider.clone(), telemetry.clone())
            .with_temperature(config.defaults.temperature)
            .with_max_tokens((config.defaults.max_tokens > 0).then_some(config.defaults.max_tokens))
            .with_memory_limit(config.memory.limit);
        if let Some(store) = &memory {
            runner = runner.with_memory(store.clone());
        }

        let defaults = TurnDefaults {
            model: config.provider.default_model.clone(),
            system_prompt: config.defaults.system_prompt.clone(),
        };

        Arc::new(AppState {
            provider,
            memory,
            telemetry,
            registry: Arc::new(ModelRegistry::new()),
            runner,
            defaults,
            started_at: Utc::now(),
            config,
        })
    }

    /// Per-turn session settings from the stream config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            heartbeat_interval: self.config.stream.heartbeat_interval(),
            channel_capacity: self.config.stream.channel_capacity,
        }
    }
}

/// Errors a request can hit before any SSE bytes are written.
///
/// Once streaming has begun the transport is committed to 200; failures
/// from that point travel inside the stream as `error` events instead.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Validation(e) => (StatusCode::BAD_REQUEST, e.code()),
            Self::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let body = ErrorBody {
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api::v1_router())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start the gateway HTTP server. Serves until ctrl-c (or SIGTERM on
/// unix), then drains in-flight requests.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = AppState::from_config(config);

    let refresher = state
        .registry
        .spawn_refresher(state.provider.clone(), registry::REFRESH_PERIOD);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresher.abort();
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, draining");
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: &'static str,
    version: &'static str,
    uptime_secs: i64,
    provider: String,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: "ironquill",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        provider: state.provider.name().to_string(),
    })
}
