//! HTTP presentation layer for Tollgate
//!
//! Serves the pay-per-call `/v1/chat/completions` proxy plus liveness,
//! readiness and transaction-log endpoints on top of axum.

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tollgate_adapter_x402::FacilitatorGate;
use tollgate_connector_inference::InferenceClient;
use tollgate_core::correlation::REQUEST_ID_HEADER;
use tollgate_core::payment::{PaymentChallenge, PAYMENT_RESPONSE_HEADER};
use tollgate_core::prelude::*;
use tollgate_core::CompletionPipeline;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{self, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

pub mod config;
pub mod handlers;
mod middleware;
mod models;
mod telemetry;

pub use config::{LogFormat, ServiceConfig, ENV_PREFIX};
pub use models::*;
pub use telemetry::init_tracing;

/// Tollgate HTTP server
pub struct TollgateServer {
    state: AppState,
}

impl TollgateServer {
    /// Create a server around an already-built pipeline
    pub fn new(config: ServiceConfig, pipeline: CompletionPipeline) -> Self {
        Self {
            state: AppState {
                pipeline: Arc::new(pipeline),
                config: Arc::new(config),
            },
        }
    }

    /// Build the upstream connector, payment gate and pipeline from configuration.
    ///
    /// Missing credentials are reported but do not prevent start-up; the
    /// affected requests fail with a configuration error instead.
    pub fn from_config(config: ServiceConfig) -> Result<Self, CoreError> {
        let upstream = InferenceClient::new(config.inference())?;
        let gate = FacilitatorGate::new(config.facilitator())?;

        if let Err(reason) = upstream.check_configured() {
            warn!("Upstream not configured: {}", reason);
        }
        if let Err(reason) = gate.check_configured() {
            warn!("Payment gate not configured: {}", reason);
        }

        let pipeline = CompletionPipeline::new(Arc::new(upstream), Arc::new(gate), config.policy());
        Ok(Self::new(config, pipeline))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.state.config
    }

    /// The axum router with all routes and middleware
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Bind and serve until Ctrl-C or SIGTERM, then drain in-flight requests
    pub async fn serve(&self) -> Result<(), PresentationError> {
        let address = self
            .state
            .config
            .bind_address()
            .map_err(|e| PresentationError::StartupFailed(e.to_string()))?;

        let listener = tokio::net::TcpListener::bind(address)
            .await
            .map_err(|e| PresentationError::StartupFailed(format!("Failed to bind to {}: {}", address, e)))?;

        let policy = self.state.pipeline.policy();
        info!(
            "Tollgate listening on {} (correlation={}, charge={})",
            address, policy.correlation, policy.charge
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| PresentationError::ShutdownFailed(format!("Server error: {}", e)))?;

        info!("Tollgate stopped");
        Ok(())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CompletionPipeline>,
    pub config: Arc<ServiceConfig>,
}

/// Build the router for the given state
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins());
    let static_dir = state.config.static_dir.clone();

    let mut router = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route(handlers::chat::CHAT_COMPLETIONS_PATH, post(handlers::chat::chat_completions))
        .route("/v1/transaction-log", post(handlers::transaction::log_transaction))
        .with_state(state);

    if let Some(dir) = static_dir {
        info!("Serving static files from {}", dir.display());
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(from_fn(middleware::request_logging))
            .layer(from_fn(middleware::security_headers))
            .layer(cors)
            .layer(CatchPanicLayer::custom(panic_response)),
    )
}

/// Generic 500 for a request whose handler panicked
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    error!("Request handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("Internal server error")),
    )
        .into_response()
}

/// CORS for the configured origins; any origin when none are configured
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let exposed: Vec<HeaderName> = [PAYMENT_RESPONSE_HEADER, REQUEST_ID_HEADER]
        .iter()
        .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods(cors::Any)
        .allow_headers(cors::Any)
        .expose_headers(exposed);

    if origins.is_empty() {
        return layer.allow_origin(cors::Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("Failed to register SIGTERM handler: {}", e);
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
        _ = ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c().await
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await
        }
    }
}

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            request_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
            details: None,
            request_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_request_id(mut self, request_id: Option<&CorrelationId>) -> Self {
        self.request_id = request_id.map(|id| id.to_string());
        self
    }
}

/// Body of a 402 response: the x402 challenge plus the request id
#[derive(Debug, Serialize)]
struct PaymentRequiredBody {
    #[serde(flatten)]
    challenge: PaymentChallenge,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

/// Echo the correlation id on a response
pub(crate) fn set_request_id(response: &mut Response, id: &CorrelationId) {
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}

/// Convert core errors to HTTP responses
pub fn handle_core_error(error: CoreError, request_id: Option<&CorrelationId>) -> Response {
    let tag = request_id.map(|id| id.as_str()).unwrap_or("-");

    let (status, body) = match error {
        CoreError::Validation(e) => {
            warn!("[{}] invalid request: {}", tag, e);
            let details = serde_json::to_value(&e.violations).unwrap_or(Value::Null);
            (
                StatusCode::BAD_REQUEST,
                ApiResponse::<()>::error(format!("Invalid request: {}", e.summary())).with_details(details),
            )
        }
        CoreError::MissingCorrelationId => (
            StatusCode::BAD_REQUEST,
            ApiResponse::<()>::error(CoreError::MissingCorrelationId.to_string()),
        ),
        CoreError::Upstream(e) => {
            let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, ApiResponse::<()>::error(e.user_message()))
        }
        CoreError::Payment(e) => match e {
            PaymentError::Required { reason, requirements } | PaymentError::Rejected { reason, requirements } => {
                let body = PaymentRequiredBody {
                    challenge: PaymentChallenge::new(reason, requirements),
                    request_id: request_id.map(|id| id.to_string()),
                };
                let mut response = (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response();
                if let Some(id) = request_id {
                    set_request_id(&mut response, id);
                }
                return response;
            }
            PaymentError::Facilitator(msg) => {
                error!("[{}] payment facilitator error: {}", tag, msg);
                (
                    StatusCode::BAD_GATEWAY,
                    ApiResponse::<()>::error("Payment service unavailable"),
                )
            }
            PaymentError::Config(msg) => {
                error!("[{}] payment configuration error: {}", tag, msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::<()>::error("Server configuration error"),
                )
            }
        },
        CoreError::Configuration(msg) => {
            error!("[{}] configuration error: {}", tag, msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::<()>::error("Server configuration error"),
            )
        }
        CoreError::Internal(msg) => {
            error!("[{}] internal error: {}", tag, msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::<()>::error("Internal server error"),
            )
        }
    };

    let mut response = (status, Json(body.with_request_id(request_id))).into_response();
    if let Some(id) = request_id {
        set_request_id(&mut response, id);
    }
    response
}
