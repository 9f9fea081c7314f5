//! Liveness, readiness and welcome handlers

use axum::{extract::State, http::StatusCode, response::Json};
use crate::models::{ApiVersion, HealthStatus, ReadinessCheck, ReadinessStatus};
use crate::{ApiResponse, AppState};
use tracing::{debug, warn};

pub const WELCOME_TEXT: &str =
    "Tollgate: OpenAI-compatible chat completions, paid per call. POST /v1/chat/completions with an X-PAYMENT header.";

/// Liveness endpoint. Never touches upstream.
pub async fn health_check() -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "healthy".to_string(),
        version: ApiVersion::default(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// Readiness endpoint: configuration present and upstream reachable
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<ReadinessStatus>>) {
    let mut checks = Vec::new();

    let upstream = state.pipeline.upstream();
    match upstream.check_configured() {
        Ok(()) => checks.push(ReadinessCheck::ok("upstream_config")),
        Err(reason) => checks.push(ReadinessCheck::failed("upstream_config", reason)),
    }
    match state.pipeline.payment().check_configured() {
        Ok(()) => checks.push(ReadinessCheck::ok("payment_config")),
        Err(reason) => checks.push(ReadinessCheck::failed("payment_config", reason)),
    }

    // Only probe upstream with a usable key
    if checks[0].ok {
        match upstream.health_check().await {
            Ok(()) => checks.push(ReadinessCheck::ok("upstream")),
            Err(e) => checks.push(ReadinessCheck::failed("upstream", e.to_string())),
        }
    }

    let status = ReadinessStatus::from_checks(checks);
    if status.ready {
        debug!("Readiness check passed");
        (StatusCode::OK, Json(ApiResponse::success(status)))
    } else {
        let reason = status.reason().unwrap_or_else(|| "not ready".to_string());
        warn!("Readiness check failed: {}", reason);
        let mut body = ApiResponse::success(status);
        body.success = false;
        body.error = Some(reason);
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}

/// Plain-text welcome page
pub async fn root() -> &'static str {
    WELCOME_TEXT
}
