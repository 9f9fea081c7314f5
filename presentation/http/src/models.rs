//! Data models for the Tollgate HTTP surface

use serde::Serialize;
use tollgate_core::payment::PaymentOutcome;

/// Re-export core types for convenience
pub use tollgate_core::types::*;

/// API versioning information
#[derive(Debug, Clone, Serialize)]
pub struct ApiVersion {
    pub version: String,
    pub build: String,
    pub commit: Option<String>,
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build: option_env!("TOLLGATE_BUILD").unwrap_or("development").to_string(),
            commit: option_env!("GIT_COMMIT").map(|s| s.to_string()),
        }
    }
}

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: ApiVersion,
    pub timestamp: String,
}

/// Outcome of one readiness check
#[derive(Debug, Serialize)]
pub struct ReadinessCheck {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReadinessCheck {
    pub fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ok: true,
            reason: None,
        }
    }

    pub fn failed(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub checks: Vec<ReadinessCheck>,
    pub timestamp: String,
}

impl ReadinessStatus {
    pub fn from_checks(checks: Vec<ReadinessCheck>) -> Self {
        Self {
            ready: checks.iter().all(|c| c.ok),
            checks,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// First failure reason, if any
    pub fn reason(&self) -> Option<String> {
        self.checks
            .iter()
            .find(|c| !c.ok)
            .map(|c| format!("{}: {}", c.name, c.reason.as_deref().unwrap_or("not ready")))
    }
}

/// Acknowledgement for `POST /v1/transaction-log`
#[derive(Debug, Serialize)]
pub struct TransactionLogEntry {
    pub request_id: String,
    /// Decoded payment outcome; `None` when no header was sent or it did not decode
    pub payment: Option<PaymentOutcome>,
    pub logged_at: String,
}
