//! Error types for Tollgate core operations

use crate::payment::PaymentRequirements;
use serde::Serialize;
use thiserror::Error;

/// Main error type for a proxied chat-completion request
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Upstream inference error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("X-Request-ID header is required")]
    MissingCorrelationId,

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A single violated constraint on the incoming request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Path of the offending field, e.g. `messages[1].role`
    pub field: String,
    /// Human-readable reason
    pub reason: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// All constraints a chat-completion payload violated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", self.summary())]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    /// Convenience constructor for a single violation
    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(vec![FieldViolation::new(field, reason)])
    }

    /// `field: reason; field: reason`
    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Whether any violation names the given field path
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

/// Errors returned by the upstream inference connector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Provider answered with a non-2xx status
    #[error("Upstream API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered 2xx but the body is unusable
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl UpstreamError {
    /// HTTP status the proxy should answer with
    pub fn status(&self) -> u16 {
        match self {
            UpstreamError::Api { status, .. } => *status,
            UpstreamError::Network(_) | UpstreamError::MalformedResponse(_) => 502,
            UpstreamError::Config(_) => 500,
        }
    }

    /// Message safe to show to the caller
    pub fn user_message(&self) -> String {
        match self {
            UpstreamError::Api { message, .. } => message.clone(),
            UpstreamError::Network(_) => "Inference service unreachable".to_string(),
            UpstreamError::MalformedResponse(_) => {
                "Invalid response from inference service".to_string()
            }
            UpstreamError::Config(_) => "Server configuration error".to_string(),
        }
    }
}

/// Errors returned by a payment gate
#[derive(Error, Debug, Clone)]
pub enum PaymentError {
    /// No payment proof was supplied; the caller must pay first
    #[error("{reason}")]
    Required {
        reason: String,
        requirements: PaymentRequirements,
    },

    /// A proof was supplied but did not verify or settle
    #[error("Payment rejected: {reason}")]
    Rejected {
        reason: String,
        requirements: PaymentRequirements,
    },

    #[error("Facilitator error: {0}")]
    Facilitator(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Requirements to advertise back to the caller, if this is a challenge
    pub fn requirements(&self) -> Option<&PaymentRequirements> {
        match self {
            PaymentError::Required { requirements, .. }
            | PaymentError::Rejected { requirements, .. } => Some(requirements),
            _ => None,
        }
    }
}

/// Failure to decode the payment-response header. Never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentDecodeError {
    #[error("payment response is not valid base64: {0}")]
    Base64(String),

    #[error("payment response is not valid JSON: {0}")]
    Json(String),
}

/// Errors related to the HTTP presentation layer
#[derive(Error, Debug)]
pub enum PresentationError {
    #[error("Server startup failed: {0}")]
    StartupFailed(String),

    #[error("Server shutdown failed: {0}")]
    ShutdownFailed(String),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for upstream operations
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
