//! Core traits defining the external capabilities Tollgate depends on

use crate::correlation::CorrelationId;
use crate::errors::{PaymentError, UpstreamError};
use crate::payment::PaymentReceipt;
use crate::types::{ChatCompletionRequest, ChatCompletionResponse};
use async_trait::async_trait;

/// Client for the upstream inference provider
#[async_trait]
pub trait InferenceConnector: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &'static str;

    /// Report why the connector cannot serve requests, if it cannot
    fn check_configured(&self) -> Result<(), String>;

    /// Perform a single chat-completion call. Never retries.
    async fn complete(
        &self,
        correlation_id: &CorrelationId,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, UpstreamError>;

    /// Confirm the provider is reachable with the configured credentials
    async fn health_check(&self) -> Result<(), UpstreamError>;
}

/// Everything a payment gate needs to charge one request
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub correlation_id: CorrelationId,
    /// Raw `X-PAYMENT` header, if the caller sent one
    pub proof: Option<String>,
    /// Absolute URL of the resource being paid for
    pub resource: String,
}

/// Collects the fixed per-call tariff.
///
/// The payment protocol itself is opaque to Tollgate; implementations
/// delegate verification and settlement to an external service.
#[async_trait]
pub trait PaymentGate: Send + Sync {
    /// Report why the gate cannot charge, if it cannot
    fn check_configured(&self) -> Result<(), String>;

    /// Verify and settle the caller's payment
    async fn collect(&self, request: PaymentRequest) -> Result<PaymentReceipt, PaymentError>;
}
