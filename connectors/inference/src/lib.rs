//! OpenAI-compatible upstream inference connector for Tollgate

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Instant;
use tollgate_core::correlation::REQUEST_ID_HEADER;
use tollgate_core::prelude::*;
use tracing::{debug, error, info, warn};

mod config;
mod models;

pub use config::{InferenceConfig, DEFAULT_API_BASE};
pub use models::{extract_error_message, parse_allowed_models, GENERIC_UPSTREAM_MESSAGE};
use models::*;

/// HTTP implementation of [`InferenceConnector`]
pub struct InferenceClient {
    client: Client,
    config: InferenceConfig,
}

impl InferenceClient {
    /// Create a new connector. No request timeout is set beyond the client default.
    pub fn new(config: InferenceConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent(concat!("tollgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, UpstreamError> {
        self.config
            .api_key()
            .ok_or_else(|| UpstreamError::Config("inference API key is not set".to_string()))
    }
}

#[async_trait]
impl InferenceConnector for InferenceClient {
    fn name(&self) -> &'static str {
        "inference"
    }

    fn check_configured(&self) -> Result<(), String> {
        self.api_key().map(|_| ()).map_err(|e| e.to_string())
    }

    async fn complete(
        &self,
        correlation_id: &CorrelationId,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, UpstreamError> {
        let api_key = self.api_key()?;
        let start_time = Instant::now();

        if request.wants_stream() {
            debug!("[{}] streaming requested; forwarding as a single response", correlation_id);
        }

        let response = self
            .client
            .post(self.config.endpoint("/chat/completions"))
            .bearer_auth(api_key)
            .header(REQUEST_ID_HEADER, correlation_id.as_str())
            .json(&UpstreamChatRequest::from(request))
            .send()
            .await
            .map_err(|e| UpstreamError::Network(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Network(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = extract_error_message(&body, &request.model);
            warn!(
                "[{}] upstream returned {} for model {}: {}",
                correlation_id, status, request.model, message
            );
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            error!("[{}] upstream returned non-JSON body: {}", correlation_id, e);
            UpstreamError::MalformedResponse(format!("Response is not JSON: {}", e))
        })?;

        if !has_choices(&value) {
            error!("[{}] upstream response has no choices array", correlation_id);
            return Err(UpstreamError::MalformedResponse("Response has no choices array".to_string()));
        }

        let completion = ChatCompletionResponse::from(value);

        info!(
            "[{}] upstream completion for model {} finished in {}ms ({} choices)",
            correlation_id,
            request.model,
            start_time.elapsed().as_millis(),
            completion.choices().len()
        );

        Ok(completion)
    }

    async fn health_check(&self) -> Result<(), UpstreamError> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(self.config.endpoint("/models"))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            debug!("Upstream model listing reachable ({})", status);
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(UpstreamError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body, ""),
            })
        }
    }
}
