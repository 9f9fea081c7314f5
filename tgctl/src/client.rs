//! HTTP client for the Tollgate API

use crate::config::TgctlConfig;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tollgate_core::correlation::REQUEST_ID_HEADER;
use tollgate_core::payment::{
    decode_payment_response, PaymentChallenge, PaymentOutcome, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER,
};
use tollgate_core::prelude::*;
use tracing::{debug, error, warn};

/// API client for Tollgate
pub struct TollgateClient {
    client: Client,
    config: TgctlConfig,
}

impl TollgateClient {
    /// Create a new API client
    pub fn new(config: TgctlConfig) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response, CoreError> {
        let url = self.config.api_url(path);
        debug!("GET {}", url);

        self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::Upstream(UpstreamError::Network(format!("HTTP GET failed: {}", e))))
    }

    /// Make a POST request with optional JSON body and extra headers
    pub async fn post<T: Serialize>(
        &self,
        path: &str,
        body: Option<&T>,
        headers: HeaderMap,
    ) -> Result<Response, CoreError> {
        let url = self.config.api_url(path);
        debug!("POST {}", url);

        let mut request = self.client.post(&url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }

        request
            .send()
            .await
            .map_err(|e| CoreError::Upstream(UpstreamError::Network(format!("HTTP POST failed: {}", e))))
    }

    /// Send a chat completion, paying with `payment` if given
    pub async fn chat(
        &self,
        request: &ChatCompletionRequest,
        request_id: &CorrelationId,
        payment: Option<&str>,
    ) -> Result<ChatReply, CoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, header_value(request_id.as_str())?);
        if let Some(proof) = payment {
            headers.insert(PAYMENT_HEADER, header_value(proof)?);
        }

        let response = self.post("/v1/chat/completions", Some(request), headers).await?;
        let status = response.status();
        let echoed_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| request_id.to_string());

        if status == StatusCode::PAYMENT_REQUIRED {
            let mut challenge: PaymentChallenge = response
                .json()
                .await
                .map_err(|e| CoreError::Internal(format!("Failed to parse payment challenge: {}", e)))?;
            let reason = challenge.error.clone();
            let requirements = challenge.accepts.pop().ok_or_else(|| {
                CoreError::Internal("Payment challenge lists no accepted payment".to_string())
            })?;
            return Err(CoreError::Payment(if payment.is_some() {
                PaymentError::Rejected { reason, requirements }
            } else {
                PaymentError::Required { reason, requirements }
            }));
        }

        let receipt = response
            .headers()
            .get(PAYMENT_RESPONSE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let completion: ChatCompletionResponse = self.handle_response(response).await?;

        let payment = match receipt.as_deref().map(decode_payment_response) {
            Some(Ok(outcome)) => Some(outcome),
            Some(Err(e)) => {
                warn!("Could not decode {} header: {}", PAYMENT_RESPONSE_HEADER, e);
                None
            }
            None => {
                warn!("Response carried no {} header", PAYMENT_RESPONSE_HEADER);
                None
            }
        };

        Ok(ChatReply {
            request_id: echoed_id,
            completion,
            payment,
        })
    }

    /// Parse a raw response, checking status first
    pub async fn handle_response<T: for<'de> Deserialize<'de>>(&self, response: Response) -> Result<T, CoreError> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| CoreError::Internal(format!("Failed to parse JSON response: {}", e)))
        } else {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("API error {}: {}", status, error_text);
            Err(api_error(status, &error_text))
        }
    }

    /// Parse a response wrapped in the server's `{success, data, error}` envelope
    pub async fn handle_envelope<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<Envelope<T>, CoreError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CoreError::Upstream(UpstreamError::Network(format!("Failed to read response: {}", e))))?;

        serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                CoreError::Internal(format!("Failed to parse JSON response: {}", e))
            } else {
                api_error(status, &text)
            }
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, CoreError> {
    HeaderValue::from_str(value)
        .map_err(|e| CoreError::Validation(ValidationError::single("header", format!("invalid header value: {}", e))))
}

/// Turn an error response into a [`CoreError`], preferring the server's `error` field
fn api_error(status: StatusCode, body: &str) -> CoreError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    CoreError::Upstream(UpstreamError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Server response envelope
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// A paid chat completion
#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub request_id: String,
    pub completion: ChatCompletionResponse,
    pub payment: Option<PaymentOutcome>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub build: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: VersionInfo,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessCheck {
    pub name: String,
    pub ok: bool,
    pub reason: Option<String>,
}

/// Readiness response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<ReadinessCheck>,
    pub timestamp: String,
}

/// Transaction log acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionLogResponse {
    pub request_id: String,
    pub payment: Option<PaymentOutcome>,
    pub logged_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tollgate_core::payment::encode_payment_response;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TollgateClient {
        TollgateClient::new(TgctlConfig {
            endpoint: server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest::new("x", vec![ChatMessage::user("hi")])
    }

    #[test]
    fn test_client_creation() {
        assert!(TollgateClient::new(TgctlConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_chat_decodes_payment_header() {
        let server = MockServer::start().await;
        let receipt = encode_payment_response(&json!({
            "success": true,
            "transaction": "0xtx",
            "network": "base-sepolia",
            "payer": "0xpayer"
        }));
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("X-Request-ID", "req-1"))
            .and(header("X-PAYMENT", "cHJvb2Y="))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-PAYMENT-RESPONSE", receipt.as_str())
                    .insert_header("X-Request-ID", "req-1")
                    .set_body_json(json!({
                        "choices": [{"index": 0, "message": {"role": "assistant", "content": "hello"}}]
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server)
            .chat(&request(), &CorrelationId::new("req-1"), Some("cHJvb2Y="))
            .await
            .unwrap();

        assert_eq!(reply.request_id, "req-1");
        assert_eq!(reply.completion.first_content(), Some("hello"));
        assert_eq!(reply.payment.unwrap().transaction_id, "0xtx");
    }

    #[tokio::test]
    async fn test_chat_payment_challenge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "x402Version": 1,
                "error": "X-PAYMENT header is required",
                "accepts": [{
                    "scheme": "exact",
                    "network": "base-sepolia",
                    "maxAmountRequired": "1000",
                    "resource": "http://localhost:3000/v1/chat/completions",
                    "description": "chat",
                    "mimeType": "application/json",
                    "payTo": "0xrecipient",
                    "maxTimeoutSeconds": 60,
                    "asset": "0xasset"
                }],
                "request_id": "req-1"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .chat(&request(), &CorrelationId::new("req-1"), None)
            .await
            .unwrap_err();

        match err {
            CoreError::Payment(PaymentError::Required { reason, requirements }) => {
                assert_eq!(reason, "X-PAYMENT header is required");
                assert_eq!(requirements.pay_to, "0xrecipient");
            }
            other => panic!("expected payment challenge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_body_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "error": "Invalid model 'x'. Valid models: modelA, modelB"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .chat(&request(), &CorrelationId::new("req-1"), Some("cHJvb2Y="))
            .await
            .unwrap_err();

        match err {
            CoreError::Upstream(UpstreamError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid model 'x'. Valid models: modelA, modelB");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_envelope_on_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ready"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "success": false,
                "data": {"ready": false, "checks": [{"name": "upstream", "ok": false, "reason": "down"}], "timestamp": "t"},
                "error": "upstream: down",
                "timestamp": "t"
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let response = client.get("/ready").await.unwrap();
        let envelope: Envelope<ReadinessResponse> = client.handle_envelope(response).await.unwrap();

        assert!(!envelope.success);
        assert!(!envelope.data.unwrap().ready);
        assert_eq!(envelope.error.as_deref(), Some("upstream: down"));
    }
}
