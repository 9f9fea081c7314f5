//! x402 payment gate for Tollgate
//!
//! The gate never inspects payment cryptography itself. It forwards the
//! caller's `X-PAYMENT` proof together with the endpoint's requirements to a
//! facilitator, first to `/verify` and then to `/settle`, and hands the
//! settlement document back as the receipt.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tollgate_core::prelude::*;
use tracing::{debug, info, warn};

mod config;
mod models;

pub use config::{FacilitatorConfig, DEFAULT_ASSET, DEFAULT_FACILITATOR_URL};
use models::*;

/// [`PaymentGate`] backed by an x402 facilitator
pub struct FacilitatorGate {
    client: Client,
    config: FacilitatorConfig,
}

impl FacilitatorGate {
    /// Create a new gate
    pub fn new(config: FacilitatorConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .build()
            .map_err(|e| PaymentError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FacilitatorConfig {
        &self.config
    }

    fn pay_to(&self) -> Result<&str, PaymentError> {
        self.config
            .pay_to()
            .ok_or_else(|| PaymentError::Config("payment recipient address is not set".to_string()))
    }

    /// Decode the base64 JSON payment payload sent by the caller
    fn decode_proof(proof: &str) -> Result<Value, String> {
        let bytes = STANDARD
            .decode(proof.trim())
            .map_err(|e| format!("X-PAYMENT header is not valid base64: {}", e))?;
        serde_json::from_slice(&bytes).map_err(|e| format!("X-PAYMENT header is not valid JSON: {}", e))
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &FacilitatorRequest<'_>) -> Result<T, PaymentError> {
        let url = self.config.endpoint(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::Facilitator(format!("{} request failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PaymentError::Facilitator(format!("{} returned {}: {}", path, status, text)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PaymentError::Facilitator(format!("Failed to parse {} response: {}", path, e)))
    }
}

#[async_trait]
impl PaymentGate for FacilitatorGate {
    fn check_configured(&self) -> Result<(), String> {
        self.pay_to().map(|_| ()).map_err(|e| e.to_string())
    }

    async fn collect(&self, request: PaymentRequest) -> Result<PaymentReceipt, PaymentError> {
        let pay_to = self.pay_to()?;
        let requirements = self.config.requirements(&request.resource, pay_to);

        let Some(proof) = request.proof.as_deref().filter(|p| !p.trim().is_empty()) else {
            debug!("[{}] no payment proof supplied, issuing challenge", request.correlation_id);
            return Err(PaymentError::Required {
                reason: format!("{} header is required", PAYMENT_HEADER),
                requirements,
            });
        };

        let payload = match Self::decode_proof(proof) {
            Ok(payload) => payload,
            Err(reason) => {
                warn!("[{}] {}", request.correlation_id, reason);
                return Err(PaymentError::Rejected { reason, requirements });
            }
        };

        let body = FacilitatorRequest {
            x402_version: X402_VERSION,
            payment_payload: &payload,
            payment_requirements: &requirements,
        };

        let verification: VerifyResponse = self.post("/verify", &body).await?;
        if !verification.is_valid {
            let reason = verification
                .invalid_reason
                .unwrap_or_else(|| "payment verification failed".to_string());
            warn!("[{}] payment rejected by facilitator: {}", request.correlation_id, reason);
            return Err(PaymentError::Rejected { reason, requirements });
        }
        debug!(
            "[{}] payment verified for payer {}",
            request.correlation_id,
            verification.payer.as_deref().unwrap_or("unknown")
        );

        let settlement: Value = self.post("/settle", &body).await?;
        let status: SettleStatus = serde_json::from_value(settlement.clone())
            .map_err(|e| PaymentError::Facilitator(format!("Failed to parse /settle response: {}", e)))?;
        if !status.success {
            let reason = status
                .error_reason
                .unwrap_or_else(|| "payment settlement failed".to_string());
            warn!("[{}] payment settlement failed: {}", request.correlation_id, reason);
            return Err(PaymentError::Rejected { reason, requirements });
        }

        info!(
            "[{}] payment of {} atomic units settled on {}",
            request.correlation_id, self.config.price_atomic, self.config.network
        );

        Ok(PaymentReceipt::from_settlement(&settlement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn proof() -> String {
        STANDARD.encode(json!({"x402Version": 1, "scheme": "exact", "payload": {"signature": "0xsig"}}).to_string())
    }

    fn payment_request(proof: Option<String>) -> PaymentRequest {
        PaymentRequest {
            correlation_id: CorrelationId::new("r1"),
            proof,
            resource: "http://localhost:3000/v1/chat/completions".to_string(),
        }
    }

    fn gate(server: &MockServer) -> FacilitatorGate {
        FacilitatorGate::new(FacilitatorConfig::new("0xrecipient").with_facilitator_url(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_unconfigured_gate() {
        let gate = FacilitatorGate::new(FacilitatorConfig::default()).unwrap();
        assert!(gate.check_configured().is_err());

        let err = gate.collect(payment_request(Some(proof()))).await.unwrap_err();
        assert!(matches!(err, PaymentError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_proof_issues_challenge_without_calling_facilitator() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = gate(&server).collect(payment_request(None)).await.unwrap_err();

        match err {
            PaymentError::Required { reason, requirements } => {
                assert_eq!(reason, "X-PAYMENT header is required");
                assert_eq!(requirements.pay_to, "0xrecipient");
                assert_eq!(requirements.resource, "http://localhost:3000/v1/chat/completions");
            }
            other => panic!("expected challenge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbled_proof_is_rejected() {
        let server = MockServer::start().await;
        let err = gate(&server)
            .collect(payment_request(Some("not base64 at all!".to_string())))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Rejected { .. }));
        assert!(err.requirements().is_some());
    }

    #[tokio::test]
    async fn test_verify_and_settle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isValid": true, "payer": "0xpayer"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "transaction": "0xtx",
                "network": "base-sepolia",
                "payer": "0xpayer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = gate(&server).collect(payment_request(Some(proof()))).await.unwrap();
        let outcome = receipt.outcome().unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.transaction_id, "0xtx");
        assert_eq!(outcome.payer_address.as_deref(), Some("0xpayer"));

        let requests = server.received_requests().await.unwrap();
        let verify_body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(verify_body["x402Version"], 1);
        assert_eq!(verify_body["paymentPayload"]["payload"]["signature"], "0xsig");
        assert_eq!(verify_body["paymentRequirements"]["maxAmountRequired"], "1000");
    }

    #[tokio::test]
    async fn test_invalid_payment_skips_settlement() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"isValid": false, "invalidReason": "insufficient_funds"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = gate(&server).collect(payment_request(Some(proof()))).await.unwrap_err();
        assert_eq!(err.to_string(), "Payment rejected: insufficient_funds");
    }

    #[tokio::test]
    async fn test_facilitator_outage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = gate(&server).collect(payment_request(Some(proof()))).await.unwrap_err();
        assert!(matches!(err, PaymentError::Facilitator(_)));
        assert!(err.requirements().is_none());
    }
}
