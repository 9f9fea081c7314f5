//! Per-request processing pipeline
//!
//! One pipeline drives every `/v1/chat/completions` request through
//! validation, the upstream call and the payment gate. The order of the
//! last two is set by [`ChargePolicy`]; every path ends in
//! [`RequestStage::Responded`].

use crate::prelude::*;
use crate::validation::validate_request;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Stages a request passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStage {
    Received,
    Validating,
    Invalid,
    CallingUpstream,
    UpstreamOk,
    UpstreamError,
    Charging,
    Charged,
    /// Payment went through but its metadata could not be decoded
    ChargeFailedSoft,
    /// The gate refused the payment
    ChargeRejected,
    Responded,
}

impl std::fmt::Display for RequestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestStage::Received => "received",
            RequestStage::Validating => "validating",
            RequestStage::Invalid => "invalid",
            RequestStage::CallingUpstream => "calling-upstream",
            RequestStage::UpstreamOk => "upstream-ok",
            RequestStage::UpstreamError => "upstream-error",
            RequestStage::Charging => "charging",
            RequestStage::Charged => "charged",
            RequestStage::ChargeFailedSoft => "charge-failed-soft",
            RequestStage::ChargeRejected => "charge-rejected",
            RequestStage::Responded => "responded",
        };
        write!(f, "{}", name)
    }
}

/// When the caller is charged relative to the upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChargePolicy {
    /// Charge only once inference has succeeded
    #[default]
    AfterUpstream,
    /// Charge before calling upstream; a failed inference is still paid for
    BeforeUpstream,
}

impl std::fmt::Display for ChargePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChargePolicy::AfterUpstream => write!(f, "after-upstream"),
            ChargePolicy::BeforeUpstream => write!(f, "before-upstream"),
        }
    }
}

/// Policy knobs selecting between the two handler variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlowPolicy {
    pub correlation: CorrelationPolicy,
    pub charge: ChargePolicy,
}

/// Context carried through a single request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: CorrelationId,
    pub method: String,
    pub path: String,
    stages: Vec<RequestStage>,
    start_time: Instant,
}

impl RequestContext {
    pub fn new(correlation_id: CorrelationId, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            correlation_id,
            method: method.into(),
            path: path.into(),
            stages: vec![RequestStage::Received],
            start_time: Instant::now(),
        }
    }

    pub fn advance(&mut self, stage: RequestStage) {
        debug!("[{}] {} -> {}", self.correlation_id, self.stage(), stage);
        self.stages.push(stage);
    }

    /// Current stage
    pub fn stage(&self) -> RequestStage {
        self.stages.last().copied().unwrap_or(RequestStage::Received)
    }

    /// Every stage visited so far, in order
    pub fn stages(&self) -> &[RequestStage] {
        &self.stages
    }

    pub fn passed(&self, stage: RequestStage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Raw input for one completion request
#[derive(Debug, Clone)]
pub struct CompletionInput {
    /// Parsed JSON body, not yet validated
    pub body: Value,
    /// `X-PAYMENT` header, if present
    pub payment_proof: Option<String>,
    /// Absolute URL of the endpoint, advertised in payment requirements
    pub resource: String,
}

/// Successful result of the pipeline
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub response: ChatCompletionResponse,
    pub receipt: PaymentReceipt,
    /// Decoded receipt; `None` when decoding failed
    pub payment: Option<PaymentOutcome>,
}

/// Drives requests through validation, inference and payment
pub struct CompletionPipeline {
    upstream: Arc<dyn InferenceConnector>,
    payment: Arc<dyn PaymentGate>,
    policy: FlowPolicy,
}

impl CompletionPipeline {
    pub fn new(upstream: Arc<dyn InferenceConnector>, payment: Arc<dyn PaymentGate>, policy: FlowPolicy) -> Self {
        Self {
            upstream,
            payment,
            policy,
        }
    }

    pub fn policy(&self) -> FlowPolicy {
        self.policy
    }

    pub fn upstream(&self) -> &Arc<dyn InferenceConnector> {
        &self.upstream
    }

    pub fn payment(&self) -> &Arc<dyn PaymentGate> {
        &self.payment
    }

    /// Execute the pipeline for one request
    pub async fn execute(&self, ctx: &mut RequestContext, input: CompletionInput) -> CoreResult<CompletionOutcome> {
        let result = self.run(ctx, input).await;
        ctx.advance(RequestStage::Responded);

        match &result {
            Ok(_) => info!(
                "[{}] {} {} completed in {:?}",
                ctx.correlation_id,
                ctx.method,
                ctx.path,
                ctx.elapsed()
            ),
            Err(e) => warn!(
                "[{}] {} {} failed at {} after {:?}: {}",
                ctx.correlation_id,
                ctx.method,
                ctx.path,
                ctx.stages().iter().rev().nth(1).copied().unwrap_or(RequestStage::Received),
                ctx.elapsed(),
                e
            ),
        }

        result
    }

    async fn run(&self, ctx: &mut RequestContext, input: CompletionInput) -> CoreResult<CompletionOutcome> {
        ctx.advance(RequestStage::Validating);
        let request = match validate_request(&input.body) {
            Ok(request) => request,
            Err(e) => {
                ctx.advance(RequestStage::Invalid);
                return Err(CoreError::Validation(e));
            }
        };

        self.upstream.check_configured().map_err(CoreError::Configuration)?;
        self.payment.check_configured().map_err(CoreError::Configuration)?;

        let payment_request = PaymentRequest {
            correlation_id: ctx.correlation_id.clone(),
            proof: input.payment_proof,
            resource: input.resource,
        };

        match self.policy.charge {
            ChargePolicy::AfterUpstream => {
                let response = self.call_upstream(ctx, &request).await?;
                let (receipt, payment) = self.charge(ctx, payment_request).await?;
                Ok(CompletionOutcome {
                    response,
                    receipt,
                    payment,
                })
            }
            ChargePolicy::BeforeUpstream => {
                let (receipt, payment) = self.charge(ctx, payment_request).await?;
                let response = self.call_upstream(ctx, &request).await.map_err(|e| {
                    warn!(
                        "[{}] caller was charged but the upstream call failed (transaction {})",
                        ctx.correlation_id,
                        payment
                            .as_ref()
                            .map(|p| p.transaction_id.as_str())
                            .unwrap_or("unknown")
                    );
                    e
                })?;
                Ok(CompletionOutcome {
                    response,
                    receipt,
                    payment,
                })
            }
        }
    }

    async fn call_upstream(
        &self,
        ctx: &mut RequestContext,
        request: &ChatCompletionRequest,
    ) -> CoreResult<ChatCompletionResponse> {
        ctx.advance(RequestStage::CallingUpstream);
        debug!(
            "[{}] forwarding model {} with {} messages to {}",
            ctx.correlation_id,
            request.model,
            request.messages.len(),
            self.upstream.name()
        );

        match self.upstream.complete(&ctx.correlation_id, request).await {
            Ok(response) => {
                ctx.advance(RequestStage::UpstreamOk);
                Ok(response)
            }
            Err(e) => {
                ctx.advance(RequestStage::UpstreamError);
                error!("[{}] upstream call failed: {}", ctx.correlation_id, e);
                Err(CoreError::Upstream(e))
            }
        }
    }

    async fn charge(
        &self,
        ctx: &mut RequestContext,
        payment_request: PaymentRequest,
    ) -> CoreResult<(PaymentReceipt, Option<PaymentOutcome>)> {
        ctx.advance(RequestStage::Charging);

        let receipt = match self.payment.collect(payment_request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                ctx.advance(RequestStage::ChargeRejected);
                return Err(CoreError::Payment(e));
            }
        };

        match receipt.outcome() {
            Ok(outcome) => {
                info!(
                    "[{}] payment settled: transaction={} network={} payer={}",
                    ctx.correlation_id,
                    outcome.transaction_id,
                    outcome.network,
                    outcome.payer_address.as_deref().unwrap_or("unknown")
                );
                ctx.advance(RequestStage::Charged);
                Ok((receipt, Some(outcome)))
            }
            Err(e) => {
                warn!("[{}] could not decode payment response: {}", ctx.correlation_id, e);
                ctx.advance(RequestStage::ChargeFailedSoft);
                Ok((receipt, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::encode_payment_response;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockUpstream {
        calls: AtomicUsize,
        result: Result<Value, UpstreamError>,
    }

    impl MockUpstream {
        fn ok(body: Value) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Ok(body),
            }
        }

        fn failing(error: UpstreamError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Err(error),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InferenceConnector for MockUpstream {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn check_configured(&self) -> Result<(), String> {
            Ok(())
        }

        async fn complete(
            &self,
            _correlation_id: &CorrelationId,
            _request: &ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(body) => Ok(serde_json::from_value(body.clone()).unwrap()),
                Err(e) => Err(e.clone()),
            }
        }

        async fn health_check(&self) -> Result<(), UpstreamError> {
            Ok(())
        }
    }

    struct MockGate {
        calls: AtomicUsize,
        header: String,
        configured: bool,
    }

    impl MockGate {
        fn settling() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                header: encode_payment_response(&json!({
                    "success": true,
                    "transaction": "0xtx",
                    "network": "base-sepolia",
                    "payer": "0xpayer"
                })),
                configured: true,
            }
        }

        fn with_header(header: &str) -> Self {
            Self {
                header: header.to_string(),
                ..Self::settling()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentGate for MockGate {
        fn check_configured(&self) -> Result<(), String> {
            if self.configured {
                Ok(())
            } else {
                Err("pay_to is not set".to_string())
            }
        }

        async fn collect(&self, _request: PaymentRequest) -> Result<PaymentReceipt, PaymentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PaymentReceipt::new(self.header.clone()))
        }
    }

    fn upstream_body() -> Value {
        json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hello"},
                "finish_reason": "stop",
                "logprobs": null
            }]
        })
    }

    fn input(body: Value) -> CompletionInput {
        CompletionInput {
            body,
            payment_proof: Some("proof".to_string()),
            resource: "http://localhost/v1/chat/completions".to_string(),
        }
    }

    fn context() -> RequestContext {
        RequestContext::new(CorrelationId::new("test"), "POST", "/v1/chat/completions")
    }

    fn valid_body() -> Value {
        json!({"model": "x", "messages": [{"role": "user", "content": "hi"}]})
    }

    #[tokio::test]
    async fn test_success_charges_exactly_once() {
        let upstream = Arc::new(MockUpstream::ok(upstream_body()));
        let gate = Arc::new(MockGate::settling());
        let pipeline = CompletionPipeline::new(upstream.clone(), gate.clone(), FlowPolicy::default());

        let mut ctx = context();
        let outcome = pipeline.execute(&mut ctx, input(valid_body())).await.unwrap();

        assert_eq!(upstream.call_count(), 1);
        assert_eq!(gate.call_count(), 1);
        assert_eq!(outcome.response.first_content(), Some("hello"));
        assert_eq!(outcome.payment.unwrap().transaction_id, "0xtx");
        assert_eq!(
            ctx.stages(),
            &[
                RequestStage::Received,
                RequestStage::Validating,
                RequestStage::CallingUpstream,
                RequestStage::UpstreamOk,
                RequestStage::Charging,
                RequestStage::Charged,
                RequestStage::Responded,
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_request_makes_no_calls() {
        let upstream = Arc::new(MockUpstream::ok(upstream_body()));
        let gate = Arc::new(MockGate::settling());
        let pipeline = CompletionPipeline::new(upstream.clone(), gate.clone(), FlowPolicy::default());

        for body in [json!({"messages": [{"role": "user", "content": "hi"}]}), json!({"model": "x", "messages": []})] {
            let mut ctx = context();
            let err = pipeline.execute(&mut ctx, input(body)).await.unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)));
            assert!(ctx.passed(RequestStage::Invalid));
            assert_eq!(ctx.stage(), RequestStage::Responded);
        }

        assert_eq!(upstream.call_count(), 0);
        assert_eq!(gate.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_never_charges() {
        let upstream = Arc::new(MockUpstream::failing(UpstreamError::Api {
            status: 400,
            message: "bad model".to_string(),
        }));
        let gate = Arc::new(MockGate::settling());
        let pipeline = CompletionPipeline::new(upstream.clone(), gate.clone(), FlowPolicy::default());

        let mut ctx = context();
        let err = pipeline.execute(&mut ctx, input(valid_body())).await.unwrap_err();

        assert!(matches!(err, CoreError::Upstream(UpstreamError::Api { status: 400, .. })));
        assert_eq!(upstream.call_count(), 1);
        assert_eq!(gate.call_count(), 0);
        assert!(!ctx.passed(RequestStage::Charging));
    }

    #[tokio::test]
    async fn test_undecodable_receipt_is_soft_failure() {
        let upstream = Arc::new(MockUpstream::ok(upstream_body()));
        let gate = Arc::new(MockGate::with_header("not-base64!"));
        let pipeline = CompletionPipeline::new(upstream, gate.clone(), FlowPolicy::default());

        let mut ctx = context();
        let outcome = pipeline.execute(&mut ctx, input(valid_body())).await.unwrap();

        assert!(outcome.payment.is_none());
        assert_eq!(outcome.receipt.header_value(), "not-base64!");
        assert!(ctx.passed(RequestStage::ChargeFailedSoft));
        assert_eq!(gate.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_gate_is_configuration_error_before_upstream() {
        let upstream = Arc::new(MockUpstream::ok(upstream_body()));
        let gate = Arc::new(MockGate {
            configured: false,
            ..MockGate::settling()
        });
        let pipeline = CompletionPipeline::new(upstream.clone(), gate, FlowPolicy::default());

        let mut ctx = context();
        let err = pipeline.execute(&mut ctx, input(valid_body())).await.unwrap_err();

        assert!(matches!(err, CoreError::Configuration(_)));
        assert_eq!(upstream.call_count(), 0);
    }

    #[tokio::test]
    async fn test_charge_before_upstream_policy() {
        let upstream = Arc::new(MockUpstream::failing(UpstreamError::Network("refused".to_string())));
        let gate = Arc::new(MockGate::settling());
        let policy = FlowPolicy {
            charge: ChargePolicy::BeforeUpstream,
            ..FlowPolicy::default()
        };
        let pipeline = CompletionPipeline::new(upstream.clone(), gate.clone(), policy);

        let mut ctx = context();
        let err = pipeline.execute(&mut ctx, input(valid_body())).await.unwrap_err();

        assert!(matches!(err, CoreError::Upstream(_)));
        assert_eq!(gate.call_count(), 1);
        assert_eq!(upstream.call_count(), 1);

        let charging = ctx.stages().iter().position(|s| *s == RequestStage::Charging).unwrap();
        let calling = ctx.stages().iter().position(|s| *s == RequestStage::CallingUpstream).unwrap();
        assert!(charging < calling);
    }

    #[test]
    fn test_request_context() {
        let mut ctx = context();
        assert_eq!(ctx.stage(), RequestStage::Received);

        ctx.advance(RequestStage::Validating);
        assert!(ctx.passed(RequestStage::Received));
        assert_eq!(ctx.stage(), RequestStage::Validating);
        assert_eq!(ctx.stage().to_string(), "validating");
    }

    #[test]
    fn test_policy_defaults() {
        let policy = FlowPolicy::default();
        assert_eq!(policy.charge, ChargePolicy::AfterUpstream);
        assert_eq!(policy.correlation, CorrelationPolicy::Generated);
    }
}
