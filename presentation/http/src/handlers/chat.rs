//! Chat completion handler

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use tollgate_core::payment::{PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER};
use tollgate_core::pipeline::CompletionInput;
use tollgate_core::prelude::*;
use tollgate_core::RequestContext;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::middleware::request_id;
use crate::{handle_core_error, set_request_id, AppState};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Proxy a chat completion and charge for it
pub async fn chat_completions(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let policy = state.pipeline.policy();
    let correlation_id = match CorrelationId::resolve(request_id(&headers), policy.correlation) {
        Ok(id) => id,
        Err(e) => {
            warn!("Rejecting {} request: {}", CHAT_COMPLETIONS_PATH, e);
            return handle_core_error(e, None);
        }
    };

    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            debug!("[{}] request body is not JSON: {}", correlation_id, e);
            let error = ValidationError::single("body", format!("must be valid JSON: {}", e));
            return handle_core_error(CoreError::Validation(error), Some(&correlation_id));
        }
    };

    let input = CompletionInput {
        body,
        payment_proof: headers
            .get(PAYMENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        resource: resource_url(&state.config, &headers, CHAT_COMPLETIONS_PATH),
    };

    let mut ctx = RequestContext::new(correlation_id.clone(), "POST", CHAT_COMPLETIONS_PATH);
    match state.pipeline.execute(&mut ctx, input).await {
        Ok(outcome) => {
            let mut response = Json(outcome.response.into_value()).into_response();
            match HeaderValue::from_str(outcome.receipt.header_value()) {
                Ok(value) => {
                    response.headers_mut().insert(PAYMENT_RESPONSE_HEADER, value);
                }
                Err(e) => warn!("[{}] payment receipt is not a valid header value: {}", correlation_id, e),
            }
            set_request_id(&mut response, &correlation_id);
            response
        }
        Err(e) => handle_core_error(e, Some(&correlation_id)),
    }
}

/// Absolute URL of `path` as seen by callers
pub fn resource_url(config: &ServiceConfig, headers: &HeaderMap, path: &str) -> String {
    if let Some(base) = config.public_url.as_deref().filter(|u| !u.trim().is_empty()) {
        return format!("{}{}", base.trim().trim_end_matches('/'), path);
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{}{}", host, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_url_prefers_public_url() {
        let config = ServiceConfig {
            public_url: Some("https://pay.example.com/".to_string()),
            ..Default::default()
        };
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:3000"));

        assert_eq!(
            resource_url(&config, &headers, CHAT_COMPLETIONS_PATH),
            "https://pay.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_resource_url_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:3000"));

        assert_eq!(
            resource_url(&ServiceConfig::default(), &headers, CHAT_COMPLETIONS_PATH),
            "http://localhost:3000/v1/chat/completions"
        );
        assert_eq!(
            resource_url(&ServiceConfig::default(), &HeaderMap::new(), "/x"),
            "http://localhost/x"
        );
    }
}
