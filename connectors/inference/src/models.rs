//! Upstream wire models and error-message extraction

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tollgate_core::types::{ChatCompletionRequest, ChatMessage};

/// Shown when the provider's error body cannot be understood
pub const GENERIC_UPSTREAM_MESSAGE: &str = "Service temporarily unavailable";

/// Body sent to `/chat/completions`. Streaming is never requested.
#[derive(Debug, Serialize)]
pub struct UpstreamChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

impl<'a> From<&'a ChatCompletionRequest> for UpstreamChatRequest<'a> {
    fn from(request: &'a ChatCompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
        }
    }
}

/// Error body shapes seen from OpenAI-compatible providers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Flat { message: String },
    Nested { error: ErrorDetails },
    Bare { error: String },
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
}

fn model_list_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Only\s+(.+?)\s+allowed now").expect("model list pattern is valid"))
}

/// Parse the sorted model list out of an "Only `a && b` allowed now" message
pub fn parse_allowed_models(message: &str) -> Option<Vec<String>> {
    let captures = model_list_pattern().captures(message)?;
    let mut models: Vec<String> = captures[1]
        .split(|c| c == ',' || c == '&')
        .map(|m| m.trim().trim_matches('`').trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();

    if models.is_empty() {
        return None;
    }
    models.sort();
    models.dedup();
    Some(models)
}

/// Turn a provider error body into the message shown to the caller
pub fn extract_error_message(body: &str, requested_model: &str) -> String {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Flat { message }) => message,
        Ok(ErrorBody::Nested { error }) => error.message,
        Ok(ErrorBody::Bare { error }) => error,
        Err(_) => return GENERIC_UPSTREAM_MESSAGE.to_string(),
    };

    match parse_allowed_models(&message) {
        Some(models) => format!(
            "Invalid model '{}'. Valid models: {}",
            requested_model,
            models.join(", ")
        ),
        None => message,
    }
}

/// Whether a 2xx body has the shape of a chat completion
pub fn has_choices(body: &Value) -> bool {
    body.get("choices").map_or(false, Value::is_array)
}
