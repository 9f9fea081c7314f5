//! Core data types for Tollgate

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// All accepted roles, in the order they are listed in error messages
    pub const ALL: [Role; 3] = [Role::System, Role::User, Role::Assistant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// A message in the chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// A validated OpenAI-compatible chat-completion request.
///
/// Only produced by [`crate::validation::validate_request`]; fields are
/// public for reading and for building fixtures in tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatCompletionRequest {
    /// Create a request with the given model and messages and no sampling parameters
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            top_p: None,
            stream: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Whether the caller asked for a streamed response
    pub fn wants_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// Token usage information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Chat-completion body as returned by the upstream provider.
///
/// The JSON is held verbatim and serializes back out untouched. The
/// accessors read the few fields Tollgate logs or prints and never fail on
/// a shape they do not expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatCompletionResponse(Value);

impl From<Value> for ChatCompletionResponse {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl ChatCompletionResponse {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Entries of the `choices` array, empty when it is missing
    pub fn choices(&self) -> &[Value] {
        self.0
            .get("choices")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Message content of every choice, in order
    pub fn contents(&self) -> impl Iterator<Item = Option<&str>> {
        self.choices()
            .iter()
            .map(|choice| choice.pointer("/message/content").and_then(Value::as_str))
    }

    /// Content of the first choice, if any
    pub fn first_content(&self) -> Option<&str> {
        self.contents().next().flatten()
    }

    pub fn model(&self) -> Option<&str> {
        self.0.get("model").and_then(Value::as_str)
    }

    /// Token usage, when the provider reports it in the usual shape
    pub fn usage(&self) -> Option<Usage> {
        self.0
            .get("usage")
            .and_then(|usage| Usage::deserialize(usage).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_roundtrip_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn test_request_skips_unset_parameters() {
        let request = ChatCompletionRequest::new("x", vec![ChatMessage::user("hi")]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"model": "x", "messages": [{"role": "user", "content": "hi"}]})
        );
    }

    #[test]
    fn test_response_preserves_provider_fields() {
        let body = json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "x",
            "system_fingerprint": "fp_abc",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hello", "refusal": null},
                "finish_reason": "stop",
                "logprobs": null
            }],
            "usage": {
                "prompt_tokens": 3,
                "completion_tokens": 1,
                "total_tokens": 4,
                "prompt_tokens_details": {"cached_tokens": 0}
            }
        });

        let response: ChatCompletionResponse = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(response.first_content(), Some("hello"));
        assert_eq!(response.model(), Some("x"));

        let usage = response.usage().unwrap();
        assert_eq!(usage.total_tokens, 4);
        assert_eq!(usage.extra["prompt_tokens_details"], json!({"cached_tokens": 0}));

        assert_eq!(serde_json::to_value(&response).unwrap(), body);
    }

    #[test]
    fn test_sparse_choices_are_tolerated() {
        let body = json!({
            "choices": [
                {"message": {"content": "hello"}, "finish_reason": "stop"},
                {"finish_reason": "length"}
            ],
            "usage": {"total_tokens": "unknown"}
        });

        let response = ChatCompletionResponse::from(body.clone());
        assert_eq!(response.choices().len(), 2);
        assert_eq!(response.contents().collect::<Vec<_>>(), vec![Some("hello"), None]);
        assert!(response.model().is_none());
        assert!(response.usage().is_none());
        assert_eq!(response.into_value(), body);
    }

    #[test]
    fn test_missing_choices_reads_as_empty() {
        let response = ChatCompletionResponse::from(json!({"id": "x"}));
        assert!(response.choices().is_empty());
        assert!(response.first_content().is_none());
    }
}
