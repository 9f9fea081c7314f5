//! Configuration for the upstream inference connector

use serde::{Deserialize, Serialize};

/// Default OpenAI-compatible API base
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Upstream inference API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Bearer token for the provider. Checked per request, not at start-up.
    pub api_key: Option<String>,
    /// API base URL, without the `/chat/completions` suffix
    pub api_base: String,
}

impl InferenceConfig {
    /// Create a new config with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Set the API base URL (for any OpenAI-compatible provider)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// The API key, if one is set and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Join a path onto the API base
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key: None, // Must be provided through the environment
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joining() {
        let config = InferenceConfig::new("k").with_api_base("http://localhost:9000/v1/");
        assert_eq!(config.endpoint("/chat/completions"), "http://localhost:9000/v1/chat/completions");
        assert_eq!(config.endpoint("models"), "http://localhost:9000/v1/models");
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config = InferenceConfig {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(config.api_key().is_none());
        assert_eq!(InferenceConfig::new("abc").api_key(), Some("abc"));
    }
}
