//! Configuration management for tgctl

use crate::cli::{Cli, OutputFormat};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tollgate_core::errors::CoreError;

/// Configuration for the tgctl CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TgctlConfig {
    /// Tollgate server URL
    pub endpoint: String,
    /// Model used when `chat --model` is not given
    pub default_model: String,
    pub default_format: OutputFormat,
    /// `X-PAYMENT` proof used when `chat --payment` is not given
    pub payment: Option<String>,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for TgctlConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000".to_string(),
            default_model: "gpt-4o-mini".to_string(),
            default_format: OutputFormat::Text,
            payment: None,
            timeout: 120,
        }
    }
}

impl TgctlConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: &Option<PathBuf>) -> Result<Self, CoreError> {
        let mut figment = Figment::from(Serialized::defaults(TgctlConfig::default()));

        // Load from default config file if it exists
        let default_config_paths = ["tgctl.yaml", "tgctl.yml", ".tgctl.yaml", ".tgctl.yml"];

        for path in &default_config_paths {
            if Path::new(path).exists() {
                figment = figment.merge(Yaml::file(path));
                break;
            }
        }

        // Load from specified config file
        if let Some(path) = config_path {
            if path.exists() {
                figment = figment.merge(Yaml::file(path));
            } else {
                return Err(CoreError::Configuration(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
        }

        // Load from environment variables (prefixed with TGCTL_)
        figment = figment.merge(Env::prefixed("TGCTL_"));

        figment
            .extract()
            .map_err(|e| CoreError::Configuration(format!("Failed to parse configuration: {}", e)))
    }

    /// Apply CLI argument overrides to the configuration
    pub fn with_overrides(mut self, args: &Cli) -> Self {
        if let Some(ref endpoint) = args.endpoint {
            self.endpoint = endpoint.clone();
        }

        if let Some(format) = args.format {
            self.default_format = format;
        }

        self
    }

    /// Full URL for a server path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }
}
