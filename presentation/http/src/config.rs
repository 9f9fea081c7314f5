//! Configuration management for the Tollgate server

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tollgate_adapter_x402::{FacilitatorConfig, DEFAULT_ASSET, DEFAULT_FACILITATOR_URL};
use tollgate_connector_inference::{InferenceConfig, DEFAULT_API_BASE};
use tollgate_core::errors::CoreError;
use tollgate_core::pipeline::{ChargePolicy, FlowPolicy};
use tollgate_core::CorrelationPolicy;

/// Environment variable prefix, e.g. `TOLLGATE_API_KEY`
pub const ENV_PREFIX: &str = "TOLLGATE_";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration, loaded once at start-up and never mutated.
///
/// Credentials are optional here: a missing API key or recipient address
/// only fails the requests that need them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Interface to bind
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Log verbosity (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Comma-separated CORS origins; empty allows any origin
    pub allowed_origins: Option<String>,
    /// Directory served for paths no route matches
    pub static_dir: Option<PathBuf>,
    /// Externally visible base URL, used in payment requirements
    pub public_url: Option<String>,

    /// Upstream inference API key
    pub api_key: Option<String>,
    /// Upstream inference API base URL
    pub api_base: String,

    /// Payment recipient address
    pub pay_to: Option<String>,
    pub facilitator_url: String,
    /// Settlement network
    pub network: String,
    /// Price per call in atomic units of `asset`
    pub price_atomic: u64,
    pub asset: String,

    pub correlation_policy: CorrelationPolicy,
    pub charge_policy: ChargePolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            allowed_origins: None,
            static_dir: None,
            public_url: None,
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            pay_to: None,
            facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
            network: "base-sepolia".to_string(),
            price_atomic: 1_000,
            asset: DEFAULT_ASSET.to_string(),
            correlation_policy: CorrelationPolicy::Generated,
            charge_policy: ChargePolicy::AfterUpstream,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from defaults, an optional YAML file and the environment
    pub fn load(config_path: Option<&Path>) -> Result<Self, CoreError> {
        let mut figment = Figment::from(Serialized::defaults(ServiceConfig::default()));

        // Load from default config file if it exists
        for path in ["tollgate.yaml", "tollgate.yml"] {
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

        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        figment
            .extract()
            .map_err(|e| CoreError::Configuration(format!("Failed to parse configuration: {}", e)))
    }

    /// Socket address to bind
    pub fn bind_address(&self) -> Result<SocketAddr, CoreError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| CoreError::Configuration(format!("Invalid bind address {}:{}: {}", self.host, self.port, e)))
    }

    /// CORS origins, trimmed, blanks dropped
    pub fn cors_origins(&self) -> Vec<String> {
        self.allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn inference(&self) -> InferenceConfig {
        InferenceConfig {
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
        }
    }

    pub fn facilitator(&self) -> FacilitatorConfig {
        FacilitatorConfig {
            facilitator_url: self.facilitator_url.clone(),
            pay_to: self.pay_to.clone(),
            network: self.network.clone(),
            price_atomic: self.price_atomic,
            asset: self.asset.clone(),
            ..FacilitatorConfig::default()
        }
    }

    pub fn policy(&self) -> FlowPolicy {
        FlowPolicy {
            correlation: self.correlation_policy,
            charge: self.charge_policy,
        }
    }
}
