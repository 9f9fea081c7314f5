//! Configuration for the x402 payment gate

use serde::{Deserialize, Serialize};
use serde_json::json;
use tollgate_core::payment::PaymentRequirements;

/// Public facilitator used when none is configured
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";
/// USDC on Base Sepolia
pub const DEFAULT_ASSET: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

/// Tariff and facilitator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitatorConfig {
    /// Facilitator base URL exposing `/verify` and `/settle`
    pub facilitator_url: String,
    /// Recipient address. Checked per request, not at start-up.
    pub pay_to: Option<String>,
    /// Settlement network
    pub network: String,
    /// Price per call in the asset's atomic units (USDC has 6 decimals)
    pub price_atomic: u64,
    /// Token contract address
    pub asset: String,
    /// EIP-712 domain name of the token
    pub asset_name: String,
    /// EIP-712 domain version of the token
    pub asset_version: String,
    pub description: String,
    pub max_timeout_seconds: u64,
}

impl FacilitatorConfig {
    /// Create a config paying the given address
    pub fn new(pay_to: impl Into<String>) -> Self {
        Self {
            pay_to: Some(pay_to.into()),
            ..Self::default()
        }
    }

    /// Set the facilitator URL
    pub fn with_facilitator_url(mut self, url: impl Into<String>) -> Self {
        self.facilitator_url = url.into();
        self
    }

    /// Set the settlement network
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Set the price in atomic units
    pub fn with_price_atomic(mut self, price_atomic: u64) -> Self {
        self.price_atomic = price_atomic;
        self
    }

    /// The recipient address, if set and non-blank
    pub fn pay_to(&self) -> Option<&str> {
        self.pay_to.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    /// Join a path onto the facilitator URL
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.facilitator_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Requirements advertised for `resource` when paying `pay_to`
    pub fn requirements(&self, resource: &str, pay_to: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: self.network.clone(),
            max_amount_required: self.price_atomic.to_string(),
            resource: resource.to_string(),
            description: self.description.clone(),
            mime_type: "application/json".to_string(),
            pay_to: pay_to.to_string(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.asset.clone(),
            extra: Some(json!({
                "name": self.asset_name,
                "version": self.asset_version,
            })),
        }
    }
}

impl Default for FacilitatorConfig {
    fn default() -> Self {
        Self {
            facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
            pay_to: None,
            network: "base-sepolia".to_string(),
            price_atomic: 1_000, // $0.001 in USDC
            asset: DEFAULT_ASSET.to_string(),
            asset_name: "USDC".to_string(),
            asset_version: "2".to_string(),
            description: "OpenAI-compatible chat completion".to_string(),
            max_timeout_seconds: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirements_from_config() {
        let config = FacilitatorConfig::new("0xrecipient").with_price_atomic(2_500).with_network("base");
        let requirements = config.requirements("http://localhost:3000/v1/chat/completions", "0xrecipient");

        assert_eq!(requirements.scheme, "exact");
        assert_eq!(requirements.network, "base");
        assert_eq!(requirements.max_amount_required, "2500");
        assert_eq!(requirements.pay_to, "0xrecipient");
        assert_eq!(requirements.extra.unwrap()["name"], "USDC");
    }

    #[test]
    fn test_blank_pay_to_is_missing() {
        let config = FacilitatorConfig {
            pay_to: Some(String::new()),
            ..Default::default()
        };
        assert!(config.pay_to().is_none());
        assert_eq!(
            FacilitatorConfig::default().with_facilitator_url("http://f/").endpoint("/settle"),
            "http://f/settle"
        );
    }
}
