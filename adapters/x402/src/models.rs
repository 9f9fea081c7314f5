//! Facilitator wire models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tollgate_core::payment::PaymentRequirements;

/// Body shared by `/verify` and `/settle`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest<'a> {
    pub x402_version: u32,
    pub payment_payload: &'a Value,
    pub payment_requirements: &'a PaymentRequirements,
}

/// Answer from `/verify`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default)]
    pub invalid_reason: Option<String>,
    #[serde(default)]
    pub payer: Option<String>,
}

/// Fields of the `/settle` answer the gate inspects; the full document is
/// forwarded to the caller untouched
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleStatus {
    pub success: bool,
    #[serde(default)]
    pub error_reason: Option<String>,
}
