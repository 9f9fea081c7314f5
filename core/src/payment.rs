//! Payment metadata exchanged with callers and the payment gate

use crate::errors::PaymentDecodeError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request header carrying the caller's payment proof
pub const PAYMENT_HEADER: &str = "X-PAYMENT";
/// Response header carrying the settlement result
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";
/// Protocol version advertised in payment challenges
pub const X402_VERSION: u32 = 1;

/// What the caller must pay to use an endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    /// Settlement network, e.g. `base-sepolia`
    pub network: String,
    /// Price in the asset's atomic units, as a decimal string
    pub max_amount_required: String,
    /// Resource being paid for
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    /// Recipient address
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    /// Token contract address
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Body of a 402 response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChallenge {
    pub x402_version: u32,
    pub error: String,
    pub accepts: Vec<PaymentRequirements>,
}

impl PaymentChallenge {
    pub fn new(error: impl Into<String>, requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: X402_VERSION,
            error: error.into(),
            accepts: vec![requirements],
        }
    }
}

/// Decoded settlement result.
///
/// Serializes with the facilitator's short field names. Decoding also takes
/// `transactionId` and `payerAddress`, preferring the short name when a
/// document carries both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SettlementFields")]
pub struct PaymentOutcome {
    pub success: bool,
    #[serde(rename = "transaction")]
    pub transaction_id: String,
    pub network: String,
    #[serde(rename = "payer")]
    pub payer_address: Option<String>,
    #[serde(rename = "errorReason", skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

#[derive(Deserialize)]
struct SettlementFields {
    success: bool,
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default, rename = "transactionId")]
    transaction_id: Option<String>,
    #[serde(default)]
    network: String,
    #[serde(default)]
    payer: Option<String>,
    #[serde(default, rename = "payerAddress")]
    payer_address: Option<String>,
    #[serde(default, rename = "errorReason")]
    error_reason: Option<String>,
}

impl From<SettlementFields> for PaymentOutcome {
    fn from(fields: SettlementFields) -> Self {
        Self {
            success: fields.success,
            transaction_id: fields.transaction.or(fields.transaction_id).unwrap_or_default(),
            network: fields.network,
            payer_address: fields.payer.or(fields.payer_address),
            error_reason: fields.error_reason,
        }
    }
}

/// Opaque proof of payment produced by a gate, ready to be sent as
/// the `X-PAYMENT-RESPONSE` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    header_value: String,
}

impl PaymentReceipt {
    pub fn new(header_value: impl Into<String>) -> Self {
        Self {
            header_value: header_value.into(),
        }
    }

    /// Build a receipt from a settlement JSON document
    pub fn from_settlement(settlement: &Value) -> Self {
        Self::new(encode_payment_response(settlement))
    }

    pub fn header_value(&self) -> &str {
        &self.header_value
    }

    /// Decode the receipt into a [`PaymentOutcome`]
    pub fn outcome(&self) -> Result<PaymentOutcome, PaymentDecodeError> {
        decode_payment_response(&self.header_value)
    }
}

/// Base64-encode a settlement document for the response header
pub fn encode_payment_response(settlement: &Value) -> String {
    STANDARD.encode(settlement.to_string())
}

/// Decode an `X-PAYMENT-RESPONSE` header value
pub fn decode_payment_response(header_value: &str) -> Result<PaymentOutcome, PaymentDecodeError> {
    let bytes = STANDARD
        .decode(header_value.trim())
        .map_err(|e| PaymentDecodeError::Base64(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| PaymentDecodeError::Json(e.to_string()))
}
