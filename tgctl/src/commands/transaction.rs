//! Transaction log command implementation

use crate::client::{TollgateClient, TransactionLogResponse};
use crate::config::TgctlConfig;
use crate::output;
use reqwest::header::{HeaderMap, HeaderValue};
use tollgate_core::correlation::REQUEST_ID_HEADER;
use tollgate_core::errors::{CoreError, ValidationError};
use tollgate_core::payment::PAYMENT_RESPONSE_HEADER;
use tracing::info;

/// Post a payment-response header to the server's transaction log
pub async fn handle_log_transaction_command(
    header: String,
    request_id: String,
    config: &TgctlConfig,
) -> Result<(), CoreError> {
    let client = TollgateClient::new(config.clone())?;

    let mut headers = HeaderMap::new();
    headers.insert(REQUEST_ID_HEADER, parse_header("request_id", &request_id)?);
    headers.insert(PAYMENT_RESPONSE_HEADER, parse_header("header", &header)?);

    info!("[{}] logging payment response", request_id);

    let response = client
        .post::<()>("/v1/transaction-log", None, headers)
        .await?;
    let entry: TransactionLogResponse = client
        .handle_envelope(response)
        .await?
        .data
        .ok_or_else(|| CoreError::Internal("response carried no data".to_string()))?;

    output::display_transaction_log(&entry, &config.default_format)
}

fn parse_header(field: &str, value: &str) -> Result<HeaderValue, CoreError> {
    HeaderValue::from_str(value)
        .map_err(|e| CoreError::Validation(ValidationError::single(field, format!("invalid header value: {}", e))))
}
