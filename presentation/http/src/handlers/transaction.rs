//! Out-of-band payment confirmation log

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tollgate_core::payment::{decode_payment_response, PAYMENT_RESPONSE_HEADER};
use tollgate_core::prelude::*;
use tracing::{info, warn};

use crate::middleware::request_id;
use crate::models::TransactionLogEntry;
use crate::{handle_core_error, set_request_id, ApiResponse};

/// Record a payment-response header a client received elsewhere.
///
/// The correlation header is always required here, whatever the chat policy.
pub async fn log_transaction(headers: HeaderMap) -> Response {
    let correlation_id = match CorrelationId::resolve(request_id(&headers), CorrelationPolicy::Required) {
        Ok(id) => id,
        Err(e) => return handle_core_error(e, None),
    };

    let header = headers
        .get(PAYMENT_RESPONSE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty());

    let payment = match header {
        None => {
            info!("[{}] transaction log entry without {} header", correlation_id, PAYMENT_RESPONSE_HEADER);
            None
        }
        Some(value) => match decode_payment_response(value) {
            Ok(outcome) => {
                info!(
                    "[{}] transaction logged: success={} transaction={} network={} payer={}",
                    correlation_id,
                    outcome.success,
                    outcome.transaction_id,
                    outcome.network,
                    outcome.payer_address.as_deref().unwrap_or("unknown")
                );
                Some(outcome)
            }
            Err(e) => {
                warn!("[{}] could not decode logged payment response: {}", correlation_id, e);
                None
            }
        },
    };

    let entry = TransactionLogEntry {
        request_id: correlation_id.to_string(),
        payment,
        logged_at: chrono::Utc::now().to_rfc3339(),
    };

    let mut response = (StatusCode::OK, Json(ApiResponse::success(entry))).into_response();
    set_request_id(&mut response, &correlation_id);
    response
}
