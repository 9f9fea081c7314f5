//! # Tollgate Core
//!
//! Core types, validation and the per-request pipeline for the Tollgate
//! pay-per-call chat-completion proxy. Connectors and payment adapters
//! implement the traits defined here.

pub mod types;
pub mod traits;
pub mod errors;
pub mod validation;
pub mod correlation;
pub mod payment;
pub mod pipeline;

// Re-export commonly used types and traits
pub use types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Role};
pub use traits::{InferenceConnector, PaymentGate, PaymentRequest};
pub use errors::{CoreError, PaymentError, UpstreamError, ValidationError};
pub use correlation::{CorrelationId, CorrelationPolicy};
pub use pipeline::{ChargePolicy, CompletionPipeline, FlowPolicy, RequestContext, RequestStage};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::types::*;
    pub use crate::traits::*;
    pub use crate::errors::*;
    pub use crate::correlation::*;
    pub use crate::payment::*;
    pub use async_trait::async_trait;
}
