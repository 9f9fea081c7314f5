//! Chat-completion request validation
//!
//! Validation is all-or-nothing: every violated constraint is collected and
//! reported together, and no typed request is produced unless the payload
//! is entirely valid.

use crate::errors::{FieldViolation, ValidationError};
use crate::types::{ChatCompletionRequest, ChatMessage, Role};
use serde_json::Value;
use std::ops::RangeInclusive;

/// Accepted range for `max_tokens`
pub const MAX_TOKENS_RANGE: RangeInclusive<u64> = 1..=4000;
/// Accepted range for `temperature`
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.0..=2.0;
/// Accepted range for `top_p`
pub const TOP_P_RANGE: RangeInclusive<f64> = 0.0..=1.0;

/// Validate an arbitrary JSON body into a typed request
pub fn validate_request(body: &Value) -> Result<ChatCompletionRequest, ValidationError> {
    let Some(obj) = body.as_object() else {
        return Err(ValidationError::single("body", "must be a JSON object"));
    };

    let mut violations = Vec::new();

    let model = match obj.get("model") {
        None | Some(Value::Null) => {
            violations.push(FieldViolation::new("model", "is required"));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            violations.push(FieldViolation::new("model", "must not be empty"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            violations.push(FieldViolation::new("model", "must be a string"));
            None
        }
    };

    let messages = match obj.get("messages") {
        None | Some(Value::Null) => {
            violations.push(FieldViolation::new("messages", "is required"));
            None
        }
        Some(Value::Array(items)) if items.is_empty() => {
            violations.push(FieldViolation::new("messages", "must not be empty"));
            None
        }
        Some(Value::Array(items)) => validate_messages(items, &mut violations),
        Some(_) => {
            violations.push(FieldViolation::new("messages", "must be an array"));
            None
        }
    };

    let max_tokens = match obj.get("max_tokens") {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_u64().filter(|n| MAX_TOKENS_RANGE.contains(n)) {
            Some(n) => Some(n as u32),
            None => {
                violations.push(FieldViolation::new(
                    "max_tokens",
                    format!(
                        "must be an integer between {} and {}",
                        MAX_TOKENS_RANGE.start(),
                        MAX_TOKENS_RANGE.end()
                    ),
                ));
                None
            }
        },
    };

    let temperature = optional_number(obj.get("temperature"), "temperature", &TEMPERATURE_RANGE, &mut violations);
    let top_p = optional_number(obj.get("top_p"), "top_p", &TOP_P_RANGE, &mut violations);

    let stream = match obj.get("stream") {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => {
            violations.push(FieldViolation::new("stream", "must be a boolean"));
            None
        }
    };

    if !violations.is_empty() {
        return Err(ValidationError::new(violations));
    }

    match (model, messages) {
        (Some(model), Some(messages)) => Ok(ChatCompletionRequest {
            model,
            messages,
            max_tokens,
            temperature,
            top_p,
            stream,
        }),
        // Unreachable in practice: a missing model or message list always records a violation.
        _ => Err(ValidationError::single("body", "is incomplete")),
    }
}

fn validate_messages(items: &[Value], violations: &mut Vec<FieldViolation>) -> Option<Vec<ChatMessage>> {
    let mut messages = Vec::with_capacity(items.len());
    let before = violations.len();

    for (index, item) in items.iter().enumerate() {
        let Some(msg) = item.as_object() else {
            violations.push(FieldViolation::new(format!("messages[{}]", index), "must be an object"));
            continue;
        };

        let role = match msg.get("role").and_then(Value::as_str) {
            Some(raw) => match raw.parse::<Role>() {
                Ok(role) => Some(role),
                Err(_) => {
                    violations.push(FieldViolation::new(
                        format!("messages[{}].role", index),
                        "must be one of system, user, assistant",
                    ));
                    None
                }
            },
            None => {
                violations.push(FieldViolation::new(
                    format!("messages[{}].role", index),
                    "is required and must be a string",
                ));
                None
            }
        };

        let content = match msg.get("content") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::String(_)) => {
                violations.push(FieldViolation::new(format!("messages[{}].content", index), "must not be empty"));
                None
            }
            _ => {
                violations.push(FieldViolation::new(
                    format!("messages[{}].content", index),
                    "is required and must be a string",
                ));
                None
            }
        };

        if let (Some(role), Some(content)) = (role, content) {
            messages.push(ChatMessage { role, content });
        }
    }

    (violations.len() == before).then_some(messages)
}

fn optional_number(
    value: Option<&Value>,
    field: &str,
    range: &RangeInclusive<f64>,
    violations: &mut Vec<FieldViolation>,
) -> Option<f64> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_f64().filter(|n| range.contains(n)) {
            Some(n) => Some(n),
            None => {
                violations.push(FieldViolation::new(
                    field,
                    format!("must be a number between {} and {}", range.start(), range.end()),
                ));
                None
            }
        },
    }
}

impl ChatCompletionRequest {
    /// Re-check the invariants of an already-typed request without touching it
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        if self.model.trim().is_empty() {
            violations.push(FieldViolation::new("model", "must not be empty"));
        }
        if self.messages.is_empty() {
            violations.push(FieldViolation::new("messages", "must not be empty"));
        }
        for (index, message) in self.messages.iter().enumerate() {
            if message.content.trim().is_empty() {
                violations.push(FieldViolation::new(format!("messages[{}].content", index), "must not be empty"));
            }
        }
        if let Some(n) = self.max_tokens {
            if !MAX_TOKENS_RANGE.contains(&u64::from(n)) {
                violations.push(FieldViolation::new("max_tokens", "out of range"));
            }
        }
        if let Some(t) = self.temperature {
            if !TEMPERATURE_RANGE.contains(&t) {
                violations.push(FieldViolation::new("temperature", "out of range"));
            }
        }
        if let Some(p) = self.top_p {
            if !TOP_P_RANGE.contains(&p) {
                violations.push(FieldViolation::new("top_p", "out of range"));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }
}
