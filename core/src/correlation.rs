//! Request correlation identifiers

use crate::errors::CoreError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the correlation identifier in both directions
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Opaque identifier linking the log lines of one request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh server-side identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the identifier for a request under the given policy.
    ///
    /// A blank header counts as missing.
    pub fn resolve(header: Option<&str>, policy: CorrelationPolicy) -> Result<Self, CoreError> {
        let provided = header.map(str::trim).filter(|s| !s.is_empty());

        match (provided, policy) {
            (Some(id), _) => Ok(Self::new(id)),
            (None, CorrelationPolicy::Generated) => Ok(Self::generate()),
            (None, CorrelationPolicy::Required) => Err(CoreError::MissingCorrelationId),
        }
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who supplies the correlation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrelationPolicy {
    /// Callers must send `X-Request-ID`; requests without it are rejected
    Required,
    /// Use the caller's header when present, otherwise generate one
    #[default]
    Generated,
}

impl std::fmt::Display for CorrelationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrelationPolicy::Required => write!(f, "required"),
            CorrelationPolicy::Generated => write!(f, "generated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_wins_under_both_policies() {
        for policy in [CorrelationPolicy::Required, CorrelationPolicy::Generated] {
            let id = CorrelationId::resolve(Some("req-42"), policy).unwrap();
            assert_eq!(id.as_str(), "req-42");
        }
    }

    #[test]
    fn test_required_policy_rejects_missing_header() {
        let err = CorrelationId::resolve(None, CorrelationPolicy::Required).unwrap_err();
        assert!(matches!(err, CoreError::MissingCorrelationId));
        assert_eq!(err.to_string(), "X-Request-ID header is required");

        assert!(CorrelationId::resolve(Some("  "), CorrelationPolicy::Required).is_err());
    }

    #[test]
    fn test_generated_policy_creates_unique_ids() {
        let a = CorrelationId::resolve(None, CorrelationPolicy::Generated).unwrap();
        let b = CorrelationId::resolve(None, CorrelationPolicy::Generated).unwrap();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_policy_serde_names() {
        let policy: CorrelationPolicy = serde_json::from_str("\"required\"").unwrap();
        assert_eq!(policy, CorrelationPolicy::Required);
    }
}
