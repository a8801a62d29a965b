//! Error types for the suggestion pipeline
//!
//! Errors are classified by how the pipeline reacts:
//! - Recovered through the fallback chain: service unavailable, gateway
//!   failures, unparseable or empty responses
//! - Surfaced to the user: quota exhaustion
//! - Programmer errors: apply configuration problems (logged, boolean failure)

use thiserror::Error;

/// Failure reported by the AI gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("AI service is not configured")]
    Unavailable,

    #[error("AI request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider error {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("AI service returned an empty response")]
    EmptyResponse,
}

/// Failure to turn response text into a suggestion batch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("No JSON object found in response")]
    NoJson,

    #[error("Malformed JSON: {0}")]
    Malformed(String),

    #[error("Response has no suggestions array")]
    MissingSuggestions,

    #[error("Response contained no usable suggestions")]
    Empty,
}

/// Pipeline error taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuggestError {
    #[error("AI service unavailable")]
    ServiceUnavailable,

    #[error("AI usage limit reached: {reason}")]
    QuotaExceeded { reason: String },

    #[error(transparent)]
    NetworkOrProvider(GatewayError),

    #[error("Could not parse suggestions: {0}")]
    Parse(ParseError),

    #[error("No suggestions returned")]
    EmptySuggestions,

    #[error("Apply configuration error: {0}")]
    ApplyConfiguration(String),

    #[error("Form changed while suggestions were loading")]
    StaleContext,
}

impl SuggestError {
    /// Whether the fallback chain should take over
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SuggestError::ServiceUnavailable
                | SuggestError::NetworkOrProvider(_)
                | SuggestError::Parse(_)
                | SuggestError::EmptySuggestions
        )
    }

    /// Short reason for diagnostics, never shown verbatim to users
    pub fn kind(&self) -> &'static str {
        match self {
            SuggestError::ServiceUnavailable => "service_unavailable",
            SuggestError::QuotaExceeded { .. } => "quota_exceeded",
            SuggestError::NetworkOrProvider(_) => "network_or_provider",
            SuggestError::Parse(_) => "parse",
            SuggestError::EmptySuggestions => "empty_suggestions",
            SuggestError::ApplyConfiguration(_) => "apply_configuration",
            SuggestError::StaleContext => "stale_context",
        }
    }
}

impl From<GatewayError> for SuggestError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable => SuggestError::ServiceUnavailable,
            other => SuggestError::NetworkOrProvider(other),
        }
    }
}

impl From<ParseError> for SuggestError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Empty => SuggestError::EmptySuggestions,
            other => SuggestError::Parse(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_unavailable_maps_to_service_unavailable() {
        let err: SuggestError = GatewayError::Unavailable.into();
        assert_eq!(err, SuggestError::ServiceUnavailable);
        let err: SuggestError = GatewayError::Timeout.into();
        assert!(matches!(err, SuggestError::NetworkOrProvider(_)));
    }

    #[test]
    fn test_empty_parse_maps_to_empty_suggestions() {
        let err: SuggestError = ParseError::Empty.into();
        assert_eq!(err, SuggestError::EmptySuggestions);
    }

    #[test]
    fn test_only_quota_and_apply_errors_are_not_recoverable() {
        assert!(SuggestError::ServiceUnavailable.is_recoverable());
        assert!(SuggestError::Parse(ParseError::NoJson).is_recoverable());
        assert!(SuggestError::EmptySuggestions.is_recoverable());
        assert!(!SuggestError::QuotaExceeded {
            reason: "limit".into()
        }
        .is_recoverable());
        assert!(!SuggestError::ApplyConfiguration("x".into()).is_recoverable());
        assert!(!SuggestError::StaleContext.is_recoverable());
    }
}
