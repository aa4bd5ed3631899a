//! Crate-wide error taxonomy.
//!
//! Every stage of the pipeline maps its failures onto [`PipelineError`] so
//! the dispatcher can apply one set of rules:
//!
//! | Variant               | Meaning                                   | Operator-retryable |
//! |-----------------------|-------------------------------------------|--------------------|
//! | `Validation`          | bad input, will never succeed as-is       | no                 |
//! | `ProviderUnavailable` | network error / timeout                   | yes                |
//! | `ProviderRejected`    | provider-side 4xx (credentials, quota)    | no (surfaced)      |
//! | `Parse`               | model output unusable                     | no (fail-soft)     |
//! | `Persistence`         | store write failed                        | yes                |
//!
//! Non-critical stages (formatting, reconciliation) fail soft: the caller
//! falls back to the previous stage's text instead of failing the item.

use thiserror::Error;

/// Failure taxonomy shared by every pipeline stage.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The input can never be processed as-is (e.g. a dictation without
    /// audio). Retrying without changing the record is pointless.
    #[error("invalid input: {0}")]
    Validation(String),

    /// An external provider could not be reached or timed out.
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// An external provider actively refused the request (4xx).
    #[error("{provider} rejected the request (status {status}): {message}")]
    ProviderRejected {
        provider: String,
        status: u16,
        message: String,
    },

    /// A model reply could not be parsed into usable text.
    #[error("unusable model output: {0}")]
    Parse(String),

    /// A store write failed. Fatal for the affected item; never swallowed.
    #[error("store write failed: {0}")]
    Persistence(String),
}

impl PipelineError {
    /// Whether an operator re-queue is a sensible response to this failure.
    pub fn is_operator_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::ProviderUnavailable { .. } | PipelineError::Persistence(_)
        )
    }

    /// Shorthand for a [`PipelineError::ProviderUnavailable`] value.
    pub fn unavailable(provider: &str, reason: impl Into<String>) -> Self {
        PipelineError::ProviderUnavailable {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`PipelineError::ProviderRejected`] value.
    pub fn rejected(provider: &str, status: u16, message: impl Into<String>) -> Self {
        PipelineError::ProviderRejected {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_retryable() {
        assert!(PipelineError::unavailable("whisper", "connection refused").is_operator_retryable());
    }

    #[test]
    fn persistence_is_retryable() {
        assert!(PipelineError::Persistence("disk full".into()).is_operator_retryable());
    }

    #[test]
    fn validation_is_not_retryable() {
        assert!(!PipelineError::Validation("no audio".into()).is_operator_retryable());
    }

    #[test]
    fn rejected_is_not_retryable() {
        assert!(!PipelineError::rejected("openai", 401, "bad key").is_operator_retryable());
    }

    #[test]
    fn display_includes_provider_and_status() {
        let e = PipelineError::rejected("openai", 429, "quota");
        let s = e.to_string();
        assert!(s.contains("openai"));
        assert!(s.contains("429"));
    }
}
