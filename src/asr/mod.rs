//! Transcription provider contract.
//!
//! [`AsrProvider`] is the uniform interface over external speech-to-text
//! services. It is object-safe and `Send + Sync` so providers can be held
//! behind `Arc<dyn AsrProvider>` and shared between the dispatcher and the
//! recovery controller.
//!
//! [`HttpAsrProvider`] speaks the transcription service's REST contract.
//! [`MockAsr`] (test-only) returns canned results.

pub mod http;

pub use http::HttpAsrProvider;

use async_trait::async_trait;

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// TranscriptionResult / TranscriptionHints
// ---------------------------------------------------------------------------

/// Immutable output of one transcription call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionResult {
    pub text: String,
    /// Identifier of the provider that produced the text.
    pub provider: String,
}

/// Optional biasing inputs forwarded to the provider.
#[derive(Debug, Clone, Default)]
pub struct TranscriptionHints {
    /// Speech language as an ISO-639-1 code; `None` lets the backend detect.
    pub language: Option<String>,
    /// Vocabulary drawn from the user dictionary (prompt-flagged corrections)
    /// to bias recognition towards domain terms.
    pub vocabulary: Vec<String>,
    /// Free-text prompt prefix for the recognition model.
    pub initial_prompt: Option<String>,
}

impl TranscriptionHints {
    /// Fold the vocabulary and free-text prompt into the single biasing
    /// prompt string the backend accepts.
    pub fn biasing_prompt(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(prompt) = &self.initial_prompt {
            if !prompt.is_empty() {
                parts.push(prompt.clone());
            }
        }
        if !self.vocabulary.is_empty() {
            parts.push(format!("Vocabulary: {}.", self.vocabulary.join(", ")));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

// ---------------------------------------------------------------------------
// AsrProvider trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to a speech-to-text service.
#[async_trait]
pub trait AsrProvider: Send + Sync {
    /// Stable identifier recorded in journal entries and error messages.
    fn id(&self) -> &str;

    /// Transcribe `audio` and return the text with provider attribution.
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        hints: &TranscriptionHints,
    ) -> Result<TranscriptionResult, PipelineError>;
}

// ---------------------------------------------------------------------------
// MockAsr  (test-only)
// ---------------------------------------------------------------------------

/// Test double returning a pre-configured response.
#[cfg(test)]
pub struct MockAsr {
    id: String,
    response: Result<String, PipelineError>,
}

#[cfg(test)]
impl MockAsr {
    /// A mock that always transcribes to `text`.
    pub fn ok(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            response: Ok(text.into()),
        }
    }

    /// A mock that always fails with `error`.
    pub fn err(id: impl Into<String>, error: PipelineError) -> Self {
        Self {
            id: id.into(),
            response: Err(error),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl AsrProvider for MockAsr {
    fn id(&self) -> &str {
        &self.id
    }

    async fn transcribe(
        &self,
        _audio: &[u8],
        _mime_type: &str,
        _hints: &TranscriptionHints,
    ) -> Result<TranscriptionResult, PipelineError> {
        self.response.clone().map(|text| TranscriptionResult {
            text,
            provider: self.id.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biasing_prompt_is_none_when_empty() {
        assert!(TranscriptionHints::default().biasing_prompt().is_none());
    }

    #[test]
    fn biasing_prompt_lists_vocabulary() {
        let hints = TranscriptionHints {
            vocabulary: vec!["heart".into(), "diagnosis".into()],
            ..Default::default()
        };
        assert_eq!(
            hints.biasing_prompt().as_deref(),
            Some("Vocabulary: heart, diagnosis.")
        );
    }

    #[test]
    fn biasing_prompt_combines_prompt_and_vocabulary() {
        let hints = TranscriptionHints {
            initial_prompt: Some("Punctuation matters.".into()),
            vocabulary: vec!["stent".into()],
            ..Default::default()
        };
        assert_eq!(
            hints.biasing_prompt().as_deref(),
            Some("Punctuation matters. Vocabulary: stent.")
        );
    }

    #[tokio::test]
    async fn mock_attributes_its_provider_id() {
        let asr = MockAsr::ok("whisper-a", "hello");
        let result = asr
            .transcribe(&[0u8; 4], "audio/wav", &TranscriptionHints::default())
            .await
            .unwrap();
        assert_eq!(result.provider, "whisper-a");
        assert_eq!(result.text, "hello");
    }
}
