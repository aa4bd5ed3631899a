//! Dictation records and the store contract for them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Opaque dictation identifier assigned by the storage engine.
pub type DictationId = String;

// ---------------------------------------------------------------------------
// DictationStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a dictation.
///
/// ```text
/// Pending ──claimed by dispatcher──▶ Processing
///                                    ──success──▶ Completed
///                                    ──failure──▶ Failed
/// Failed  ──explicit operator retry─▶ Pending
/// Completed ──explicit recorrect────▶ (re-run without status change
///                                      until the new result is persisted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictationStatus {
    /// Submitted, waiting to be claimed.
    Pending,
    /// Claimed by a dispatcher; exactly one worker execution is active.
    Processing,
    /// Final result persisted.
    Completed,
    /// Processing failed; the error message is stored on the record.
    Failed,
}

impl DictationStatus {
    /// Short lowercase label, matching the wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DictationStatus::Pending => "pending",
            DictationStatus::Processing => "processing",
            DictationStatus::Completed => "completed",
            DictationStatus::Failed => "failed",
        }
    }

    /// Whether the status is an end state of a dispatch run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DictationStatus::Completed | DictationStatus::Failed)
    }
}

impl std::fmt::Display for DictationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Dictation
// ---------------------------------------------------------------------------

/// One dictated document moving through the pipeline.
#[derive(Debug, Clone)]
pub struct Dictation {
    pub id: DictationId,
    /// Owning user; selects the correction dictionary.
    pub user: String,
    /// Compressed audio bytes. `None` when fetched without audio.
    pub audio: Option<Vec<u8>>,
    /// MIME type of the audio reference (e.g. `audio/ogg`).
    pub mime_type: String,
    pub status: DictationStatus,
    /// Raw transcript as produced by ASR (before any correction stage).
    pub transcript: Option<String>,
    /// Final corrected text.
    pub corrected_text: Option<String>,
    /// 0–100 amount-changed metric between raw transcript and final text.
    pub change_score: Option<u8>,
    /// Operator-visible error message when `status == Failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dictation {
    /// A freshly submitted dictation holding only audio.
    pub fn new(id: impl Into<DictationId>, user: impl Into<String>, audio: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user: user.into(),
            audio: Some(audio),
            mime_type: "audio/wav".into(),
            status: DictationStatus::Pending,
            transcript: None,
            corrected_text: None,
            change_score: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// DictationStore trait
// ---------------------------------------------------------------------------

/// Read/write contract against the dictation storage engine.
///
/// The pipeline writes the status field once when claiming an item and once
/// when finalising it; no store transaction spans a network call.
#[async_trait]
pub trait DictationStore: Send + Sync {
    /// Up to `limit` pending dictations, ordered by submission time, without
    /// audio bytes.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Dictation>, PipelineError>;

    /// Fetch one dictation, optionally including the audio bytes.
    async fn get(&self, id: &str, with_audio: bool) -> Result<Dictation, PipelineError>;

    /// Transition the status field, replacing the stored error message.
    async fn set_status(
        &self,
        id: &str,
        status: DictationStatus,
        error: Option<&str>,
    ) -> Result<(), PipelineError>;

    /// Persist the pipeline output for a dictation.
    async fn persist_result(
        &self,
        id: &str,
        transcript: &str,
        corrected_text: &str,
        change_score: u8,
    ) -> Result<(), PipelineError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels() {
        assert_eq!(DictationStatus::Pending.as_str(), "pending");
        assert_eq!(DictationStatus::Processing.as_str(), "processing");
        assert_eq!(DictationStatus::Completed.as_str(), "completed");
        assert_eq!(DictationStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn terminal_states() {
        assert!(!DictationStatus::Pending.is_terminal());
        assert!(!DictationStatus::Processing.is_terminal());
        assert!(DictationStatus::Completed.is_terminal());
        assert!(DictationStatus::Failed.is_terminal());
    }

    #[test]
    fn new_dictation_starts_pending_with_audio() {
        let d = Dictation::new("d-1", "alice", vec![1, 2, 3]);
        assert_eq!(d.status, DictationStatus::Pending);
        assert_eq!(d.audio.as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(d.transcript.is_none());
        assert!(d.error.is_none());
    }
}
