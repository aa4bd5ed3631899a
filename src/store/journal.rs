//! Append-only correction journal.
//!
//! Every stage transition appends one [`CorrectionLogEntry`]: what the text
//! looked like before, what the stage turned it into, how much changed, and
//! who (model or human) made the change. For a given dictation the chain
//! composes — entry N's `text_after` equals entry N+1's `text_before` — so
//! the end-to-end diff from raw transcript to final text can always be
//! reconstructed, and double-precision entries carry both source transcripts
//! verbatim so the merge can be replayed without re-transcribing audio.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::store::dictation::DictationId;

// ---------------------------------------------------------------------------
// CorrectionStage
// ---------------------------------------------------------------------------

/// Which pipeline stage produced a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CorrectionStage {
    /// Deterministic preprocessing (directives + dictionary).
    Formatting,
    /// Final LLM correction.
    Llm,
    /// Double-precision reconciliation of two transcriptions.
    DoublePrecision,
    /// A human edit recorded after review.
    Manual,
}

impl std::fmt::Display for CorrectionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CorrectionStage::Formatting => "formatting",
            CorrectionStage::Llm => "llm",
            CorrectionStage::DoublePrecision => "doublePrecision",
            CorrectionStage::Manual => "manual",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

/// Who produced a change: a model (with its provider) or a human reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attribution {
    Model { model: String, provider: String },
    User(String),
}

impl Attribution {
    /// Convenience constructor for model attribution.
    pub fn model(model: impl Into<String>, provider: impl Into<String>) -> Self {
        Attribution::Model {
            model: model.into(),
            provider: provider.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptSource / ReconciliationSources
// ---------------------------------------------------------------------------

/// One provider-attributed transcript, kept verbatim for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSource {
    pub provider: String,
    pub text: String,
}

/// The pair of independent transcriptions behind a double-precision entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSources {
    pub primary: TranscriptSource,
    pub secondary: TranscriptSource,
}

// ---------------------------------------------------------------------------
// CorrectionLogEntry
// ---------------------------------------------------------------------------

/// One stage transition in a dictation's correction history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionLogEntry {
    pub dictation_id: DictationId,
    pub stage: CorrectionStage,
    pub text_before: String,
    pub text_after: String,
    /// 0–100 amount changed by this stage.
    pub change_score: u8,
    pub attribution: Attribution,
    /// Present only on [`CorrectionStage::DoublePrecision`] entries: both
    /// source transcripts, so the merge can be re-run later under a
    /// different model or configuration.
    pub sources: Option<ReconciliationSources>,
    pub created_at: DateTime<Utc>,
}

impl CorrectionLogEntry {
    /// Build an entry stamped now.
    pub fn new(
        dictation_id: impl Into<DictationId>,
        stage: CorrectionStage,
        text_before: impl Into<String>,
        text_after: impl Into<String>,
        change_score: u8,
        attribution: Attribution,
    ) -> Self {
        Self {
            dictation_id: dictation_id.into(),
            stage,
            text_before: text_before.into(),
            text_after: text_after.into(),
            change_score,
            attribution,
            sources: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the double-precision source pair.
    pub fn with_sources(mut self, sources: ReconciliationSources) -> Self {
        self.sources = Some(sources);
        self
    }
}

// ---------------------------------------------------------------------------
// CorrectionLogStore trait
// ---------------------------------------------------------------------------

/// Append-only store for [`CorrectionLogEntry`] values.
#[async_trait]
pub trait CorrectionLogStore: Send + Sync {
    /// Append one entry. Entries are never updated or deleted.
    async fn append(&self, entry: CorrectionLogEntry) -> Result<(), PipelineError>;

    /// All entries for a dictation, ordered by creation time.
    async fn query_by_dictation(
        &self,
        id: &str,
    ) -> Result<Vec<CorrectionLogEntry>, PipelineError>;
}

// ---------------------------------------------------------------------------
// Chain helpers
// ---------------------------------------------------------------------------

/// Does the entry chain compose — each `text_after` feeding the next
/// `text_before`?
pub fn chain_is_composed(entries: &[CorrectionLogEntry]) -> bool {
    entries
        .windows(2)
        .all(|pair| pair[0].text_after == pair[1].text_before)
}

/// The most recent double-precision source pair, if any.
///
/// Recorrect uses this to replay the merge without re-transcribing audio.
pub fn latest_sources(entries: &[CorrectionLogEntry]) -> Option<&ReconciliationSources> {
    entries
        .iter()
        .rev()
        .find_map(|entry| entry.sources.as_ref())
}

/// The text after the last recorded stage, if any entries exist.
pub fn final_text(entries: &[CorrectionLogEntry]) -> Option<&str> {
    entries.last().map(|entry| entry.text_after.as_str())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(stage: CorrectionStage, before: &str, after: &str) -> CorrectionLogEntry {
        CorrectionLogEntry::new(
            "d-1",
            stage,
            before,
            after,
            crate::text::change_score(before, after),
            Attribution::model("test-model", "test-provider"),
        )
    }

    #[test]
    fn chain_composes_when_entries_link() {
        let entries = vec![
            entry(CorrectionStage::Formatting, "raw text", "formatted text"),
            entry(CorrectionStage::Llm, "formatted text", "final text"),
        ];
        assert!(chain_is_composed(&entries));
    }

    #[test]
    fn broken_chain_is_detected() {
        let entries = vec![
            entry(CorrectionStage::Formatting, "raw", "formatted"),
            entry(CorrectionStage::Llm, "something else", "final"),
        ];
        assert!(!chain_is_composed(&entries));
    }

    #[test]
    fn empty_and_single_chains_compose() {
        assert!(chain_is_composed(&[]));
        assert!(chain_is_composed(&[entry(
            CorrectionStage::Llm,
            "a",
            "b"
        )]));
    }

    #[test]
    fn latest_sources_finds_most_recent_pair() {
        let sources_old = ReconciliationSources {
            primary: TranscriptSource {
                provider: "asr-a".into(),
                text: "old one".into(),
            },
            secondary: TranscriptSource {
                provider: "asr-b".into(),
                text: "old two".into(),
            },
        };
        let sources_new = ReconciliationSources {
            primary: TranscriptSource {
                provider: "asr-a".into(),
                text: "new one".into(),
            },
            secondary: TranscriptSource {
                provider: "asr-b".into(),
                text: "new two".into(),
            },
        };
        let entries = vec![
            entry(CorrectionStage::DoublePrecision, "a", "b").with_sources(sources_old),
            entry(CorrectionStage::Llm, "b", "c"),
            entry(CorrectionStage::DoublePrecision, "c", "d").with_sources(sources_new.clone()),
        ];
        assert_eq!(latest_sources(&entries), Some(&sources_new));
    }

    #[test]
    fn latest_sources_none_without_double_precision() {
        let entries = vec![entry(CorrectionStage::Formatting, "a", "b")];
        assert!(latest_sources(&entries).is_none());
    }

    #[test]
    fn final_text_is_last_after() {
        let entries = vec![
            entry(CorrectionStage::Formatting, "a", "b"),
            entry(CorrectionStage::Llm, "b", "c"),
        ];
        assert_eq!(final_text(&entries), Some("c"));
        assert_eq!(final_text(&[]), None);
    }
}
