//! Correction-side stage runner.
//!
//! Runs preprocess → (optional) reconcile → final correction over a raw
//! transcript, journaling every stage transition. The dispatcher calls this
//! after transcription; the recovery controller calls it again during
//! recorrect with transcripts recovered from the journal — same stages, same
//! journaling, no audio involved.
//!
//! Fail-soft rules, per stage:
//! * preprocessing is deterministic and cannot fail;
//! * a reconciliation failure falls back to the preprocessed primary text;
//! * a final-correction failure keeps the best available text and is
//!   reported via [`StageOutcome::correction_error`] so the caller can
//!   persist the text *and* surface the failure;
//! * journal write failures are fatal — an unrecorded stage transition must
//!   never be silently dropped.

use std::sync::Arc;

use crate::asr::TranscriptionResult;
use crate::config::AppConfig;
use crate::correct::CorrectionEngine;
use crate::dictionary::{prompt_terms, DictionaryEntry};
use crate::error::PipelineError;
use crate::llm::{LlmProvider, MergeContext};
use crate::preprocess::Preprocessor;
use crate::reconcile::Reconciler;
use crate::store::{
    Attribution, CorrectionLogEntry, CorrectionLogStore, CorrectionStage,
};
use crate::text::change_score;

// ---------------------------------------------------------------------------
// StageOutcome
// ---------------------------------------------------------------------------

/// Result of running the correction-side stages once.
pub struct StageOutcome {
    /// The raw transcript the stages started from.
    pub raw: String,
    /// Best available text after all stages that succeeded.
    pub final_text: String,
    /// Change score between `raw` and `final_text`.
    pub score: u8,
    /// Set when the final correction stage failed; `final_text` then holds
    /// the preprocessed/merged text instead of losing the item.
    pub correction_error: Option<PipelineError>,
}

// ---------------------------------------------------------------------------
// StageRunner
// ---------------------------------------------------------------------------

/// Shared by the dispatcher (normal processing) and the recovery controller
/// (recorrect).
pub struct StageRunner {
    journal: Arc<dyn CorrectionLogStore>,
    llm: Arc<dyn LlmProvider>,
    reconciler: Reconciler,
    engine: CorrectionEngine,
    merge_note: Option<String>,
}

impl StageRunner {
    pub fn new(
        journal: Arc<dyn CorrectionLogStore>,
        llm: Arc<dyn LlmProvider>,
        config: &AppConfig,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(Arc::clone(&llm), config.llm.temperature),
            engine: CorrectionEngine::new(Arc::clone(&llm), config.llm.temperature),
            merge_note: config.llm.merge_prompt_override.clone(),
            journal,
            llm,
        }
    }

    /// Run preprocess → reconcile → correct for one dictation.
    ///
    /// `secondary` enables the double-precision path. `date` is the
    /// dictation date embedded in the merge context.
    pub async fn run(
        &self,
        id: &str,
        primary: &TranscriptionResult,
        secondary: Option<&TranscriptionResult>,
        dictionary: &[DictionaryEntry],
        date: Option<String>,
    ) -> Result<StageOutcome, PipelineError> {
        let raw = primary.text.clone();
        let preprocessor = Preprocessor::new(dictionary.to_vec());

        // ── 1. Deterministic preprocessing ───────────────────────────────
        let preprocessed = preprocessor.apply(&raw);
        if preprocessed != raw {
            self.append(CorrectionLogEntry::new(
                id,
                CorrectionStage::Formatting,
                raw.clone(),
                preprocessed.clone(),
                change_score(&raw, &preprocessed),
                Attribution::model("rules", "preprocessor"),
            ))
            .await?;
        }
        let mut current = preprocessed;

        // ── 2. Double-precision reconciliation (optional) ────────────────
        if let Some(secondary) = secondary {
            let secondary_pre = TranscriptionResult {
                text: preprocessor.apply(&secondary.text),
                provider: secondary.provider.clone(),
            };
            let primary_pre = TranscriptionResult {
                text: current.clone(),
                provider: primary.provider.clone(),
            };
            let context = MergeContext {
                date,
                vocabulary: prompt_terms(dictionary)
                    .into_iter()
                    .map(|(wrong, correct)| (wrong.to_string(), correct.to_string()))
                    .collect(),
                operator_note: self.merge_note.clone(),
                ..MergeContext::default()
            };

            match self
                .reconciler
                .reconcile(&primary_pre, &secondary_pre, &context)
                .await
            {
                Ok(outcome) => {
                    let model = outcome
                        .model
                        .clone()
                        .unwrap_or_else(|| "none".to_string());
                    self.append(
                        CorrectionLogEntry::new(
                            id,
                            CorrectionStage::DoublePrecision,
                            current.clone(),
                            outcome.text.clone(),
                            change_score(&current, &outcome.text),
                            Attribution::model(model, self.llm.id()),
                        )
                        .with_sources(outcome.merged.sources()),
                    )
                    .await?;
                    current = outcome.text;
                }
                Err(e) => {
                    // Fail soft: reconciliation is not worth losing the item.
                    log::warn!(
                        "stages: reconciliation for {id} failed ({e}), keeping primary transcript"
                    );
                }
            }
        }

        // ── 3. Final LLM correction ──────────────────────────────────────
        let (final_text, correction_error) = match self.engine.correct(&current).await {
            Ok(corrected) => {
                if corrected != current {
                    self.append(CorrectionLogEntry::new(
                        id,
                        CorrectionStage::Llm,
                        current.clone(),
                        corrected.clone(),
                        change_score(&current, &corrected),
                        Attribution::model(self.engine.model(), self.engine.provider_id()),
                    ))
                    .await?;
                }
                (corrected, None)
            }
            Err(e) => {
                log::error!("stages: final correction for {id} failed: {e}");
                (current, Some(e))
            }
        };

        Ok(StageOutcome {
            score: change_score(&raw, &final_text),
            raw,
            final_text,
            correction_error,
        })
    }

    async fn append(&self, entry: CorrectionLogEntry) -> Result<(), PipelineError> {
        self.journal.append(entry).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::MockLlm;
    use crate::store::journal::chain_is_composed;
    use crate::store::MemoryStore;

    fn runner(llm: MockLlm) -> (StageRunner, MemoryStore) {
        let store = MemoryStore::new();
        let journal: Arc<dyn CorrectionLogStore> = Arc::new(store.clone());
        let runner = StageRunner::new(journal, Arc::new(llm), &AppConfig::default());
        (runner, store)
    }

    fn transcript(provider: &str, text: &str) -> TranscriptionResult {
        TranscriptionResult {
            text: text.into(),
            provider: provider.into(),
        }
    }

    #[tokio::test]
    async fn single_precision_journals_formatting_and_llm_stages() {
        let (runner, store) = runner(MockLlm::fixed("Heart rate stable."));
        let primary = transcript("asr-a", "hart rate stable period");
        let dictionary = vec![crate::dictionary::DictionaryEntry::new("hart", "heart")];

        let outcome = runner
            .run("d-1", &primary, None, &dictionary, None)
            .await
            .unwrap();

        assert_eq!(outcome.raw, "hart rate stable period");
        assert_eq!(outcome.final_text, "Heart rate stable.");
        assert!(outcome.correction_error.is_none());

        let entries = store.query_by_dictation("d-1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stage, CorrectionStage::Formatting);
        assert_eq!(entries[0].text_before, "hart rate stable period");
        assert_eq!(entries[0].text_after, "heart rate stable.");
        assert_eq!(entries[1].stage, CorrectionStage::Llm);
        assert!(chain_is_composed(&entries));
    }

    #[tokio::test]
    async fn double_precision_entry_retains_both_sources() {
        let (runner, store) = runner(MockLlm::fixed("Heart rate 90."));
        let primary = transcript("asr-a", "Heart rate 80.");
        let secondary = transcript("asr-b", "Heart rate 90.");

        runner
            .run("d-1", &primary, Some(&secondary), &[], None)
            .await
            .unwrap();

        let entries = store.query_by_dictation("d-1").await.unwrap();
        let dp = entries
            .iter()
            .find(|e| e.stage == CorrectionStage::DoublePrecision)
            .expect("double-precision entry");
        let sources = dp.sources.as_ref().expect("sources retained");
        assert_eq!(sources.primary.text, "Heart rate 80.");
        assert_eq!(sources.secondary.text, "Heart rate 90.");
        assert!(chain_is_composed(&entries));
    }

    #[tokio::test]
    async fn equivalent_transcripts_still_journal_the_reconciliation() {
        // Fixed reply equals input so the LLM correction stage is a no-op,
        // and equal transcripts must skip the merge call entirely — but the
        // double-precision entry is still appended.
        let (runner, store) = runner(MockLlm::fixed("Same text."));
        let primary = transcript("asr-a", "Same text.");
        let secondary = transcript("asr-b", "Same text.");

        let outcome = runner
            .run("d-1", &primary, Some(&secondary), &[], None)
            .await
            .unwrap();
        assert_eq!(outcome.final_text, "Same text.");

        let entries = store.query_by_dictation("d-1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].stage, CorrectionStage::DoublePrecision);
        assert_eq!(entries[0].change_score, 0);
        match &entries[0].attribution {
            Attribution::Model { model, .. } => assert_eq!(model, "none"),
            other => panic!("unexpected attribution {other:?}"),
        }
    }

    #[tokio::test]
    async fn correction_failure_keeps_best_text_and_reports_error() {
        let (runner, store) = runner(MockLlm::fail(PipelineError::unavailable("mock", "down")));
        let primary = transcript("asr-a", "hart rate stable");
        let dictionary = vec![crate::dictionary::DictionaryEntry::new("hart", "heart")];

        let outcome = runner
            .run("d-1", &primary, None, &dictionary, None)
            .await
            .unwrap();

        // Best available text is the preprocessed one.
        assert_eq!(outcome.final_text, "heart rate stable");
        assert!(matches!(
            outcome.correction_error,
            Some(PipelineError::ProviderUnavailable { .. })
        ));

        // Only the formatting stage made it into the journal.
        let entries = store.query_by_dictation("d-1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].stage, CorrectionStage::Formatting);
    }

    #[tokio::test]
    async fn no_formatting_entry_when_preprocessing_changes_nothing() {
        let (runner, store) = runner(MockLlm::echo());
        let primary = transcript("asr-a", "Already clean text.");

        runner.run("d-1", &primary, None, &[], None).await.unwrap();

        let entries = store.query_by_dictation("d-1").await.unwrap();
        assert!(entries
            .iter()
            .all(|e| e.stage != CorrectionStage::Formatting));
    }

    #[tokio::test]
    async fn score_spans_raw_to_final() {
        let (runner, _store) = runner(MockLlm::fixed("completely different words here"));
        let primary = transcript("asr-a", "original input text");

        let outcome = runner.run("d-1", &primary, None, &[], None).await.unwrap();
        assert_eq!(outcome.score, 100);
    }
}
