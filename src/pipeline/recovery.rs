//! Retry and recorrect — the operator-facing recovery paths.
//!
//! There is **no automatic retry loop**: a failed dictation stays failed,
//! with its error visible, until an operator explicitly re-queues it.
//! Silent retries would mask a systemic backend outage.
//!
//! **Recorrect** is distinct from retry: it re-runs only the correction-side
//! stages (preprocessing, reconciliation, final correction) from transcripts
//! already in the journal, without re-invoking transcription — useful after
//! a model, provider or dictionary configuration change.

use std::sync::Arc;

use crate::asr::TranscriptionResult;
use crate::config::AppConfig;
use crate::dictionary::DictionaryProvider;
use crate::error::PipelineError;
use crate::llm::LlmProvider;
use crate::pipeline::stages::StageRunner;
use crate::store::journal::latest_sources;
use crate::store::{CorrectionLogStore, DictationStatus, DictationStore};

// ---------------------------------------------------------------------------
// RecoveryController
// ---------------------------------------------------------------------------

/// Operator entry points for re-running work.
pub struct RecoveryController {
    store: Arc<dyn DictationStore>,
    journal: Arc<dyn CorrectionLogStore>,
    dictionary: Arc<dyn DictionaryProvider>,
    stages: StageRunner,
}

impl RecoveryController {
    pub fn new(
        store: Arc<dyn DictationStore>,
        journal: Arc<dyn CorrectionLogStore>,
        dictionary: Arc<dyn DictionaryProvider>,
        llm: Arc<dyn LlmProvider>,
        config: &AppConfig,
    ) -> Self {
        Self {
            stages: StageRunner::new(Arc::clone(&journal), llm, config),
            store,
            journal,
            dictionary,
        }
    }

    // -----------------------------------------------------------------------
    // Retry
    // -----------------------------------------------------------------------

    /// Re-queue a failed dictation (`failed → pending`).
    ///
    /// Any other status is a [`PipelineError::Validation`]: pending and
    /// processing items are already owned by the dispatcher, and completed
    /// items go through [`recorrect`](Self::recorrect) instead.
    pub async fn retry(&self, id: &str) -> Result<(), PipelineError> {
        let dictation = self.store.get(id, false).await?;
        if dictation.status != DictationStatus::Failed {
            return Err(PipelineError::Validation(format!(
                "retry requires a failed dictation; {id} is {}",
                dictation.status
            )));
        }
        log::info!("recovery: re-queueing failed dictation {id}");
        self.store
            .set_status(id, DictationStatus::Pending, None)
            .await
    }

    /// Release a dictation stuck in `processing` back to `pending`.
    ///
    /// Covers a worker that died mid-item (e.g. process restart). Whether an
    /// item is "stuck" is an operator judgement against a staleness
    /// threshold — this is deliberately an explicit call, not a background
    /// sweep.
    pub async fn release_stuck(&self, id: &str) -> Result<(), PipelineError> {
        let dictation = self.store.get(id, false).await?;
        if dictation.status != DictationStatus::Processing {
            return Err(PipelineError::Validation(format!(
                "release requires a processing dictation; {id} is {}",
                dictation.status
            )));
        }
        log::warn!("recovery: releasing stuck dictation {id} back to pending");
        self.store
            .set_status(id, DictationStatus::Pending, None)
            .await
    }

    // -----------------------------------------------------------------------
    // Recorrect
    // -----------------------------------------------------------------------

    /// Re-run the correction-side stages from journaled transcripts.
    ///
    /// Works on completed and failed dictations. When the journal holds a
    /// double-precision source pair, the merge is replayed from both
    /// transcripts; otherwise the stored raw transcript is used. Audio is
    /// never touched.
    pub async fn recorrect(&self, id: &str) -> Result<(), PipelineError> {
        let dictation = self.store.get(id, false).await?;
        if !dictation.status.is_terminal() {
            return Err(PipelineError::Validation(format!(
                "recorrect requires a completed or failed dictation; {id} is {}",
                dictation.status
            )));
        }

        let entries = self.journal.query_by_dictation(id).await?;
        let (primary, secondary) = match latest_sources(&entries) {
            Some(sources) => (
                TranscriptionResult {
                    text: sources.primary.text.clone(),
                    provider: sources.primary.provider.clone(),
                },
                Some(TranscriptionResult {
                    text: sources.secondary.text.clone(),
                    provider: sources.secondary.provider.clone(),
                }),
            ),
            None => {
                let raw = dictation
                    .transcript
                    .clone()
                    .or_else(|| entries.first().map(|entry| entry.text_before.clone()))
                    .ok_or_else(|| {
                        PipelineError::Validation(format!(
                            "no logged transcript to recorrect {id} from"
                        ))
                    })?;
                (
                    TranscriptionResult {
                        text: raw,
                        provider: "journal".into(),
                    },
                    None,
                )
            }
        };

        log::info!(
            "recovery: recorrecting {id} from journaled transcripts (double precision: {})",
            secondary.is_some()
        );
        self.store
            .set_status(id, DictationStatus::Processing, None)
            .await?;

        let dictionary = match self.dictionary.load(&dictation.user).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!(
                    "recovery: dictionary for {} unavailable ({e}), continuing without",
                    dictation.user
                );
                Vec::new()
            }
        };

        let date = Some(dictation.created_at.format("%Y-%m-%d").to_string());
        let result = self
            .stages
            .run(id, &primary, secondary.as_ref(), &dictionary, date)
            .await;

        match result {
            Ok(outcome) => {
                // The record's raw transcript stays the original one; only
                // the corrected text and score move.
                let transcript = dictation.transcript.as_deref().unwrap_or(&outcome.raw);
                self.store
                    .persist_result(id, transcript, &outcome.final_text, outcome.score)
                    .await?;
                if let Some(e) = outcome.correction_error {
                    self.store
                        .set_status(id, DictationStatus::Failed, Some(&e.to_string()))
                        .await?;
                    return Err(e);
                }
                self.store
                    .set_status(id, DictationStatus::Completed, None)
                    .await
            }
            Err(e) => {
                self.store
                    .set_status(id, DictationStatus::Failed, Some(&e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
