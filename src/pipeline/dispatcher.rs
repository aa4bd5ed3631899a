//! Queue dispatcher — claims pending dictations and drives them through the
//! pipeline.
//!
//! One dispatch run claims up to `batch_size` pending items (oldest first)
//! and processes them **sequentially** — external API concurrency stays
//! bounded and failure isolation stays simple. One item failing is captured,
//! the item is marked `failed` with the error text, and the batch continues.
//!
//! A [`SingleFlight`] lock guards the whole operation: a concurrent trigger
//! observes the lock held and returns an `already_running` summary
//! immediately instead of blocking.

use std::sync::Arc;

use crate::asr::{AsrProvider, TranscriptionHints, TranscriptionResult};
use crate::config::AppConfig;
use crate::dictionary::{prompt_terms, DictionaryProvider};
use crate::error::PipelineError;
use crate::llm::LlmProvider;
use crate::pipeline::single_flight::SingleFlight;
use crate::pipeline::stages::StageRunner;
use crate::store::{CorrectionLogStore, DictationStatus, DictationStore};

// ---------------------------------------------------------------------------
// DispatchSummary
// ---------------------------------------------------------------------------

/// What one dispatch invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchSummary {
    /// Items that completed successfully.
    pub processed: usize,
    /// Items that failed and were marked `failed`.
    pub errors: usize,
    /// Pending items left in the queue after this run (up to batch size).
    pub remaining: usize,
    /// The trigger was rejected because a dispatch was already running.
    pub already_running: bool,
}

impl DispatchSummary {
    fn already_running() -> Self {
        Self {
            already_running: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Claims and processes batches of pending dictations.
pub struct Dispatcher {
    store: Arc<dyn DictationStore>,
    dictionary: Arc<dyn DictionaryProvider>,
    primary_asr: Arc<dyn AsrProvider>,
    secondary_asr: Option<Arc<dyn AsrProvider>>,
    stages: StageRunner,
    config: AppConfig,
    lock: SingleFlight,
}

impl Dispatcher {
    /// Build a dispatcher.
    ///
    /// The single-flight `lock` is injected so callers (and tests) control
    /// its scope; share one lock between all triggers of one process.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DictationStore>,
        journal: Arc<dyn CorrectionLogStore>,
        dictionary: Arc<dyn DictionaryProvider>,
        primary_asr: Arc<dyn AsrProvider>,
        secondary_asr: Option<Arc<dyn AsrProvider>>,
        llm: Arc<dyn LlmProvider>,
        config: AppConfig,
        lock: SingleFlight,
    ) -> Self {
        Self {
            stages: StageRunner::new(journal, llm, &config),
            store,
            dictionary,
            primary_asr,
            secondary_asr,
            config,
            lock,
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Claim and process one batch of pending dictations.
    pub async fn dispatch(&self) -> DispatchSummary {
        let Some(_guard) = self.lock.try_acquire() else {
            log::info!("dispatch: already processing, rejecting concurrent trigger");
            return DispatchSummary::already_running();
        };

        let batch = match self.store.fetch_pending(self.config.queue.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                log::error!("dispatch: could not fetch pending dictations: {e}");
                return DispatchSummary::default();
            }
        };
        if batch.is_empty() {
            return DispatchSummary::default();
        }
        log::info!("dispatch: claimed {} pending dictation(s)", batch.len());

        let mut processed = 0usize;
        let mut errors = 0usize;

        for item in &batch {
            if let Err(e) = self
                .store
                .set_status(&item.id, DictationStatus::Processing, None)
                .await
            {
                log::error!("dispatch: could not claim {}: {e}", item.id);
                errors += 1;
                continue;
            }

            match self.process_item(&item.id, &item.user).await {
                Ok(()) => {
                    processed += 1;
                    log::info!("dispatch: {} completed", item.id);
                }
                Err(e) => {
                    errors += 1;
                    log::error!("dispatch: {} failed: {e}", item.id);
                    if let Err(persist_err) = self
                        .store
                        .set_status(&item.id, DictationStatus::Failed, Some(&e.to_string()))
                        .await
                    {
                        log::error!(
                            "dispatch: could not mark {} failed: {persist_err}",
                            item.id
                        );
                    }
                }
            }
        }

        let remaining = self
            .store
            .fetch_pending(self.config.queue.batch_size)
            .await
            .map(|pending| pending.len())
            .unwrap_or(0);

        log::info!(
            "dispatch: batch done — processed {processed}, errors {errors}, remaining {remaining}"
        );
        DispatchSummary {
            processed,
            errors,
            remaining,
            already_running: false,
        }
    }

    // -----------------------------------------------------------------------
    // Per-item pipeline
    // -----------------------------------------------------------------------

    /// Drive one dictation end-to-end. The caller finalises status on error.
    async fn process_item(&self, id: &str, user: &str) -> Result<(), PipelineError> {
        let dictation = self.store.get(id, true).await?;
        let audio = dictation
            .audio
            .as_deref()
            .filter(|audio| !audio.is_empty())
            .ok_or_else(|| PipelineError::Validation("dictation has no audio".into()))?;

        let dictionary = match self.dictionary.load(user).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("dispatch: dictionary for {user} unavailable ({e}), continuing without");
                Vec::new()
            }
        };

        let hints = TranscriptionHints {
            language: Some(self.config.asr.language.clone()),
            vocabulary: prompt_terms(&dictionary)
                .into_iter()
                .map(|(_, correct)| correct.to_string())
                .collect(),
            initial_prompt: None,
        };

        let (primary, secondary) = self
            .transcribe(audio, &dictation.mime_type, &hints)
            .await?;

        let outcome = self
            .stages
            .run(
                id,
                &primary,
                secondary.as_ref(),
                &dictionary,
                Some(dictation.created_at.format("%Y-%m-%d").to_string()),
            )
            .await?;

        self.store
            .persist_result(id, &outcome.raw, &outcome.final_text, outcome.score)
            .await?;

        // The best available text is persisted either way; a failed final
        // correction still surfaces its error to the operator.
        if let Some(e) = outcome.correction_error {
            return Err(e);
        }

        self.store
            .set_status(id, DictationStatus::Completed, None)
            .await?;
        Ok(())
    }

    /// Transcribe once or twice depending on configuration.
    ///
    /// Double precision runs both providers in parallel; losing one of the
    /// two degrades to single precision instead of failing the item. Without
    /// double precision the secondary acts as a fallback for a failing
    /// primary.
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        hints: &TranscriptionHints,
    ) -> Result<(TranscriptionResult, Option<TranscriptionResult>), PipelineError> {
        match &self.secondary_asr {
            Some(secondary) if self.config.asr.double_precision => {
                let (primary_result, secondary_result) = tokio::join!(
                    self.primary_asr.transcribe(audio, mime_type, hints),
                    secondary.transcribe(audio, mime_type, hints),
                );
                match (primary_result, secondary_result) {
                    (Ok(primary), Ok(secondary)) => Ok((primary, Some(secondary))),
                    (Ok(primary), Err(e)) => {
                        log::warn!(
                            "transcribe: secondary {} failed ({e}), degrading to single precision",
                            secondary.id()
                        );
                        Ok((primary, None))
                    }
                    (Err(e), Ok(secondary_only)) => {
                        log::warn!(
                            "transcribe: primary {} failed ({e}), using secondary transcript",
                            self.primary_asr.id()
                        );
                        Ok((secondary_only, None))
                    }
                    (Err(primary_err), Err(secondary_err)) => {
                        log::error!(
                            "transcribe: both providers failed (primary: {primary_err}; secondary: {secondary_err})"
                        );
                        Err(primary_err)
                    }
                }
            }
            Some(secondary) => match self.primary_asr.transcribe(audio, mime_type, hints).await {
                Ok(primary) => Ok((primary, None)),
                Err(primary_err) => {
                    log::warn!(
                        "transcribe: primary {} failed ({primary_err}), falling back to {}",
                        self.primary_asr.id(),
                        secondary.id()
                    );
                    match secondary.transcribe(audio, mime_type, hints).await {
                        Ok(fallback) => Ok((fallback, None)),
                        Err(e) => {
                            log::error!("transcribe: fallback {} failed too: {e}", secondary.id());
                            Err(primary_err)
                        }
                    }
                }
            },
            None => Ok((
                self.primary_asr.transcribe(audio, mime_type, hints).await?,
                None,
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
