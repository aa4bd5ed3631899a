//! Double-precision reconciliation.
//!
//! When a dictation is transcribed twice by independent providers, the two
//! transcripts are aligned token-by-token ([`crate::text::align`]); matching
//! runs are anchors and every divergent span is wrapped in paired,
//! provider-attributed markers:
//!
//! ```text
//! heart rate [[asr-primary: 80]] [[asr-secondary: 90]] regular
//! ```
//!
//! If nothing diverges the primary transcript is used verbatim and **no LLM
//! call is made**; otherwise the marked text goes to the configured LLM with
//! a merge prompt and the reply is cleaned of markdown.
//!
//! Both source transcripts are always preserved on the journal entry so a
//! recorrect can replay the merge under a different model or configuration
//! without re-transcribing audio.

use std::sync::Arc;

use crate::asr::TranscriptionResult;
use crate::error::PipelineError;
use crate::llm::{clean_model_output, CompletionOptions, LlmProvider, MergeContext, PromptBuilder};
use crate::store::{ReconciliationSources, TranscriptSource};
use crate::text::{diff_words, DiffSegment};

// ---------------------------------------------------------------------------
// MergedTranscription
// ---------------------------------------------------------------------------

/// Outcome of aligning two transcripts, before any LLM resolution.
#[derive(Debug, Clone)]
pub struct MergedTranscription {
    pub primary: TranscriptSource,
    pub secondary: TranscriptSource,
    /// Single text with divergent spans in paired provider markers.
    pub marked_text: String,
    pub has_differences: bool,
    /// Number of divergent regions found by the alignment.
    pub divergent_regions: usize,
}

impl MergedTranscription {
    /// The source pair in the form the journal stores.
    pub fn sources(&self) -> ReconciliationSources {
        ReconciliationSources {
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
        }
    }
}

/// Align two transcripts and mark every divergence.
pub fn mark_differences(
    primary: &TranscriptionResult,
    secondary: &TranscriptionResult,
) -> MergedTranscription {
    let segments = diff_words(&primary.text, &secondary.text);
    let mut marked = String::with_capacity(primary.text.len() + 64);
    let mut divergent_regions = 0usize;

    for segment in &segments {
        if !marked.is_empty() {
            marked.push(' ');
        }
        match segment {
            DiffSegment::Common(text) => marked.push_str(text),
            DiffSegment::Divergent { left, right } => {
                divergent_regions += 1;
                marked.push_str(&format!(
                    "[[{}: {}]] [[{}: {}]]",
                    primary.provider, left, secondary.provider, right
                ));
            }
        }
    }

    MergedTranscription {
        primary: TranscriptSource {
            provider: primary.provider.clone(),
            text: primary.text.clone(),
        },
        secondary: TranscriptSource {
            provider: secondary.provider.clone(),
            text: secondary.text.clone(),
        },
        marked_text: marked,
        has_differences: divergent_regions > 0,
        divergent_regions,
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Result of one reconciliation attempt.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub merged: MergedTranscription,
    /// The reconciled text: primary verbatim when nothing diverged,
    /// otherwise the LLM's resolution.
    pub text: String,
    /// Model that resolved the merge; `None` when no LLM call was made.
    pub model: Option<String>,
}

/// Resolves divergent transcriptions through the configured LLM.
pub struct Reconciler {
    llm: Arc<dyn LlmProvider>,
    prompts: PromptBuilder,
    temperature: f32,
}

impl Reconciler {
    pub fn new(llm: Arc<dyn LlmProvider>, temperature: f32) -> Self {
        Self {
            llm,
            prompts: PromptBuilder::new(),
            temperature,
        }
    }

    /// Reconcile two transcripts of the same recording.
    ///
    /// Equal transcripts short-circuit without an LLM call (the attempt is
    /// still journaled by the caller, recording that reconciliation ran and
    /// found equivalence). An unusable LLM reply is a [`PipelineError`]; the
    /// dispatcher fails soft by falling back to the primary text.
    pub async fn reconcile(
        &self,
        primary: &TranscriptionResult,
        secondary: &TranscriptionResult,
        context: &MergeContext,
    ) -> Result<ReconcileOutcome, PipelineError> {
        let merged = mark_differences(primary, secondary);

        if !merged.has_differences {
            log::debug!(
                "reconcile: transcripts from {} and {} are equivalent, skipping merge call",
                primary.provider,
                secondary.provider
            );
            return Ok(ReconcileOutcome {
                text: merged.primary.text.clone(),
                merged,
                model: None,
            });
        }

        log::debug!(
            "reconcile: {} divergent regions between {} and {}",
            merged.divergent_regions,
            primary.provider,
            secondary.provider
        );

        let (system, user) = self.prompts.merge(&merged.marked_text, context);
        let opts = CompletionOptions {
            temperature: self.temperature,
            ..CompletionOptions::default()
        };
        let reply = self.llm.complete(&system, &user, &opts).await?;
        let text = clean_model_output(&reply);
        if text.is_empty() {
            return Err(PipelineError::Parse("merge reply cleaned to empty".into()));
        }

        Ok(ReconcileOutcome {
            text,
            model: Some(self.llm.model().to_string()),
            merged,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
