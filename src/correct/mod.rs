//! Final linguistic correction.
//!
//! [`CorrectionEngine`] splits long input into provider-sized chunks at
//! sentence boundaries, corrects each chunk with an identical system prompt
//! (so providers with prompt caching reuse it), and rejoins the results with
//! paragraph breaks.
//!
//! [`TerminologyCorrector`] is the fast, terminology-only variant. It guards
//! against runaway rewrites from smaller models: when the output's Jaccard
//! word-set similarity to the input falls below a threshold, or the length
//! ratio leaves the configured window, the LLM output is discarded and the
//! original text kept.

use std::sync::Arc;
use std::time::Instant;

use crate::config::GuardConfig;
use crate::error::PipelineError;
use crate::llm::{clean_model_output, CompletionOptions, LlmProvider, PromptBuilder};
use crate::text::{chunk_sentences, jaccard_similarity, join_chunks, length_ratio};

/// Headroom subtracted from the provider budget for the sentinel delimiters
/// wrapped around each chunk.
const SENTINEL_HEADROOM: usize = 64;

// ---------------------------------------------------------------------------
// CorrectionEngine
// ---------------------------------------------------------------------------

/// Chunked full-correction engine over one LLM backend.
pub struct CorrectionEngine {
    llm: Arc<dyn LlmProvider>,
    prompts: PromptBuilder,
    temperature: f32,
}

impl CorrectionEngine {
    pub fn new(llm: Arc<dyn LlmProvider>, temperature: f32) -> Self {
        Self {
            llm,
            prompts: PromptBuilder::new(),
            temperature,
        }
    }

    /// Correct `text`, chunking to the provider's input budget.
    ///
    /// A chunk whose reply is unusable ([`PipelineError::Parse`]) falls back
    /// to that chunk's original text — a partial correction beats losing the
    /// item. Transport and provider rejections abort the whole call with the
    /// chunk index attached for diagnosis.
    pub async fn correct(&self, text: &str) -> Result<String, PipelineError> {
        let budget = self
            .llm
            .input_limit()
            .as_chars()
            .saturating_sub(SENTINEL_HEADROOM)
            .max(1);
        let chunks = chunk_sentences(text, budget);
        if chunks.is_empty() {
            return Ok(String::new());
        }

        let opts = CompletionOptions {
            temperature: self.temperature,
            ..CompletionOptions::default()
        };

        let mut corrected: Vec<String> = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let started = Instant::now();
            let (system, user) = self.prompts.correction(chunk);

            match self.llm.complete(&system, &user, &opts).await {
                Ok(reply) => {
                    let clean = clean_model_output(&reply);
                    if clean.is_empty() {
                        log::warn!(
                            "correction: chunk {index} reply from {} cleaned to empty, keeping original chunk",
                            self.llm.id()
                        );
                        corrected.push(chunk.clone());
                    } else {
                        corrected.push(clean);
                    }
                }
                Err(PipelineError::Parse(reason)) => {
                    log::warn!(
                        "correction: chunk {index} via {} unparsable ({reason}), keeping original chunk",
                        self.llm.id()
                    );
                    corrected.push(chunk.clone());
                }
                Err(e) => {
                    log::error!(
                        "correction: chunk {index}/{} via {} failed after {:.1}s: {e}",
                        chunks.len(),
                        self.llm.id(),
                        started.elapsed().as_secs_f32()
                    );
                    return Err(with_chunk_context(e, index));
                }
            }
        }

        Ok(join_chunks(&corrected))
    }

    /// Model identifier for journal attribution.
    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Provider identifier for journal attribution.
    pub fn provider_id(&self) -> &str {
        self.llm.id()
    }
}

/// Attach the failing chunk index to a provider error.
fn with_chunk_context(error: PipelineError, index: usize) -> PipelineError {
    match error {
        PipelineError::ProviderUnavailable { provider, reason } => {
            PipelineError::ProviderUnavailable {
                provider,
                reason: format!("chunk {index}: {reason}"),
            }
        }
        PipelineError::ProviderRejected {
            provider,
            status,
            message,
        } => PipelineError::ProviderRejected {
            provider,
            status,
            message: format!("chunk {index}: {message}"),
        },
        other => other,
    }
}

// ---------------------------------------------------------------------------
// TerminologyCorrector
// ---------------------------------------------------------------------------

/// Fast terminology-only correction with the similarity guard.
pub struct TerminologyCorrector {
    llm: Arc<dyn LlmProvider>,
    prompts: PromptBuilder,
    guard: GuardConfig,
    temperature: f32,
}

impl TerminologyCorrector {
    pub fn new(llm: Arc<dyn LlmProvider>, guard: GuardConfig, temperature: f32) -> Self {
        Self {
            llm,
            prompts: PromptBuilder::new(),
            guard,
            temperature,
        }
    }

    /// Correct terminology in `text`; never makes the text worse.
    ///
    /// The LLM output is kept only when it stays close to the input — word
    /// similarity at or above `guard.min_similarity` and length ratio inside
    /// `[min_length_ratio, max_length_ratio]`. Anything else (including an
    /// unusable reply) returns the original text unchanged.
    pub async fn correct(&self, text: &str) -> Result<String, PipelineError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let (system, user) = self.prompts.terminology(text);
        let opts = CompletionOptions {
            temperature: self.temperature,
            ..CompletionOptions::default()
        };

        let reply = match self.llm.complete(&system, &user, &opts).await {
            Ok(reply) => reply,
            Err(PipelineError::Parse(reason)) => {
                log::warn!("terminology: unusable reply ({reason}), keeping original");
                return Ok(text.to_string());
            }
            Err(e) => return Err(e),
        };

        let clean = clean_model_output(&reply);
        if clean.is_empty() {
            log::warn!("terminology: reply cleaned to empty, keeping original");
            return Ok(text.to_string());
        }

        let similarity = jaccard_similarity(text, &clean);
        let ratio = length_ratio(text, &clean);
        let within_window =
            ratio >= self.guard.min_length_ratio && ratio <= self.guard.max_length_ratio;

        if similarity < self.guard.min_similarity || !within_window {
            log::warn!(
                "terminology: guard rejected output (similarity {similarity:.2}, length ratio {ratio:.2}), keeping original"
            );
            return Ok(text.to_string());
        }

        Ok(clean)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{MockLlm, InputLimit};
    use crate::llm::prompt::wrap_payload;
    use async_trait::async_trait;

    /// Echo mock with a configurable input limit, for chunking tests.
    struct LimitedEcho {
        limit: usize,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl LimitedEcho {
        fn new(limit: usize) -> Self {
            Self {
                limit,
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for LimitedEcho {
        fn id(&self) -> &str {
            "limited-echo"
        }
        fn model(&self) -> &str {
            "echo-model"
        }
        fn input_limit(&self) -> InputLimit {
            InputLimit::Chars(self.limit)
        }
        async fn complete(
            &self,
            _system: &str,
            user: &str,
            _opts: &CompletionOptions,
        ) -> Result<String, PipelineError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(user.to_string())
        }
    }

    // --- CorrectionEngine ---

    #[tokio::test]
    async fn identity_correction_reproduces_text_modulo_whitespace() {
        let engine = CorrectionEngine::new(Arc::new(MockLlm::echo()), 0.2);
        let text = "First sentence here. Second sentence there.\n\nA new paragraph.";
        let corrected = engine.correct(text).await.unwrap();
        assert_eq!(corrected, crate::text::collapse_whitespace(text));
    }

    #[tokio::test]
    async fn long_input_is_chunked_and_rejoined() {
        let sentence = "The patient tolerated the procedure well and was monitored. ";
        let text: String = sentence.repeat(750); // 45 000 chars
        let llm = Arc::new(LimitedEcho::new(40_000));
        let engine = CorrectionEngine::new(llm.clone(), 0.2);

        let corrected = engine.correct(&text).await.unwrap();

        let calls = llm.calls.load(std::sync::atomic::Ordering::SeqCst);
        assert!(calls >= 2, "expected >=2 chunk calls, got {calls}");
        // Rejoined with at most one blank line between chunks.
        assert!(!corrected.contains("\n\n\n"));
        assert_eq!(
            crate::text::words(&corrected).len(),
            crate::text::words(&text).len()
        );
    }

    #[tokio::test]
    async fn empty_input_needs_no_call() {
        let llm = Arc::new(MockLlm::echo());
        let engine = CorrectionEngine::new(llm.clone(), 0.2);
        assert_eq!(engine.correct("").await.unwrap(), "");
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_carries_chunk_index() {
        let llm = Arc::new(MockLlm::fail(PipelineError::unavailable("mock", "down")));
        let engine = CorrectionEngine::new(llm, 0.2);
        let err = engine.correct("Some sentence.").await.unwrap_err();
        match err {
            PipelineError::ProviderUnavailable { reason, .. } => {
                assert!(reason.contains("chunk 0"), "reason: {reason}");
            }
            other => panic!("expected ProviderUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn parse_failure_keeps_original_chunk() {
        let llm = Arc::new(MockLlm::fail(PipelineError::Parse("garbage".into())));
        let engine = CorrectionEngine::new(llm, 0.2);
        let corrected = engine.correct("Keep this sentence.").await.unwrap();
        assert_eq!(corrected, "Keep this sentence.");
    }

    #[tokio::test]
    async fn echoed_sentinels_are_stripped_from_chunks() {
        // The echo mock returns the full wrapped payload; the engine must
        // strip the sentinels before rejoining.
        let engine = CorrectionEngine::new(Arc::new(MockLlm::echo()), 0.2);
        let corrected = engine.correct("Hello there.").await.unwrap();
        assert_eq!(corrected, "Hello there.");
        assert!(!corrected.contains("<<<"));
    }

    // --- TerminologyCorrector ---

    fn guard() -> GuardConfig {
        GuardConfig::default()
    }

    #[tokio::test]
    async fn faithful_output_is_accepted() {
        // One word changed out of eight: similarity stays above 0.7.
        let input = "the patient shows signs of acute hart failure";
        let output = "the patient shows signs of acute heart failure";
        let corrector =
            TerminologyCorrector::new(Arc::new(MockLlm::fixed(output)), guard(), 0.2);
        assert_eq!(corrector.correct(input).await.unwrap(), output);
    }

    #[tokio::test]
    async fn dissimilar_output_is_rejected() {
        // Jaccard similarity 0.4 (4 shared words, union of 10) — the guard
        // must keep the original.
        let input = "alpha beta gamma delta epsilon zeta eta";
        let output = "alpha beta gamma delta one two three";
        assert!((jaccard_similarity(input, output) - 0.4).abs() < 1e-6);

        let corrector =
            TerminologyCorrector::new(Arc::new(MockLlm::fixed(output)), guard(), 0.2);
        assert_eq!(corrector.correct(input).await.unwrap(), input);
    }

    #[tokio::test]
    async fn runaway_long_output_is_rejected() {
        let input = "short original text";
        let output = "short original text ".repeat(4);
        let corrector =
            TerminologyCorrector::new(Arc::new(MockLlm::fixed(output)), guard(), 0.2);
        assert_eq!(corrector.correct(input).await.unwrap(), input);
    }

    #[tokio::test]
    async fn truncated_output_is_rejected() {
        let input = "one two three four five six seven eight nine ten";
        let output = "one two";
        let corrector =
            TerminologyCorrector::new(Arc::new(MockLlm::fixed(output)), guard(), 0.2);
        assert_eq!(corrector.correct(input).await.unwrap(), input);
    }

    #[tokio::test]
    async fn unusable_reply_keeps_original() {
        let corrector = TerminologyCorrector::new(
            Arc::new(MockLlm::fail(PipelineError::Parse("bad".into()))),
            guard(),
            0.2,
        );
        assert_eq!(
            corrector.correct("original text").await.unwrap(),
            "original text"
        );
    }

    #[tokio::test]
    async fn sentinel_echo_does_not_trip_the_guard() {
        let input = "the patient shows stable vital signs today";
        let corrector = TerminologyCorrector::new(
            Arc::new(MockLlm::fixed(wrap_payload(input))),
            guard(),
            0.2,
        );
        assert_eq!(corrector.correct(input).await.unwrap(), input);
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let corrector = TerminologyCorrector::new(
            Arc::new(MockLlm::fail(PipelineError::unavailable("mock", "down"))),
            guard(),
            0.2,
        );
        assert!(corrector.correct("text").await.is_err());
    }
}
