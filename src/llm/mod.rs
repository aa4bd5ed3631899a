//! LLM provider contract, prompts and output hygiene.
//!
//! This module provides:
//! * [`LlmProvider`] — capability trait implemented by all backends.
//! * [`ApiLlmProvider`] — OpenAI-compatible `/v1/chat/completions` backend.
//! * [`OllamaProvider`] — Ollama native `/api/generate` backend.
//! * [`provider_from_config`] — factory selecting an implementation from
//!   configuration.
//! * [`prompt`] — correction/merge prompt builders and the sentinel wrapping
//!   scheme used to mark dictated text as data, not instructions.
//! * [`sanitize`] — cleanup of echoed sentinels, preambles and markdown.

pub mod prompt;
pub mod provider;
pub mod sanitize;

pub use prompt::{MergeContext, PromptBuilder};
pub use provider::{
    provider_from_config, ApiLlmProvider, CompletionOptions, InputLimit, LlmProvider,
    OllamaProvider,
};
pub use sanitize::clean_model_output;
