//! Core `LlmProvider` trait and its backend implementations.
//!
//! `ApiLlmProvider` calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint — OpenAI, Groq, LM Studio, vLLM, Ollama in OpenAI mode.
//! `OllamaProvider` uses Ollama's native `/api/generate` endpoint.
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.
//!
//! Backends are selected by [`provider_from_config`], one implementation per
//! provider kind, replacing conditional branching on string tags.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{LlmConfig, LlmProviderKind};
use crate::error::PipelineError;

/// Conservative character budget per model token, used to translate a token
/// limit into a chunking budget.
const CHARS_PER_TOKEN: usize = 4;

// ---------------------------------------------------------------------------
// CompletionOptions / InputLimit
// ---------------------------------------------------------------------------

/// Per-call completion parameters.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Cap on generated tokens; `None` lets the provider decide.
    pub max_output_tokens: Option<u32>,
    /// Request strict-JSON output on providers that support it.
    pub json_mode: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: None,
            json_mode: false,
        }
    }
}

/// Input budget a provider imposes on one completion.
///
/// Cloud endpoints are character-limited at the API gateway; local runtimes
/// are bounded by their context window in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLimit {
    Chars(usize),
    Tokens(usize),
}

impl InputLimit {
    /// The limit expressed as a character budget for the chunker.
    pub fn as_chars(&self) -> usize {
        match *self {
            InputLimit::Chars(n) => n,
            InputLimit::Tokens(n) => n * CHARS_PER_TOKEN,
        }
    }

    /// Derive the limit from configuration; a character budget wins when
    /// both are set.
    pub fn from_config(config: &LlmConfig) -> Self {
        match (config.max_input_chars, config.max_input_tokens) {
            (Some(chars), _) => InputLimit::Chars(chars),
            (None, Some(tokens)) => InputLimit::Tokens(tokens),
            (None, None) => InputLimit::Chars(40_000),
        }
    }
}

// ---------------------------------------------------------------------------
// LlmProvider trait
// ---------------------------------------------------------------------------

/// Async capability trait for LLM completion backends.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn LlmProvider>` across the correction engine and the reconciler.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable identifier recorded in journal attributions.
    fn id(&self) -> &str;

    /// Model identifier sent to the backend.
    fn model(&self) -> &str;

    /// Input budget the caller must respect when chunking.
    fn input_limit(&self) -> InputLimit;

    /// Run one completion and return the raw text reply.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        opts: &CompletionOptions,
    ) -> Result<String, PipelineError>;
}

// ---------------------------------------------------------------------------
// ApiLlmProvider
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// # No hardcoded URLs
/// All connection details (`base_url`, `api_key`, `model`) come exclusively
/// from the [`LlmConfig`] passed to [`ApiLlmProvider::from_config`].
pub struct ApiLlmProvider {
    client: reqwest::Client,
    config: LlmConfig,
    limit: InputLimit,
}

impl ApiLlmProvider {
    /// Build a provider from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            limit: InputLimit::from_config(config),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl LlmProvider for ApiLlmProvider {
    fn id(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn input_limit(&self) -> InputLimit {
        self.limit
    }

    /// Send one chat completion to the configured endpoint.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `config.api_key` is a non-empty string — safe for local providers
    /// that require no authentication.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        opts: &CompletionOptions,
    ) -> Result<String, PipelineError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let mut body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user",   "content": user_prompt   }
            ],
            "stream":      false,
            "temperature": opts.temperature,
        });
        if let Some(max_tokens) = opts.max_output_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if opts.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let mut req = self.client.post(&url).json(&body);
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| transport_error(self.id(), e))?;

        let status = response.status();
        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(PipelineError::rejected(self.id(), status.as_u16(), message));
        }
        if !status.is_success() {
            return Err(PipelineError::unavailable(
                self.id(),
                format!("status {status}"),
            ));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Parse(e.to_string()))?;

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| PipelineError::Parse("missing message content".into()))?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(PipelineError::Parse("empty completion".into()));
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// OllamaProvider
// ---------------------------------------------------------------------------

/// Calls Ollama's native `/api/generate` endpoint.
pub struct OllamaProvider {
    client: reqwest::Client,
    config: LlmConfig,
    limit: InputLimit,
}

impl OllamaProvider {
    /// Build a provider from application config.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            limit: InputLimit::from_config(config),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn id(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn input_limit(&self) -> InputLimit {
        self.limit
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        opts: &CompletionOptions,
    ) -> Result<String, PipelineError> {
        let url = format!("{}/api/generate", self.config.base_url);

        let mut body = serde_json::json!({
            "model":  self.config.model,
            "system": system_prompt,
            "prompt": user_prompt,
            "stream": false,
            "options": { "temperature": opts.temperature },
        });
        if let Some(max_tokens) = opts.max_output_tokens {
            body["options"]["num_predict"] = serde_json::json!(max_tokens);
        }
        if opts.json_mode {
            body["format"] = serde_json::json!("json");
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.id(), e))?;

        let status = response.status();
        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(PipelineError::rejected(self.id(), status.as_u16(), message));
        }
        if !status.is_success() {
            return Err(PipelineError::unavailable(
                self.id(),
                format!("status {status}"),
            ));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Parse(e.to_string()))?;

        let text = json["response"]
            .as_str()
            .ok_or_else(|| PipelineError::Parse("missing response field".into()))?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(PipelineError::Parse("empty completion".into()));
        }
        Ok(text)
    }
}

fn transport_error(provider: &str, e: reqwest::Error) -> PipelineError {
    if e.is_timeout() {
        PipelineError::unavailable(provider, "request timed out")
    } else {
        PipelineError::unavailable(provider, e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build the configured LLM backend.
pub fn provider_from_config(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    match config.provider {
        LlmProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config)),
        LlmProviderKind::OpenAiCompatible => Arc::new(ApiLlmProvider::from_config(config)),
    }
}

// ---------------------------------------------------------------------------
// MockLlm  (test-only)
// ---------------------------------------------------------------------------

/// Programmable test double.
#[cfg(test)]
pub struct MockLlm {
    behaviour: MockBehaviour,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
pub enum MockBehaviour {
    /// Always reply with this text.
    Fixed(String),
    /// Echo the user prompt back unchanged.
    Echo,
    /// Always fail with this error.
    Fail(PipelineError),
    /// Fail only when the user prompt contains the needle.
    FailWhenContains(String, PipelineError),
}

#[cfg(test)]
impl MockLlm {
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(MockBehaviour::Fixed(text.into()))
    }

    pub fn echo() -> Self {
        Self::new(MockBehaviour::Echo)
    }

    pub fn fail(error: PipelineError) -> Self {
        Self::new(MockBehaviour::Fail(error))
    }

    pub fn fail_when_contains(needle: impl Into<String>, error: PipelineError) -> Self {
        Self::new(MockBehaviour::FailWhenContains(needle.into(), error))
    }

    fn new(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of `complete` calls observed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl LlmProvider for MockLlm {
    fn id(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn input_limit(&self) -> InputLimit {
        InputLimit::Chars(40_000)
    }

    async fn complete(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _opts: &CompletionOptions,
    ) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.behaviour {
            MockBehaviour::Fixed(text) => Ok(text.clone()),
            MockBehaviour::Echo => Ok(user_prompt.to_string()),
            MockBehaviour::Fail(error) => Err(error.clone()),
            MockBehaviour::FailWhenContains(needle, error) => {
                if user_prompt.contains(needle) {
                    Err(error.clone())
                } else {
                    Ok(user_prompt.to_string())
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
