//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// QueueConfig
// ---------------------------------------------------------------------------

/// Settings for the queue dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of pending dictations claimed per dispatch run.
    pub batch_size: usize,
    /// Seconds between dispatch runs in the worker daemon.
    pub poll_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeedMode
// ---------------------------------------------------------------------------

/// Inference path selector forwarded to the transcription backend.
///
/// | Variant   | Backend path                                    |
/// |-----------|-------------------------------------------------|
/// | Auto      | backend decides based on its loaded model       |
/// | Turbo     | fastest path, no word alignment                 |
/// | Precision | full batch pipeline with word timestamps        |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedMode {
    Auto,
    Turbo,
    Precision,
}

impl Default for SpeedMode {
    fn default() -> Self {
        Self::Auto
    }
}

impl SpeedMode {
    /// Wire value expected by the transcription backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedMode::Auto => "auto",
            SpeedMode::Turbo => "turbo",
            SpeedMode::Precision => "precision",
        }
    }
}

// ---------------------------------------------------------------------------
// AsrConfig
// ---------------------------------------------------------------------------

/// Settings for the transcription providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrConfig {
    /// Base URL of the primary transcription service.
    pub primary_url: String,
    /// Base URL of the secondary service. Required for double precision;
    /// also used as a fallback when the primary is unreachable.
    pub secondary_url: Option<String>,
    /// Transcribe every dictation twice (once per provider) and reconcile.
    pub double_precision: bool,
    /// Speech language as an ISO-639-1 code.
    pub language: String,
    /// Inference path forwarded to the backend.
    pub speed_mode: SpeedMode,
    /// Maximum seconds to wait for one transcription call.
    pub timeout_secs: u64,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            primary_url: "http://localhost:5000".into(),
            secondary_url: None,
            double_precision: false,
            language: "en".into(),
            speed_mode: SpeedMode::default(),
            timeout_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmProviderKind
// ---------------------------------------------------------------------------

/// Selects which LLM backend handles correction and reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LlmProviderKind {
    /// Ollama running locally via its native `/api/generate` endpoint.
    Ollama,
    /// Any OpenAI-compatible REST API (OpenAI, Groq, LM Studio, vLLM …).
    OpenAiCompatible,
}

impl Default for LlmProviderKind {
    fn default() -> Self {
        Self::OpenAiCompatible
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the LLM correction/merge backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Which backend to use.
    pub provider: LlmProviderKind,
    /// Base URL of the API endpoint.
    ///
    /// - Ollama default: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key — `None` for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"gpt-4o-mini"`, `"qwen2.5:7b"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0). Lower = more deterministic.
    pub temperature: f32,
    /// Maximum seconds to wait for one completion before timing out.
    pub timeout_secs: u64,
    /// Input budget in characters (cloud providers). Takes precedence over
    /// `max_input_tokens` when both are set.
    pub max_input_chars: Option<usize>,
    /// Input budget in tokens (local providers). Converted to a character
    /// budget with a conservative chars-per-token estimate.
    pub max_input_tokens: Option<usize>,
    /// Operator override appended to the reconciliation merge prompt.
    pub merge_prompt_override: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:7b".into(),
            temperature: 0.2,
            timeout_secs: 120,
            max_input_chars: Some(40_000),
            max_input_tokens: None,
            merge_prompt_override: None,
        }
    }
}

// ---------------------------------------------------------------------------
// GuardConfig
// ---------------------------------------------------------------------------

/// Thresholds for the terminology corrector's similarity guard.
///
/// Empirically chosen defaults; kept configurable rather than hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Minimum Jaccard word-set similarity between input and output.
    pub min_similarity: f32,
    /// Minimum acceptable output/input length ratio.
    pub min_length_ratio: f32,
    /// Maximum acceptable output/input length ratio.
    pub max_length_ratio: f32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.7,
            min_length_ratio: 0.5,
            max_length_ratio: 1.5,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use dictation_pipeline::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Queue dispatcher settings.
    pub queue: QueueConfig,
    /// Transcription provider settings.
    pub asr: AsrConfig,
    /// LLM correction/merge settings.
    pub llm: LlmConfig,
    /// Similarity guard thresholds.
    pub guard: GuardConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
