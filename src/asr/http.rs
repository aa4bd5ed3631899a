//! HTTP transcription provider.
//!
//! Speaks the transcription service's REST contract:
//!
//! * `POST {base}/transcribe` — multipart form with a `file` part plus
//!   `language`, `speed_mode` and `initial_prompt` fields; replies with JSON
//!   `{ "text": …, "language": …, "mode": …, "duration": … }`.
//! * `GET {base}/health` — readiness probe used at daemon startup.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use crate::asr::{AsrProvider, TranscriptionHints, TranscriptionResult};
use crate::config::{AsrConfig, SpeedMode};
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// HttpAsrProvider
// ---------------------------------------------------------------------------

/// Client for one transcription service instance.
pub struct HttpAsrProvider {
    id: String,
    client: reqwest::Client,
    base_url: String,
    speed_mode: SpeedMode,
}

/// Wire shape of a successful `/transcribe` reply.
#[derive(Debug, Deserialize)]
struct TranscribeReply {
    text: String,
}

#[derive(Debug, Deserialize)]
struct HealthReply {
    status: String,
}

impl HttpAsrProvider {
    /// Build a provider with `id` against `base_url`.
    ///
    /// The HTTP client carries the per-request timeout from `timeout`; a
    /// timeout maps to [`PipelineError::ProviderUnavailable`].
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            id: id.into(),
            client,
            base_url: base_url.into(),
            speed_mode: SpeedMode::Auto,
        }
    }

    /// Build the primary provider from application config.
    pub fn primary(config: &AsrConfig) -> Self {
        let mut provider = Self::new(
            "asr-primary",
            config.primary_url.clone(),
            Duration::from_secs(config.timeout_secs),
        );
        provider.speed_mode = config.speed_mode;
        provider
    }

    /// Build the secondary provider from application config, when one is set.
    pub fn secondary(config: &AsrConfig) -> Option<Self> {
        config.secondary_url.as_ref().map(|url| {
            let mut provider = Self::new(
                "asr-secondary",
                url.clone(),
                Duration::from_secs(config.timeout_secs),
            );
            provider.speed_mode = config.speed_mode;
            provider
        })
    }

    /// Probe `GET /health`; returns the reported status string.
    pub async fn health(&self) -> Result<String, PipelineError> {
        let url = format!("{}/health", self.base_url);
        let reply: HealthReply = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?
            .json()
            .await
            .map_err(|e| PipelineError::Parse(e.to_string()))?;
        Ok(reply.status)
    }

    fn transport_error(&self, e: reqwest::Error) -> PipelineError {
        if e.is_timeout() {
            PipelineError::unavailable(&self.id, "request timed out")
        } else {
            PipelineError::unavailable(&self.id, e.to_string())
        }
    }
}

#[async_trait]
impl AsrProvider for HttpAsrProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        hints: &TranscriptionHints,
    ) -> Result<TranscriptionResult, PipelineError> {
        if audio.is_empty() {
            return Err(PipelineError::Validation("empty audio".into()));
        }

        let url = format!("{}/transcribe", self.base_url);
        let started = Instant::now();

        let file_part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("dictation")
            .mime_str(mime_type)
            .map_err(|e| PipelineError::Validation(format!("bad mime type: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("speed_mode", self.speed_mode.as_str());
        if let Some(language) = &hints.language {
            form = form.text("language", language.clone());
        }
        if let Some(prompt) = hints.biasing_prompt() {
            form = form.text("initial_prompt", prompt);
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(PipelineError::rejected(&self.id, status.as_u16(), message));
        }
        if !status.is_success() {
            return Err(PipelineError::unavailable(
                &self.id,
                format!("status {status}"),
            ));
        }

        let reply: TranscribeReply = response
            .json()
            .await
            .map_err(|e| PipelineError::Parse(e.to_string()))?;

        log::debug!(
            "asr {}: transcribed {} bytes in {:.1}s",
            self.id,
            audio.len(),
            started.elapsed().as_secs_f32()
        );

        Ok(TranscriptionResult {
            text: reply.text.trim().to_string(),
            provider: self.id.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_secondary() -> AsrConfig {
        AsrConfig {
            secondary_url: Some("http://backup:5000".into()),
            ..AsrConfig::default()
        }
    }

    #[test]
    fn primary_uses_configured_url_and_id() {
        let provider = HttpAsrProvider::primary(&AsrConfig::default());
        assert_eq!(provider.id(), "asr-primary");
        assert_eq!(provider.base_url, "http://localhost:5000");
    }

    #[test]
    fn secondary_is_none_without_url() {
        assert!(HttpAsrProvider::secondary(&AsrConfig::default()).is_none());
    }

    #[test]
    fn secondary_is_built_when_configured() {
        let provider = HttpAsrProvider::secondary(&config_with_secondary()).unwrap();
        assert_eq!(provider.id(), "asr-secondary");
        assert_eq!(provider.base_url, "http://backup:5000");
    }

    #[tokio::test]
    async fn empty_audio_is_rejected_before_any_request() {
        let provider = HttpAsrProvider::new("test", "http://localhost:1", Duration::from_secs(1));
        let err = provider
            .transcribe(&[], "audio/wav", &TranscriptionHints::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_provider_unavailable() {
        // Port 9 (discard) is not listening; the connect error must map to
        // ProviderUnavailable, not a panic or a Parse error.
        let provider =
            HttpAsrProvider::new("test", "http://127.0.0.1:9", Duration::from_secs(1));
        let err = provider
            .transcribe(&[1, 2, 3], "audio/wav", &TranscriptionHints::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ProviderUnavailable { .. }));
    }
}
