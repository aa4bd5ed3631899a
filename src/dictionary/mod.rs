//! User correction dictionaries.
//!
//! A dictionary is a per-user list of `wrong → correct` substitutions
//! maintained by operators. Entries flagged `use_in_prompt` are additionally
//! surfaced to the ASR provider (as biasing vocabulary) and to the LLM merge
//! prompt; `match_stem` entries match any word that begins with the wrong
//! form instead of requiring a whole-word match.
//!
//! [`FileDictionary`] reads `<user>.json` files from a directory:
//!
//! ```json
//! [
//!   { "wrong": "hart", "correct": "heart", "use_in_prompt": true, "match_stem": false }
//! ]
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// DictionaryEntry
// ---------------------------------------------------------------------------

/// A single `wrong → correct` substitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// The mis-transcribed form as produced by ASR.
    pub wrong: String,
    /// The desired corrected form.
    pub correct: String,
    /// Surface this entry to ASR biasing vocabulary and LLM prompts.
    #[serde(default)]
    pub use_in_prompt: bool,
    /// Match any word beginning with `wrong` instead of whole words only.
    #[serde(default)]
    pub match_stem: bool,
}

impl DictionaryEntry {
    /// Convenience constructor for a plain whole-word entry.
    pub fn new(wrong: impl Into<String>, correct: impl Into<String>) -> Self {
        Self {
            wrong: wrong.into(),
            correct: correct.into(),
            use_in_prompt: false,
            match_stem: false,
        }
    }
}

/// Entries flagged for prompt inclusion, as `(wrong, correct)` pairs.
pub fn prompt_terms(entries: &[DictionaryEntry]) -> Vec<(&str, &str)> {
    entries
        .iter()
        .filter(|e| e.use_in_prompt)
        .map(|e| (e.wrong.as_str(), e.correct.as_str()))
        .collect()
}

// ---------------------------------------------------------------------------
// DictionaryProvider trait
// ---------------------------------------------------------------------------

/// Source of per-user dictionaries.
///
/// Implementations must be `Send + Sync` so they can be shared as
/// `Arc<dyn DictionaryProvider>` across the dispatcher and the recovery
/// controller.
#[async_trait]
pub trait DictionaryProvider: Send + Sync {
    /// Load all entries for `user`. A user without a dictionary yields an
    /// empty list, not an error.
    async fn load(&self, user: &str) -> Result<Vec<DictionaryEntry>, PipelineError>;
}

// ---------------------------------------------------------------------------
// FileDictionary
// ---------------------------------------------------------------------------

/// Loads dictionaries from `<dir>/<user>.json`.
pub struct FileDictionary {
    dir: PathBuf,
}

impl FileDictionary {
    /// Read dictionaries from `dir`. The directory does not have to exist;
    /// every user then simply has an empty dictionary.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl DictionaryProvider for FileDictionary {
    async fn load(&self, user: &str) -> Result<Vec<DictionaryEntry>, PipelineError> {
        let path = self.dir.join(format!("{user}.json"));
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PipelineError::Persistence(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| PipelineError::Persistence(format!("{}: {e}", path.display())))
    }
}

// ---------------------------------------------------------------------------
// MockDictionary  (test-only)
// ---------------------------------------------------------------------------

/// Test double returning a fixed entry list for every user.
#[cfg(test)]
pub struct MockDictionary(pub Vec<DictionaryEntry>);

#[cfg(test)]
#[async_trait]
impl DictionaryProvider for MockDictionary {
    async fn load(&self, _user: &str) -> Result<Vec<DictionaryEntry>, PipelineError> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
