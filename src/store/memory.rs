//! In-process implementation of both store traits.
//!
//! Backs the worker daemon until a database-backed store is wired in, and
//! gives the test suite a deterministic store without external services.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::PipelineError;
use crate::store::dictation::{Dictation, DictationStatus, DictationStore};
use crate::store::journal::{CorrectionLogEntry, CorrectionLogStore};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Shared in-memory dictation + journal store.
///
/// Cheap to clone; all clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    dictations: HashMap<String, Dictation>,
    journal: Vec<CorrectionLogEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a dictation record.
    pub async fn insert(&self, dictation: Dictation) {
        let mut inner = self.inner.lock().await;
        inner.dictations.insert(dictation.id.clone(), dictation);
    }

    /// Number of dictations currently in the given status.
    pub async fn count_with_status(&self, status: DictationStatus) -> usize {
        let inner = self.inner.lock().await;
        inner
            .dictations
            .values()
            .filter(|d| d.status == status)
            .count()
    }
}

#[async_trait]
impl DictationStore for MemoryStore {
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Dictation>, PipelineError> {
        let inner = self.inner.lock().await;
        let mut pending: Vec<Dictation> = inner
            .dictations
            .values()
            .filter(|d| d.status == DictationStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending.truncate(limit);
        for d in &mut pending {
            d.audio = None;
        }
        Ok(pending)
    }

    async fn get(&self, id: &str, with_audio: bool) -> Result<Dictation, PipelineError> {
        let inner = self.inner.lock().await;
        let mut dictation = inner
            .dictations
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::Validation(format!("unknown dictation {id}")))?;
        if !with_audio {
            dictation.audio = None;
        }
        Ok(dictation)
    }

    async fn set_status(
        &self,
        id: &str,
        status: DictationStatus,
        error: Option<&str>,
    ) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        let dictation = inner
            .dictations
            .get_mut(id)
            .ok_or_else(|| PipelineError::Persistence(format!("unknown dictation {id}")))?;
        dictation.status = status;
        dictation.error = error.map(str::to_string);
        dictation.updated_at = Utc::now();
        Ok(())
    }

    async fn persist_result(
        &self,
        id: &str,
        transcript: &str,
        corrected_text: &str,
        change_score: u8,
    ) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        let dictation = inner
            .dictations
            .get_mut(id)
            .ok_or_else(|| PipelineError::Persistence(format!("unknown dictation {id}")))?;
        dictation.transcript = Some(transcript.to_string());
        dictation.corrected_text = Some(corrected_text.to_string());
        dictation.change_score = Some(change_score);
        dictation.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl CorrectionLogStore for MemoryStore {
    async fn append(&self, entry: CorrectionLogEntry) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        inner.journal.push(entry);
        Ok(())
    }

    async fn query_by_dictation(
        &self,
        id: &str,
    ) -> Result<Vec<CorrectionLogEntry>, PipelineError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .journal
            .iter()
            .filter(|entry| entry.dictation_id == id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::journal::{Attribution, CorrectionStage};

    #[tokio::test]
    async fn fetch_pending_orders_by_submission_and_strips_audio() {
        let store = MemoryStore::new();
        let mut first = Dictation::new("d-1", "alice", vec![1]);
        first.created_at = Utc::now() - chrono::Duration::seconds(10);
        store.insert(first).await;
        store.insert(Dictation::new("d-2", "alice", vec![2])).await;

        let pending = store.fetch_pending(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, "d-1");
        assert!(pending.iter().all(|d| d.audio.is_none()));
    }

    #[tokio::test]
    async fn fetch_pending_respects_limit_and_status() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert(Dictation::new(format!("d-{i}"), "alice", vec![]))
                .await;
        }
        store
            .set_status("d-0", DictationStatus::Completed, None)
            .await
            .unwrap();

        let pending = store.fetch_pending(2).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|d| d.status == DictationStatus::Pending));
    }

    #[tokio::test]
    async fn get_with_audio_keeps_bytes() {
        let store = MemoryStore::new();
        store.insert(Dictation::new("d-1", "alice", vec![7, 8])).await;

        let with = store.get("d-1", true).await.unwrap();
        assert_eq!(with.audio.as_deref(), Some(&[7u8, 8][..]));
        let without = store.get("d-1", false).await.unwrap();
        assert!(without.audio.is_none());
    }

    #[tokio::test]
    async fn get_unknown_id_is_validation_error() {
        let store = MemoryStore::new();
        let err = store.get("missing", false).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn set_status_replaces_error_message() {
        let store = MemoryStore::new();
        store.insert(Dictation::new("d-1", "alice", vec![])).await;

        store
            .set_status("d-1", DictationStatus::Failed, Some("asr timed out"))
            .await
            .unwrap();
        let d = store.get("d-1", false).await.unwrap();
        assert_eq!(d.status, DictationStatus::Failed);
        assert_eq!(d.error.as_deref(), Some("asr timed out"));

        store
            .set_status("d-1", DictationStatus::Pending, None)
            .await
            .unwrap();
        let d = store.get("d-1", false).await.unwrap();
        assert!(d.error.is_none());
    }

    #[tokio::test]
    async fn persist_result_stores_outputs() {
        let store = MemoryStore::new();
        store.insert(Dictation::new("d-1", "alice", vec![])).await;

        store
            .persist_result("d-1", "raw", "corrected", 12)
            .await
            .unwrap();
        let d = store.get("d-1", false).await.unwrap();
        assert_eq!(d.transcript.as_deref(), Some("raw"));
        assert_eq!(d.corrected_text.as_deref(), Some("corrected"));
        assert_eq!(d.change_score, Some(12));
    }

    #[tokio::test]
    async fn journal_is_append_only_and_filtered_by_dictation() {
        let store = MemoryStore::new();
        for (id, after) in [("d-1", "one"), ("d-2", "two"), ("d-1", "three")] {
            store
                .append(CorrectionLogEntry::new(
                    id,
                    CorrectionStage::Llm,
                    "before",
                    after,
                    10,
                    Attribution::model("m", "p"),
                ))
                .await
                .unwrap();
        }

        let entries = store.query_by_dictation("d-1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text_after, "one");
        assert_eq!(entries[1].text_after, "three");
    }
}
