//! Asynchronous correction pipeline for dictated documents.
//!
//! Raw speech-to-text output flows through a queue/worker state machine into
//! reviewed, corrected text:
//!
//! ```text
//! pending ─▶ Dispatcher ─▶ Preprocessor ─▶ (Double-Precision Reconciler)
//!                     ─▶ Correction Engine ─▶ store + correction journal
//! ```
//!
//! # Modules
//!
//! * [`pipeline`] — queue dispatcher, single-flight lock, recovery controller.
//! * [`preprocess`] — spoken formatting directives and dictionary substitution.
//! * [`reconcile`] — double-precision reconciliation of two transcriptions.
//! * [`correct`] — chunked LLM correction and the guarded terminology variant.
//! * [`text`] — alignment, sentence chunking, change scoring.
//! * [`asr`] / [`llm`] — provider contracts and HTTP backends.
//! * [`dictionary`] — per-user correction dictionaries.
//! * [`store`] — dictation and correction-journal storage contracts.
//! * [`config`] — settings and platform paths.
//! * [`error`] — the crate-wide failure taxonomy.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dictation_pipeline::asr::HttpAsrProvider;
//! use dictation_pipeline::config::AppConfig;
//! use dictation_pipeline::dictionary::FileDictionary;
//! use dictation_pipeline::llm::provider_from_config;
//! use dictation_pipeline::pipeline::{Dispatcher, SingleFlight};
//! use dictation_pipeline::store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::load().unwrap();
//!     let store = MemoryStore::new();
//!
//!     let dispatcher = Dispatcher::new(
//!         Arc::new(store.clone()),
//!         Arc::new(store),
//!         Arc::new(FileDictionary::new("dictionaries".into())),
//!         Arc::new(HttpAsrProvider::primary(&config.asr)),
//!         HttpAsrProvider::secondary(&config.asr).map(|p| Arc::new(p) as _),
//!         provider_from_config(&config.llm),
//!         config,
//!         SingleFlight::new(),
//!     );
//!
//!     let summary = dispatcher.dispatch().await;
//!     println!("processed {} item(s)", summary.processed);
//! }
//! ```

pub mod asr;
pub mod config;
pub mod correct;
pub mod dictionary;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod preprocess;
pub mod reconcile;
pub mod store;
pub mod text;

pub use error::PipelineError;
