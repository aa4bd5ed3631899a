//! Worker daemon entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the ASR provider(s) and probe the primary's `/health` endpoint.
//! 4. Build the LLM provider from config.
//! 5. Run the dispatch loop on the configured poll interval until the
//!    process is stopped.
//!
//! The daemon runs against the in-process [`MemoryStore`] until a
//! database-backed store implementation is wired in; every other component
//! is production wiring.

use std::sync::Arc;

use dictation_pipeline::{
    asr::{AsrProvider, HttpAsrProvider},
    config::{AppConfig, AppPaths},
    dictionary::FileDictionary,
    llm::provider_from_config,
    pipeline::{Dispatcher, SingleFlight},
    store::MemoryStore,
};

#[tokio::main]
async fn main() {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("dictation pipeline worker starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = AppPaths::new();

    // 3. ASR providers
    let primary_asr = HttpAsrProvider::primary(&config.asr);
    match primary_asr.health().await {
        Ok(status) => log::info!(
            "transcription backend {} reports: {status}",
            config.asr.primary_url
        ),
        Err(e) => log::warn!(
            "transcription backend {} not reachable yet: {e}",
            config.asr.primary_url
        ),
    }
    let primary_asr: Arc<dyn AsrProvider> = Arc::new(primary_asr);
    let secondary_asr: Option<Arc<dyn AsrProvider>> = HttpAsrProvider::secondary(&config.asr)
        .map(|provider| Arc::new(provider) as Arc<dyn AsrProvider>);
    if config.asr.double_precision && secondary_asr.is_none() {
        log::warn!("double precision enabled but no secondary ASR URL configured");
    }

    // 4. LLM provider
    let llm = provider_from_config(&config.llm);
    log::info!(
        "LLM backend: {} model {} at {}",
        llm.id(),
        llm.model(),
        config.llm.base_url
    );

    // 5. Store + dispatcher
    let store = MemoryStore::new();
    let poll_interval = std::time::Duration::from_secs(config.queue.poll_interval_secs);
    let dispatcher = Dispatcher::new(
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(FileDictionary::new(paths.dictionaries_dir)),
        primary_asr,
        secondary_asr,
        llm,
        config,
        SingleFlight::new(),
    );

    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        ticker.tick().await;
        let summary = dispatcher.dispatch().await;
        if summary.already_running {
            continue;
        }
        if summary.processed > 0 || summary.errors > 0 {
            log::info!(
                "dispatch summary: processed {}, errors {}, remaining {}",
                summary.processed,
                summary.errors,
                summary.remaining
            );
        }
    }
}
