//! Queue dispatch, recovery, and the shared stage runner.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher::dispatch()                      (single-flight guarded)
//!   └─▶ fetch_pending(batch_size)
//!        └─▶ for each item, sequentially:
//!              set_status(processing)
//!              ASR transcribe (once, or twice for double precision)
//!              StageRunner::run:
//!                Preprocessor ──▶ Reconciler ──▶ CorrectionEngine
//!                (each stage appends a correction-journal entry)
//!              persist_result + set_status(completed | failed)
//!
//! RecoveryController
//!   ├─ retry:         failed → pending (explicit, operator-driven)
//!   ├─ release_stuck: processing → pending (explicit, operator-driven)
//!   └─ recorrect:     re-run StageRunner from journaled transcripts
//! ```
//!
//! Failure isolation: one item failing never aborts its batch; the error is
//! captured on the record and the dispatcher moves on.

pub mod dispatcher;
pub mod recovery;
pub mod single_flight;
pub mod stages;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use dispatcher::{DispatchSummary, Dispatcher};
pub use recovery::RecoveryController;
pub use single_flight::{FlightGuard, SingleFlight};
pub use stages::{StageOutcome, StageRunner};
