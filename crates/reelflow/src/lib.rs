//! Production pipeline coordination for video teams.
//!
//! Reelflow moves a video through four sequential departments — script,
//! narration, editing, thumbnail — each with requested / in-progress /
//! completed sub-states, ending in a terminal publish or cancel. Two
//! engines share one append-only transition ledger:
//!
//! - **Workflow engine** — validates a requested status change, persists it
//!   atomically with its log entry, cascades to the next department via a
//!   fixed table, and fires a best-effort notification after commit
//! - **Metrics engine** — a pure read-side reducer that reconstructs task
//!   durations by pairing `_InProgress`/`_Completed` log entries, with no
//!   dependency on the write path
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                      WorkflowEngine<S, N>                          │
//! │                                                                    │
//! │   1. Begin unit of work (locks + loads the video)                  │
//! │   2. plan_transition(current, changed_at, new, now)                │
//! │   3. Write status + append log entry (duration when applicable)    │
//! │   4. Cascade write + second log entry (same transaction)           │
//! │   5. Commit                                                        │
//! │   6. Notify assigned worker (outside the transaction, best-effort) │
//! └────────────────────────────────────────────────────────────────────┘
//!                               │ writes
//!                               ▼
//!                      append-only status_log
//!                               ▲
//!                               │ reads
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                       MetricsEngine<S>                             │
//! │                                                                    │
//! │   pair (video, actor) groups → realized durations → aggregates     │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use reelflow::{
//!     Actor, LogFilter, MetricsEngine, NoopNotifier, PgStore, TenantId,
//!     TransitionOptions, TransitionRequest, VideoStatus, WorkerId, WorkflowEngine,
//! };
//!
//! let store = PgStore::new(pool);
//! let engine = WorkflowEngine::new(store.clone(), NoopNotifier);
//!
//! let outcome = engine
//!     .apply_transition(TransitionRequest {
//!         tenant_id: TenantId(1),
//!         video_id,
//!         new_status: VideoStatus::ScriptCompleted,
//!         actor: Actor::Worker(WorkerId(7)),
//!         options: TransitionOptions::default(),
//!     })
//!     .await?;
//! assert_eq!(outcome.cascaded_to, Some(VideoStatus::NarrationRequested));
//!
//! let metrics = MetricsEngine::new(store);
//! let report = metrics.productivity(&LogFilter::for_tenant(TenantId(1))).await?;
//! ```
//!
//! # Feature Flags
//!
//! - `postgres` (default) — Enables [`PgStore`] for production use with PostgreSQL
//!
//! # Design Documentation
//!
//! See `DESIGN.md` for architectural decisions and recorded open questions.

mod engine;
mod error;
mod metrics;
mod model;
pub mod notify;
mod pipeline;
pub mod store;

pub use engine::{TransitionOptions, TransitionOutcome, TransitionRequest, WorkflowEngine};
pub use error::{Error, Result};
pub use metrics::{
    format_duration, MetricsConfig, MetricsEngine, RealizedTask, StatusCount, TopDepartment,
    TopWorker, WorkerProductivity,
};
pub use model::{
    Actor, NewLogEntry, NewVideo, SenderCredentials, StaffId, StatusLogEntry, TenantId,
    TenantSettings, Video, VideoId, Worker, WorkerId,
};
pub use notify::{NoopNotifier, Notifier};
pub use pipeline::{Department, Phase, VideoStatus};
#[cfg(feature = "postgres")]
pub use store::PgStore;
pub use store::{DirectoryStore, LogFilter, LogStore, MemoryStore, Store, UnitOfWork};
