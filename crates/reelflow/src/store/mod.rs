//! Storage abstraction for videos and the transition log.
//!
//! Two implementations are provided:
//!
//! - [`PgStore`] — PostgreSQL for production (requires the `postgres` feature)
//! - [`MemoryStore`] — in-process store for tests and examples
//!
//! Writes go through a transactional [`UnitOfWork`] holding a lock on the
//! video row; reads for metrics go through [`LogStore`] and never block
//! writers.

pub mod memory;
#[cfg(feature = "postgres")]
mod postgres;

use std::future::Future;

use async_trait::async_trait;
use time::OffsetDateTime;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

use crate::error::Result;
use crate::model::{
    Actor, NewLogEntry, NewVideo, StatusLogEntry, TenantId, TenantSettings, Video, VideoId, Worker,
    WorkerId,
};
use crate::pipeline::{Department, VideoStatus};

/// Transactional storage for videos and their log.
///
/// [`Store::begin`] acquires an exclusive lock on the video row, serializing
/// concurrent transitions on the same video; distinct videos proceed fully
/// in parallel. The lock is held until the unit of work is committed or
/// dropped (drop = rollback).
pub trait Store: Send + Sync + Clone + 'static {
    /// The unit of work type returned by this store.
    type UnitOfWork<'a>: UnitOfWork + Send
    where
        Self: 'a;

    /// Begin a unit of work for one video.
    ///
    /// Locks and loads the video scoped by tenant. Fails with
    /// [`Error::NotFound`](crate::Error::NotFound) when the video does not
    /// exist within the tenant — before any write.
    fn begin<'a>(
        &'a self,
        tenant_id: TenantId,
        video_id: VideoId,
    ) -> impl Future<Output = Result<(Video, Self::UnitOfWork<'a>)>> + Send;

    /// Insert a new video in `Pending` status and return the stored row.
    fn insert_video(
        &self,
        new: &NewVideo,
        now: OffsetDateTime,
    ) -> impl Future<Output = Result<Video>> + Send;
}

/// A transactional unit of work for a single video.
///
/// All writes are staged inside one transaction; [`commit`](Self::commit)
/// makes them visible atomically. Dropping without committing rolls
/// everything back — there is no partial application.
pub trait UnitOfWork: Send {
    /// Overwrite the video's status and its last-transition timestamp.
    fn update_status(
        &mut self,
        status: VideoStatus,
        at: OffsetDateTime,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Append one immutable entry to the transition log.
    fn append_log(&mut self, entry: NewLogEntry) -> impl Future<Output = Result<()>> + Send;

    /// Delete the video and purge all of its log entries.
    fn delete_video(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Commit, persisting all staged writes and releasing the row lock.
    fn commit(self) -> impl Future<Output = Result<()>> + Send;
}

/// Read side of the transition log, consumed by the metrics engine.
///
/// Readers never block writers and must tolerate a log that grows between
/// a query's start and end; snapshot-or-later visibility is acceptable.
pub trait LogStore: Send + Sync + Clone + 'static {
    /// Fetch log entries matching `filter`, ordered by `(created_at, id)`
    /// ascending.
    fn fetch_entries(
        &self,
        filter: &LogFilter,
    ) -> impl Future<Output = Result<Vec<StatusLogEntry>>> + Send;
}

/// Lookups for entities the engine references but does not own.
#[async_trait]
pub trait DirectoryStore: Send + Sync + Clone + 'static {
    /// Fetch a worker scoped by tenant.
    async fn fetch_worker(
        &self,
        tenant_id: TenantId,
        worker_id: WorkerId,
    ) -> Result<Option<Worker>>;

    /// Fetch a tenant's notification settings, if configured.
    async fn fetch_tenant_settings(&self, tenant_id: TenantId) -> Result<Option<TenantSettings>>;
}

/// Filter for transition-log queries.
///
/// Absent fields mean "no restriction", not "zero rows". The date range is
/// inclusive on both ends. Backends translate this into an ordered list of
/// predicate/bind pairs — never string concatenation.
///
/// # Example
///
/// ```
/// use reelflow::{Department, LogFilter, TenantId};
///
/// let filter = LogFilter::for_tenant(TenantId(1))
///     .department(Department::Editing)
///     .worker(reelflow::WorkerId(7));
/// ```
#[derive(Debug, Clone)]
pub struct LogFilter {
    /// Tenant whose log is queried. Always required.
    pub tenant_id: TenantId,
    /// Restrict to one video.
    pub video_id: Option<VideoId>,
    /// Restrict to entries acted by one worker.
    pub worker_id: Option<WorkerId>,
    /// Restrict to entries whose `to_status` belongs to one department.
    pub department: Option<Department>,
    /// Restrict to entries whose `to_status` is in this set.
    pub statuses: Option<Vec<VideoStatus>>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<OffsetDateTime>,
    /// Inclusive upper bound on `created_at`.
    pub until: Option<OffsetDateTime>,
}

impl LogFilter {
    /// Create a filter matching a tenant's entire log.
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            video_id: None,
            worker_id: None,
            department: None,
            statuses: None,
            from: None,
            until: None,
        }
    }

    /// Restrict to one video.
    pub fn video(mut self, video_id: VideoId) -> Self {
        self.video_id = Some(video_id);
        self
    }

    /// Restrict to entries acted by one worker.
    pub fn worker(mut self, worker_id: WorkerId) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    /// Restrict to entries whose `to_status` belongs to `department`.
    pub fn department(mut self, department: Department) -> Self {
        self.department = Some(department);
        self
    }

    /// Restrict to entries whose `to_status` is in `statuses`.
    pub fn statuses(mut self, statuses: impl IntoIterator<Item = VideoStatus>) -> Self {
        self.statuses = Some(statuses.into_iter().collect());
        self
    }

    /// Inclusive lower bound on `created_at`.
    pub fn from(mut self, from: OffsetDateTime) -> Self {
        self.from = Some(from);
        self
    }

    /// Inclusive upper bound on `created_at`.
    pub fn until(mut self, until: OffsetDateTime) -> Self {
        self.until = Some(until);
        self
    }

    /// Whether `entry` satisfies every predicate of this filter.
    ///
    /// The in-memory backend evaluates filters with this; the Postgres
    /// backend compiles the same predicates to SQL.
    pub fn matches(&self, entry: &StatusLogEntry) -> bool {
        if entry.tenant_id != self.tenant_id {
            return false;
        }
        if let Some(video_id) = self.video_id {
            if entry.video_id != video_id {
                return false;
            }
        }
        if let Some(worker_id) = self.worker_id {
            if entry.actor != Actor::Worker(worker_id) {
                return false;
            }
        }
        if let Some(department) = self.department {
            if entry.to_status.department() != Some(department) {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&entry.to_status) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.created_at < from {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.created_at > until {
                return false;
            }
        }
        true
    }
}
