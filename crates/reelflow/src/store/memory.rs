//! In-process store for tests and examples.
//!
//! Mirrors the Postgres semantics that matter to the engine: `begin` loads
//! a tenant-scoped video or fails with `NotFound`, writes are staged and
//! only become visible on `commit`, dropping the unit of work discards
//! them, and deleting a video purges its log entries. Row locking is not
//! simulated — concurrent units of work on the same video are a
//! production-store concern.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::model::{
    NewLogEntry, NewVideo, StatusLogEntry, TenantId, TenantSettings, Video, VideoId, Worker,
    WorkerId,
};
use crate::pipeline::VideoStatus;
use crate::store::{DirectoryStore, LogFilter, LogStore, Store, UnitOfWork};

#[derive(Debug, Default)]
struct Inner {
    videos: HashMap<VideoId, Video>,
    log: Vec<StatusLogEntry>,
    workers: HashMap<WorkerId, Worker>,
    settings: HashMap<TenantId, TenantSettings>,
    next_video_id: i64,
    next_log_id: i64,
}

/// Shared-state in-memory store.
///
/// Cloning is cheap; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }

    /// Seed a worker. Test setup only; workers are owned elsewhere.
    pub fn insert_worker(&self, worker: Worker) {
        self.lock().workers.insert(worker.id, worker);
    }

    /// Seed a tenant's notification settings.
    pub fn set_tenant_settings(&self, settings: TenantSettings) {
        self.lock().settings.insert(settings.tenant_id, settings);
    }

    /// Seed transition-log entries directly, bypassing the engine.
    pub fn seed_log(&self, entries: impl IntoIterator<Item = StatusLogEntry>) {
        let mut inner = self.lock();
        for entry in entries {
            inner.next_log_id = inner.next_log_id.max(entry.id);
            inner.log.push(entry);
        }
    }

    /// Rewind a video's last-transition timestamp, so tests can assert
    /// exact computed durations.
    pub fn backdate_status_change(&self, video_id: VideoId, at: OffsetDateTime) {
        if let Some(video) = self.lock().videos.get_mut(&video_id) {
            video.status_changed_at = at;
        }
    }

    /// Snapshot a video by id.
    pub fn video(&self, video_id: VideoId) -> Option<Video> {
        self.lock().videos.get(&video_id).cloned()
    }

    /// Snapshot the whole transition log in append order.
    pub fn log_entries(&self) -> Vec<StatusLogEntry> {
        self.lock().log.clone()
    }
}

#[derive(Debug)]
enum StagedWrite {
    Status(VideoStatus, OffsetDateTime),
    Log(NewLogEntry),
    Delete,
}

/// Unit of work over [`MemoryStore`]; writes apply on commit, in order.
#[derive(Debug)]
pub struct MemoryUnitOfWork<'a> {
    store: &'a MemoryStore,
    video_id: VideoId,
    staged: Vec<StagedWrite>,
}

impl Store for MemoryStore {
    type UnitOfWork<'a> = MemoryUnitOfWork<'a>;

    async fn begin<'a>(
        &'a self,
        tenant_id: TenantId,
        video_id: VideoId,
    ) -> Result<(Video, Self::UnitOfWork<'a>)> {
        let video = self
            .lock()
            .videos
            .get(&video_id)
            .filter(|v| v.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| Error::not_found("video", video_id))?;

        Ok((
            video,
            MemoryUnitOfWork {
                store: self,
                video_id,
                staged: Vec::new(),
            },
        ))
    }

    async fn insert_video(&self, new: &NewVideo, now: OffsetDateTime) -> Result<Video> {
        let mut inner = self.lock();
        inner.next_video_id += 1;
        let video = Video {
            id: VideoId(inner.next_video_id),
            tenant_id: new.tenant_id,
            title: new.title.clone(),
            status: VideoStatus::Pending,
            script_worker: new.script_worker,
            narration_worker: new.narration_worker,
            editing_worker: new.editing_worker,
            thumbnail_worker: new.thumbnail_worker,
            status_changed_at: now,
            created_at: now,
        };
        inner.videos.insert(video.id, video.clone());
        Ok(video)
    }
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    async fn update_status(&mut self, status: VideoStatus, at: OffsetDateTime) -> Result<()> {
        self.staged.push(StagedWrite::Status(status, at));
        Ok(())
    }

    async fn append_log(&mut self, entry: NewLogEntry) -> Result<()> {
        self.staged.push(StagedWrite::Log(entry));
        Ok(())
    }

    async fn delete_video(&mut self) -> Result<()> {
        self.staged.push(StagedWrite::Delete);
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let mut inner = self.store.lock();
        for write in self.staged {
            match write {
                StagedWrite::Status(status, at) => {
                    if let Some(video) = inner.videos.get_mut(&self.video_id) {
                        video.status = status;
                        video.status_changed_at = at;
                    }
                }
                StagedWrite::Log(entry) => {
                    inner.next_log_id += 1;
                    let id = inner.next_log_id;
                    inner.log.push(StatusLogEntry {
                        id,
                        tenant_id: entry.tenant_id,
                        video_id: entry.video_id,
                        actor: entry.actor,
                        from_status: entry.from_status,
                        to_status: entry.to_status,
                        duration_secs: entry.duration_secs,
                        created_at: entry.created_at,
                    });
                }
                StagedWrite::Delete => {
                    inner.videos.remove(&self.video_id);
                    let video_id = self.video_id;
                    inner.log.retain(|e| e.video_id != video_id);
                }
            }
        }
        Ok(())
    }
}

impl LogStore for MemoryStore {
    async fn fetch_entries(&self, filter: &LogFilter) -> Result<Vec<StatusLogEntry>> {
        let mut entries: Vec<_> = self
            .lock()
            .log
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.created_at, e.id));
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl DirectoryStore for MemoryStore {
    async fn fetch_worker(
        &self,
        tenant_id: TenantId,
        worker_id: WorkerId,
    ) -> Result<Option<Worker>> {
        Ok(self
            .lock()
            .workers
            .get(&worker_id)
            .filter(|w| w.tenant_id == tenant_id)
            .cloned())
    }

    async fn fetch_tenant_settings(&self, tenant_id: TenantId) -> Result<Option<TenantSettings>> {
        Ok(self.lock().settings.get(&tenant_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Actor;

    fn new_video(tenant: i64) -> NewVideo {
        NewVideo {
            tenant_id: TenantId(tenant),
            title: "ep-1".into(),
            script_worker: None,
            narration_worker: None,
            editing_worker: None,
            thumbnail_worker: None,
        }
    }

    #[tokio::test]
    async fn begin_scopes_by_tenant() {
        let store = MemoryStore::new();
        let video = store
            .insert_video(&new_video(1), OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();

        assert!(store.begin(TenantId(1), video.id).await.is_ok());

        let err = store.begin(TenantId(2), video.id).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn dropped_unit_of_work_discards_writes() {
        let store = MemoryStore::new();
        let video = store
            .insert_video(&new_video(1), OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();

        {
            let (_, mut uow) = store.begin(TenantId(1), video.id).await.unwrap();
            uow.update_status(VideoStatus::ScriptRequested, OffsetDateTime::UNIX_EPOCH)
                .await
                .unwrap();
            // Dropped without commit.
        }

        assert_eq!(store.video(video.id).unwrap().status, VideoStatus::Pending);
    }

    #[tokio::test]
    async fn committed_writes_are_visible_in_order() {
        let store = MemoryStore::new();
        let video = store
            .insert_video(&new_video(1), OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();

        let (_, mut uow) = store.begin(TenantId(1), video.id).await.unwrap();
        uow.update_status(VideoStatus::ScriptCompleted, OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();
        uow.update_status(VideoStatus::NarrationRequested, OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();
        uow.append_log(NewLogEntry {
            tenant_id: TenantId(1),
            video_id: video.id,
            actor: Actor::Worker(WorkerId(1)),
            from_status: VideoStatus::ScriptCompleted,
            to_status: VideoStatus::NarrationRequested,
            duration_secs: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        })
        .await
        .unwrap();
        uow.commit().await.unwrap();

        assert_eq!(
            store.video(video.id).unwrap().status,
            VideoStatus::NarrationRequested
        );
        assert_eq!(store.log_entries().len(), 1);
    }

    #[tokio::test]
    async fn delete_purges_log_entries() {
        let store = MemoryStore::new();
        let video = store
            .insert_video(&new_video(1), OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();
        let other = store
            .insert_video(&new_video(1), OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();

        store.seed_log([
            StatusLogEntry {
                id: 1,
                tenant_id: TenantId(1),
                video_id: video.id,
                actor: Actor::Worker(WorkerId(1)),
                from_status: VideoStatus::Pending,
                to_status: VideoStatus::ScriptRequested,
                duration_secs: None,
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            StatusLogEntry {
                id: 2,
                tenant_id: TenantId(1),
                video_id: other.id,
                actor: Actor::Worker(WorkerId(1)),
                from_status: VideoStatus::Pending,
                to_status: VideoStatus::ScriptRequested,
                duration_secs: None,
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
        ]);

        let (_, mut uow) = store.begin(TenantId(1), video.id).await.unwrap();
        uow.delete_video().await.unwrap();
        uow.commit().await.unwrap();

        assert!(store.video(video.id).is_none());
        let remaining = store.log_entries();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].video_id, other.id);
    }
}
