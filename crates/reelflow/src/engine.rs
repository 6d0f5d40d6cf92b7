//! Workflow transition execution.
//!
//! [`WorkflowEngine::apply_transition`] is the single write path for video
//! statuses:
//!
//! 1. Begin a unit of work (locks and loads the video, `NotFound` otherwise)
//! 2. Plan the transition — a pure function of current status, its
//!    timestamp, the requested status and `now`
//! 3. Write the status, append one log entry (with duration when the write
//!    moves `_InProgress` → `_Completed`)
//! 4. Apply the cascade write + log entry when the fixed table has a
//!    successor
//! 5. Commit the transaction
//! 6. Attempt the notification, outside the transaction, best-effort
//!
//! The engine deliberately does not check that the requested status is a
//! legal successor of the current one — any jump is accepted, matching the
//! observable behavior callers depend on.

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{Actor, NewLogEntry, NewVideo, TenantId, Video, VideoId};
use crate::notify::{render_template, Notifier};
use crate::pipeline::VideoStatus;
use crate::store::{DirectoryStore, Store, UnitOfWork};

/// A requested status change for one video.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub tenant_id: TenantId,
    pub video_id: VideoId,
    pub new_status: VideoStatus,
    pub actor: Actor,
    pub options: TransitionOptions,
}

/// Caller-controlled switches for a transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionOptions {
    /// Request a notification even when the tenant's `auto_notify` is off.
    pub send_message: bool,
}

/// What a committed transition did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// The status the caller requested (the primary write).
    pub status: VideoStatus,
    /// The cascade target, when the fixed table had a successor.
    pub cascaded_to: Option<VideoStatus>,
    /// Elapsed seconds attached to the primary log entry, when computed.
    pub duration_secs: Option<i64>,
    /// Whether a notification was attempted and accepted by the transport.
    pub notified: bool,
}

/// The pure plan for one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransitionPlan {
    /// Duration for the primary log entry, iff the current status is any
    /// `_InProgress` state and the new one any `_Completed` state. Measured
    /// from the video's last status change, not from department entry.
    pub duration_secs: Option<i64>,
    /// Secondary write from the fixed cascade table.
    pub cascade: Option<VideoStatus>,
}

impl TransitionPlan {
    /// The status the video ends up in after the plan is applied.
    pub fn effective(&self, new_status: VideoStatus) -> VideoStatus {
        self.cascade.unwrap_or(new_status)
    }
}

/// Plan a transition without touching storage.
///
/// Deterministic in its inputs; the engine supplies `now` once so the
/// status write, the log entry and the duration all agree on a single
/// timestamp.
pub(crate) fn plan_transition(
    current: VideoStatus,
    status_changed_at: OffsetDateTime,
    new_status: VideoStatus,
    now: OffsetDateTime,
) -> TransitionPlan {
    let duration_secs = (current.is_in_progress() && new_status.is_completed())
        .then(|| (now - status_changed_at).whole_seconds());

    TransitionPlan {
        duration_secs,
        cascade: new_status.cascade_target(),
    }
}

/// The workflow state machine over a transactional store.
#[derive(Clone)]
pub struct WorkflowEngine<S, N> {
    store: S,
    notifier: N,
}

impl<S, N> WorkflowEngine<S, N>
where
    S: Store + DirectoryStore,
    N: Notifier,
{
    /// Create an engine over a store and a notification transport.
    pub fn new(store: S, notifier: N) -> Self {
        Self { store, notifier }
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply a status transition.
    ///
    /// The status write, its log entry, and the cascade's secondary write
    /// commit as one atomic unit; nothing is retried on failure. The
    /// notification runs after commit and can never fail the transition.
    pub async fn apply_transition(&self, request: TransitionRequest) -> Result<TransitionOutcome> {
        let (video, mut uow) = self
            .store
            .begin(request.tenant_id, request.video_id)
            .await?;

        let now = OffsetDateTime::now_utc();
        let from_status = video.status;
        let plan = plan_transition(from_status, video.status_changed_at, request.new_status, now);

        uow.update_status(request.new_status, now).await?;
        uow.append_log(NewLogEntry {
            tenant_id: request.tenant_id,
            video_id: request.video_id,
            actor: request.actor,
            from_status,
            to_status: request.new_status,
            duration_secs: plan.duration_secs,
            created_at: now,
        })
        .await?;

        if let Some(next) = plan.cascade {
            uow.update_status(next, now).await?;
            uow.append_log(NewLogEntry {
                tenant_id: request.tenant_id,
                video_id: request.video_id,
                actor: request.actor,
                from_status: request.new_status,
                to_status: next,
                duration_secs: None,
                created_at: now,
            })
            .await?;
        }

        uow.commit().await?;

        debug!(
            video_id = %request.video_id,
            from = %from_status,
            to = %request.new_status,
            cascaded_to = plan.cascade.map(VideoStatus::as_str),
            duration_secs = plan.duration_secs,
            "Transition committed"
        );

        let effective = plan.effective(request.new_status);
        let notified = self.notify_after_commit(&video, effective, request.options).await;

        Ok(TransitionOutcome {
            status: request.new_status,
            cascaded_to: plan.cascade,
            duration_secs: plan.duration_secs,
            notified,
        })
    }

    /// Create a video. Videos always enter the pipeline `Pending`.
    ///
    /// The title must be non-blank, and every department assignment must
    /// resolve to a worker of the same tenant.
    pub async fn create_video(&self, new: NewVideo) -> Result<Video> {
        if new.title.trim().is_empty() {
            return Err(Error::Validation("video title must not be blank".into()));
        }

        for (department, worker_id) in new.assignments() {
            let worker = self.store.fetch_worker(new.tenant_id, worker_id).await?;
            if worker.is_none() {
                return Err(Error::not_found("worker", worker_id));
            }
            debug!(%worker_id, department = %department, "Assignment resolved");
        }

        let video = self
            .store
            .insert_video(&new, OffsetDateTime::now_utc())
            .await?;
        debug!(video_id = %video.id, tenant_id = %video.tenant_id, "Video created");
        Ok(video)
    }

    /// Delete a video and purge all of its log entries, atomically.
    pub async fn delete_video(&self, tenant_id: TenantId, video_id: VideoId) -> Result<()> {
        let (_video, mut uow) = self.store.begin(tenant_id, video_id).await?;
        uow.delete_video().await?;
        uow.commit().await?;
        debug!(%video_id, %tenant_id, "Video deleted, log purged");
        Ok(())
    }

    /// Attempt the post-commit notification. Never fails the transition.
    ///
    /// Eligible when the effective status (the cascade target when one
    /// exists) is a `_Requested` state, and either the caller asked for a
    /// message or the tenant has `auto_notify` on. Returns whether the
    /// transport accepted a send.
    async fn notify_after_commit(
        &self,
        video: &Video,
        effective: VideoStatus,
        options: TransitionOptions,
    ) -> bool {
        let Some(department) = effective.notification_target() else {
            return false;
        };

        let settings = match self.store.fetch_tenant_settings(video.tenant_id).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(tenant_id = %video.tenant_id, error = %e, "Notification skipped: settings lookup failed");
                return false;
            }
        };

        let auto_notify = settings.as_ref().is_some_and(|s| s.auto_notify);
        if !(options.send_message || auto_notify) {
            return false;
        }
        let Some(settings) = settings else {
            warn!(tenant_id = %video.tenant_id, "Notification requested but tenant has no messaging settings");
            return false;
        };

        let Some(worker_id) = video.assignment(department) else {
            debug!(video_id = %video.id, department = %department, "Notification skipped: no worker assigned");
            return false;
        };

        let worker = match self.store.fetch_worker(video.tenant_id, worker_id).await {
            Ok(Some(worker)) => worker,
            Ok(None) => {
                warn!(%worker_id, video_id = %video.id, "Notification skipped: assigned worker not found");
                return false;
            }
            Err(e) => {
                warn!(%worker_id, error = %e, "Notification skipped: worker lookup failed");
                return false;
            }
        };

        let Some(phone) = worker.phone.as_deref() else {
            debug!(%worker_id, "Notification skipped: worker has no contact channel");
            return false;
        };

        let message = render_template(&settings.message_template, &worker.name, &video.title);
        match self.notifier.send(&settings.sender, phone, &message).await {
            Ok(()) => {
                debug!(%worker_id, video_id = %video.id, status = %effective, "Notification sent");
                true
            }
            Err(e) => {
                warn!(%worker_id, video_id = %video.id, error = %e, "Notification failed");
                false
            }
        }
    }
}
