//! PostgreSQL store implementation.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use time::OffsetDateTime;

use super::{DirectoryStore, LogFilter, LogStore, Store, UnitOfWork};
use crate::error::{map_db_error, Error, Result};
use crate::model::{
    Actor, NewLogEntry, NewVideo, SenderCredentials, StatusLogEntry, TenantId, TenantSettings,
    Video, VideoId, Worker, WorkerId,
};
use crate::pipeline::{Department, Phase, VideoStatus};

/// PostgreSQL-backed store for production use.
///
/// Uses row-level locking via `SELECT ... FOR UPDATE` on the `videos` table
/// for per-video concurrency control: two concurrent transitions on the
/// same video are serialized, transitions on different videos proceed in
/// parallel. The lock is held for the duration of the transaction and
/// released on commit (or rollback on drop).
///
/// # Database Schema
///
/// Requires tables in the `reelflow` schema (see `migrations/`):
///
/// | Table             | Purpose                                         |
/// |-------------------|-------------------------------------------------|
/// | `videos`          | Pipeline state; the status column is the state machine's only state |
/// | `status_log`      | Append-only transition ledger                   |
/// | `workers`         | Referenced for assignments and notifications    |
/// | `tenant_settings` | Per-tenant notification configuration           |
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new PostgreSQL store from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn video_from_row(row: &PgRow) -> Result<Video> {
    let status: String = row.try_get("status")?;
    Ok(Video {
        id: VideoId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        title: row.try_get("title")?,
        status: status.parse()?,
        script_worker: row.try_get::<Option<i64>, _>("script_worker")?.map(WorkerId),
        narration_worker: row
            .try_get::<Option<i64>, _>("narration_worker")?
            .map(WorkerId),
        editing_worker: row.try_get::<Option<i64>, _>("editing_worker")?.map(WorkerId),
        thumbnail_worker: row
            .try_get::<Option<i64>, _>("thumbnail_worker")?
            .map(WorkerId),
        status_changed_at: row.try_get("status_changed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn log_entry_from_row(row: &PgRow) -> Result<StatusLogEntry> {
    let actor_kind: String = row.try_get("actor_kind")?;
    let from_status: String = row.try_get("from_status")?;
    let to_status: String = row.try_get("to_status")?;
    Ok(StatusLogEntry {
        id: row.try_get("id")?,
        tenant_id: TenantId(row.try_get("tenant_id")?),
        video_id: VideoId(row.try_get("video_id")?),
        actor: Actor::from_parts(&actor_kind, row.try_get("actor_id")?)?,
        from_status: from_status.parse()?,
        to_status: to_status.parse()?,
        duration_secs: row.try_get("duration_secs")?,
        created_at: row.try_get("created_at")?,
    })
}

fn parse_department(value: &str) -> Result<Department> {
    Department::ALL
        .into_iter()
        .find(|d| d.as_str() == value)
        .ok_or_else(|| Error::Decode {
            field: "department",
            value: value.to_owned(),
        })
}

const VIDEO_COLUMNS: &str = "id, tenant_id, title, status, script_worker, narration_worker, \
                             editing_worker, thumbnail_worker, status_changed_at, created_at";

impl Store for PgStore {
    type UnitOfWork<'a> = PgUnitOfWork<'a>;

    async fn begin<'a>(
        &'a self,
        tenant_id: TenantId,
        video_id: VideoId,
    ) -> Result<(Video, Self::UnitOfWork<'a>)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {VIDEO_COLUMNS} FROM reelflow.videos \
             WHERE id = $1 AND tenant_id = $2 \
             FOR UPDATE"
        ))
        .bind(video_id.as_i64())
        .bind(tenant_id.as_i64())
        .fetch_optional(&mut *tx)
        .await?;

        // Transaction is rolled back on drop, releasing the lock
        let Some(row) = row else {
            return Err(Error::not_found("video", video_id));
        };

        let video = video_from_row(&row)?;
        Ok((video, PgUnitOfWork { tx, video_id }))
    }

    async fn insert_video(&self, new: &NewVideo, now: OffsetDateTime) -> Result<Video> {
        let row = sqlx::query(
            "INSERT INTO reelflow.videos \
             (tenant_id, title, status, script_worker, narration_worker, \
              editing_worker, thumbnail_worker, status_changed_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) \
             RETURNING id",
        )
        .bind(new.tenant_id.as_i64())
        .bind(&new.title)
        .bind(VideoStatus::Pending.as_str())
        .bind(new.script_worker.map(WorkerId::as_i64))
        .bind(new.narration_worker.map(WorkerId::as_i64))
        .bind(new.editing_worker.map(WorkerId::as_i64))
        .bind(new.thumbnail_worker.map(WorkerId::as_i64))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(Video {
            id: VideoId(row.try_get("id")?),
            tenant_id: new.tenant_id,
            title: new.title.clone(),
            status: VideoStatus::Pending,
            script_worker: new.script_worker,
            narration_worker: new.narration_worker,
            editing_worker: new.editing_worker,
            thumbnail_worker: new.thumbnail_worker,
            status_changed_at: now,
            created_at: now,
        })
    }
}

/// PostgreSQL unit of work.
///
/// Wraps a transaction with the video's row lock held until commit.
pub struct PgUnitOfWork<'a> {
    tx: Transaction<'a, Postgres>,
    video_id: VideoId,
}

impl UnitOfWork for PgUnitOfWork<'_> {
    async fn update_status(&mut self, status: VideoStatus, at: OffsetDateTime) -> Result<()> {
        sqlx::query(
            "UPDATE reelflow.videos SET status = $1, status_changed_at = $2 WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(at)
        .bind(self.video_id.as_i64())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_log(&mut self, entry: NewLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO reelflow.status_log \
             (tenant_id, video_id, actor_kind, actor_id, from_status, to_status, \
              duration_secs, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.tenant_id.as_i64())
        .bind(entry.video_id.as_i64())
        .bind(entry.actor.kind_str())
        .bind(entry.actor.id_i64())
        .bind(entry.from_status.as_str())
        .bind(entry.to_status.as_str())
        .bind(entry.duration_secs)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_video(&mut self) -> Result<()> {
        // Purge the ledger first: no orphan log rows may survive the video.
        sqlx::query("DELETE FROM reelflow.status_log WHERE video_id = $1")
            .bind(self.video_id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("DELETE FROM reelflow.videos WHERE id = $1")
            .bind(self.video_id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl LogStore for PgStore {
    async fn fetch_entries(&self, filter: &LogFilter) -> Result<Vec<StatusLogEntry>> {
        if filter.statuses.as_ref().is_some_and(Vec::is_empty) {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, tenant_id, video_id, actor_kind, actor_id, from_status, to_status, \
             duration_secs, created_at \
             FROM reelflow.status_log \
             WHERE tenant_id = ",
        );
        builder.push_bind(filter.tenant_id.as_i64());

        if let Some(video_id) = filter.video_id {
            builder.push(" AND video_id = ");
            builder.push_bind(video_id.as_i64());
        }

        if let Some(worker_id) = filter.worker_id {
            builder.push(" AND actor_kind = 'worker' AND actor_id = ");
            builder.push_bind(worker_id.as_i64());
        }

        if let Some(department) = filter.department {
            builder.push(" AND to_status IN (");
            let mut separated = builder.separated(", ");
            for phase in [Phase::Requested, Phase::InProgress, Phase::Completed] {
                separated.push_bind(VideoStatus::stage(department, phase).as_str());
            }
            builder.push(")");
        }

        if let Some(statuses) = &filter.statuses {
            builder.push(" AND to_status IN (");
            let mut separated = builder.separated(", ");
            for status in statuses {
                separated.push_bind(status.as_str());
            }
            builder.push(")");
        }

        if let Some(from) = filter.from {
            builder.push(" AND created_at >= ");
            builder.push_bind(from);
        }

        if let Some(until) = filter.until {
            builder.push(" AND created_at <= ");
            builder.push_bind(until);
        }

        builder.push(" ORDER BY created_at ASC, id ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(log_entry_from_row).collect()
    }
}

#[async_trait::async_trait]
impl DirectoryStore for PgStore {
    async fn fetch_worker(
        &self,
        tenant_id: TenantId,
        worker_id: WorkerId,
    ) -> Result<Option<Worker>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, name, department, phone, email \
             FROM reelflow.workers \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(worker_id.as_i64())
        .bind(tenant_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let department: String = row.try_get("department")?;
        Ok(Some(Worker {
            id: WorkerId(row.try_get("id")?),
            tenant_id: TenantId(row.try_get("tenant_id")?),
            name: row.try_get("name")?,
            department: parse_department(&department)?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
        }))
    }

    async fn fetch_tenant_settings(&self, tenant_id: TenantId) -> Result<Option<TenantSettings>> {
        let row = sqlx::query(
            "SELECT tenant_id, auto_notify, message_template, sender_id, api_token \
             FROM reelflow.tenant_settings \
             WHERE tenant_id = $1",
        )
        .bind(tenant_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(TenantSettings {
            tenant_id: TenantId(row.try_get("tenant_id")?),
            auto_notify: row.try_get("auto_notify")?,
            message_template: row.try_get("message_template")?,
            sender: SenderCredentials {
                sender_id: row.try_get("sender_id")?,
                api_token: row.try_get("api_token")?,
            },
        }))
    }
}
