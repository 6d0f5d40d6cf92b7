//! Domain records shared by the workflow and metrics engines.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;
use crate::pipeline::{Department, VideoStatus};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(
    /// Identifier of a video (the unit of work flowing through the pipeline).
    VideoId
);
id_type!(
    /// Identifier of a worker within a tenant.
    WorkerId
);
id_type!(
    /// Identifier of a staff user (back-office, not a pipeline worker).
    StaffId
);
id_type!(
    /// Identifier of a tenant (company).
    TenantId
);

/// The acting party behind a transition: a pipeline worker or a staff user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Worker(WorkerId),
    Staff(StaffId),
}

impl Actor {
    /// Storage discriminant for the actor kind column.
    pub fn kind_str(self) -> &'static str {
        match self {
            Actor::Worker(_) => "worker",
            Actor::Staff(_) => "staff",
        }
    }

    /// Raw id, paired with [`kind_str`](Self::kind_str) in storage.
    pub fn id_i64(self) -> i64 {
        match self {
            Actor::Worker(id) => id.as_i64(),
            Actor::Staff(id) => id.as_i64(),
        }
    }

    /// Rebuild an actor from its stored (kind, id) columns.
    pub fn from_parts(kind: &str, id: i64) -> Result<Self, Error> {
        match kind {
            "worker" => Ok(Actor::Worker(WorkerId(id))),
            "staff" => Ok(Actor::Staff(StaffId(id))),
            other => Err(Error::Decode {
                field: "actor_kind",
                value: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind_str(), self.id_i64())
    }
}

/// A video flowing through the production pipeline.
///
/// The persisted status *is* the state machine's only state; no in-process
/// workflow state exists between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub tenant_id: TenantId,
    pub title: String,
    pub status: VideoStatus,
    /// Worker assigned per department role slot. Assignments must reference
    /// workers of the same tenant.
    pub script_worker: Option<WorkerId>,
    pub narration_worker: Option<WorkerId>,
    pub editing_worker: Option<WorkerId>,
    pub thumbnail_worker: Option<WorkerId>,
    /// When the status last changed. Duration computation measures from
    /// here, not from when the department was first entered.
    pub status_changed_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl Video {
    /// The worker assigned to a department's role slot.
    ///
    /// Explicit department-to-slot mapping, resolved once at this boundary.
    pub fn assignment(&self, department: Department) -> Option<WorkerId> {
        match department {
            Department::Script => self.script_worker,
            Department::Narration => self.narration_worker,
            Department::Editing => self.editing_worker,
            Department::Thumbnail => self.thumbnail_worker,
        }
    }
}

/// Fields for creating a video. Videos always enter the pipeline `Pending`.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub tenant_id: TenantId,
    pub title: String,
    pub script_worker: Option<WorkerId>,
    pub narration_worker: Option<WorkerId>,
    pub editing_worker: Option<WorkerId>,
    pub thumbnail_worker: Option<WorkerId>,
}

impl NewVideo {
    pub(crate) fn assignments(&self) -> impl Iterator<Item = (Department, WorkerId)> + '_ {
        [
            (Department::Script, self.script_worker),
            (Department::Narration, self.narration_worker),
            (Department::Editing, self.editing_worker),
            (Department::Thumbnail, self.thumbnail_worker),
        ]
        .into_iter()
        .filter_map(|(dept, worker)| worker.map(|w| (dept, w)))
    }
}

/// A pipeline worker. Referenced by the engine, owned elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub tenant_id: TenantId,
    pub name: String,
    pub department: Department,
    /// Contact channel for notifications. Workers without one are
    /// silently skipped.
    pub phone: Option<String>,
    pub email: String,
}

/// Credentials the notifier uses to send on behalf of a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderCredentials {
    pub sender_id: String,
    pub api_token: String,
}

/// Per-tenant notification configuration. Read-only input to the engine,
/// owned and mutated by an external configuration collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    pub tenant_id: TenantId,
    /// When set, every department-request transition notifies the assigned
    /// worker without the caller asking for it.
    pub auto_notify: bool,
    /// Message template with `{name}` and `{titulo}` placeholders.
    pub message_template: String,
    pub sender: SenderCredentials,
}

/// One immutable record in the transition log.
///
/// Entries are created exactly once per status write and never updated;
/// the only deletion path is the bulk purge when the video itself is
/// deleted. Within a (video, actor) group entries are totally ordered by
/// `(created_at, id)` — the metrics engine relies on that order to pair
/// events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusLogEntry {
    pub id: i64,
    pub tenant_id: TenantId,
    pub video_id: VideoId,
    pub actor: Actor,
    pub from_status: VideoStatus,
    pub to_status: VideoStatus,
    /// Present iff the write moved from an `_InProgress` state to a
    /// `_Completed` state; elapsed whole seconds since the previous
    /// status change.
    pub duration_secs: Option<i64>,
    pub created_at: OffsetDateTime,
}

/// A log entry about to be appended, before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub tenant_id: TenantId,
    pub video_id: VideoId,
    pub actor: Actor,
    pub from_status: VideoStatus,
    pub to_status: VideoStatus,
    pub duration_secs: Option<i64>,
    pub created_at: OffsetDateTime,
}
