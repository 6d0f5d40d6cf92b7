//! The production pipeline vocabulary: departments, phases, and the
//! video status set.
//!
//! A video moves through four departments in a fixed order, each with a
//! requested / in-progress / completed sub-state, plus the edge states
//! `Pending`, `Published` and `Cancelled`. The full status list is a fixed
//! enumerable vocabulary consumed by UI collaborators for display and
//! filtering; the engine logic keys off the [`Department`]/[`Phase`]
//! decomposition, never off status strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One of the four sequential production departments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Script,
    Narration,
    Editing,
    Thumbnail,
}

impl Department {
    /// All departments in pipeline order.
    pub const ALL: [Department; 4] = [
        Department::Script,
        Department::Narration,
        Department::Editing,
        Department::Thumbnail,
    ];

    /// The department that follows this one in the pipeline, if any.
    ///
    /// `Thumbnail` is last: completing it does not cascade anywhere,
    /// publishing is a separate explicit action.
    pub fn next(self) -> Option<Department> {
        match self {
            Department::Script => Some(Department::Narration),
            Department::Narration => Some(Department::Editing),
            Department::Editing => Some(Department::Thumbnail),
            Department::Thumbnail => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Department::Script => "script",
            Department::Narration => "narration",
            Department::Editing => "editing",
            Department::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-state of a department: work requested, actively worked, or done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Requested,
    InProgress,
    Completed,
}

/// Status of a video in the production pipeline.
///
/// Wire names are fixed and consumed by external collaborators; they must
/// not change (`Script_Requested`, `Narration_InProgress`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoStatus {
    Pending,
    #[serde(rename = "Script_Requested")]
    ScriptRequested,
    #[serde(rename = "Script_InProgress")]
    ScriptInProgress,
    #[serde(rename = "Script_Completed")]
    ScriptCompleted,
    #[serde(rename = "Narration_Requested")]
    NarrationRequested,
    #[serde(rename = "Narration_InProgress")]
    NarrationInProgress,
    #[serde(rename = "Narration_Completed")]
    NarrationCompleted,
    #[serde(rename = "Editing_Requested")]
    EditingRequested,
    #[serde(rename = "Editing_InProgress")]
    EditingInProgress,
    #[serde(rename = "Editing_Completed")]
    EditingCompleted,
    #[serde(rename = "Thumbnail_Requested")]
    ThumbnailRequested,
    #[serde(rename = "Thumbnail_InProgress")]
    ThumbnailInProgress,
    #[serde(rename = "Thumbnail_Completed")]
    ThumbnailCompleted,
    Published,
    Cancelled,
}

impl VideoStatus {
    /// Every status, in pipeline order. The UI vocabulary.
    pub const ALL: [VideoStatus; 15] = [
        VideoStatus::Pending,
        VideoStatus::ScriptRequested,
        VideoStatus::ScriptInProgress,
        VideoStatus::ScriptCompleted,
        VideoStatus::NarrationRequested,
        VideoStatus::NarrationInProgress,
        VideoStatus::NarrationCompleted,
        VideoStatus::EditingRequested,
        VideoStatus::EditingInProgress,
        VideoStatus::EditingCompleted,
        VideoStatus::ThumbnailRequested,
        VideoStatus::ThumbnailInProgress,
        VideoStatus::ThumbnailCompleted,
        VideoStatus::Published,
        VideoStatus::Cancelled,
    ];

    /// Build a department status from its decomposition.
    pub fn stage(department: Department, phase: Phase) -> VideoStatus {
        use Department::*;
        use Phase::*;
        match (department, phase) {
            (Script, Requested) => VideoStatus::ScriptRequested,
            (Script, InProgress) => VideoStatus::ScriptInProgress,
            (Script, Completed) => VideoStatus::ScriptCompleted,
            (Narration, Requested) => VideoStatus::NarrationRequested,
            (Narration, InProgress) => VideoStatus::NarrationInProgress,
            (Narration, Completed) => VideoStatus::NarrationCompleted,
            (Editing, Requested) => VideoStatus::EditingRequested,
            (Editing, InProgress) => VideoStatus::EditingInProgress,
            (Editing, Completed) => VideoStatus::EditingCompleted,
            (Thumbnail, Requested) => VideoStatus::ThumbnailRequested,
            (Thumbnail, InProgress) => VideoStatus::ThumbnailInProgress,
            (Thumbnail, Completed) => VideoStatus::ThumbnailCompleted,
        }
    }

    /// The department this status belongs to, if it is a department status.
    ///
    /// `Pending`, `Published` and `Cancelled` have no department.
    pub fn department(self) -> Option<Department> {
        match self {
            VideoStatus::ScriptRequested
            | VideoStatus::ScriptInProgress
            | VideoStatus::ScriptCompleted => Some(Department::Script),
            VideoStatus::NarrationRequested
            | VideoStatus::NarrationInProgress
            | VideoStatus::NarrationCompleted => Some(Department::Narration),
            VideoStatus::EditingRequested
            | VideoStatus::EditingInProgress
            | VideoStatus::EditingCompleted => Some(Department::Editing),
            VideoStatus::ThumbnailRequested
            | VideoStatus::ThumbnailInProgress
            | VideoStatus::ThumbnailCompleted => Some(Department::Thumbnail),
            _ => None,
        }
    }

    /// The phase within its department, if it is a department status.
    pub fn phase(self) -> Option<Phase> {
        match self {
            VideoStatus::ScriptRequested
            | VideoStatus::NarrationRequested
            | VideoStatus::EditingRequested
            | VideoStatus::ThumbnailRequested => Some(Phase::Requested),
            VideoStatus::ScriptInProgress
            | VideoStatus::NarrationInProgress
            | VideoStatus::EditingInProgress
            | VideoStatus::ThumbnailInProgress => Some(Phase::InProgress),
            VideoStatus::ScriptCompleted
            | VideoStatus::NarrationCompleted
            | VideoStatus::EditingCompleted
            | VideoStatus::ThumbnailCompleted => Some(Phase::Completed),
            _ => None,
        }
    }

    /// `true` for any department's in-progress state.
    pub fn is_in_progress(self) -> bool {
        self.phase() == Some(Phase::InProgress)
    }

    /// `true` for any department's completed state.
    pub fn is_completed(self) -> bool {
        self.phase() == Some(Phase::Completed)
    }

    /// `true` for the terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, VideoStatus::Published | VideoStatus::Cancelled)
    }

    /// The status a completion cascades to, if any.
    ///
    /// Fixed total table: each department's completed state requests the
    /// next department; `Thumbnail_Completed` cascades nowhere.
    pub fn cascade_target(self) -> Option<VideoStatus> {
        if self.phase() != Some(Phase::Completed) {
            return None;
        }
        self.department()
            .and_then(Department::next)
            .map(|next| VideoStatus::stage(next, Phase::Requested))
    }

    /// The department to notify when this status is entered.
    ///
    /// Only the four `_Requested` states are notification-eligible.
    pub fn notification_target(self) -> Option<Department> {
        match self.phase() {
            Some(Phase::Requested) => self.department(),
            _ => None,
        }
    }

    /// Fixed wire name, shared with the store and API collaborators.
    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Pending => "Pending",
            VideoStatus::ScriptRequested => "Script_Requested",
            VideoStatus::ScriptInProgress => "Script_InProgress",
            VideoStatus::ScriptCompleted => "Script_Completed",
            VideoStatus::NarrationRequested => "Narration_Requested",
            VideoStatus::NarrationInProgress => "Narration_InProgress",
            VideoStatus::NarrationCompleted => "Narration_Completed",
            VideoStatus::EditingRequested => "Editing_Requested",
            VideoStatus::EditingInProgress => "Editing_InProgress",
            VideoStatus::EditingCompleted => "Editing_Completed",
            VideoStatus::ThumbnailRequested => "Thumbnail_Requested",
            VideoStatus::ThumbnailInProgress => "Thumbnail_InProgress",
            VideoStatus::ThumbnailCompleted => "Thumbnail_Completed",
            VideoStatus::Published => "Published",
            VideoStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VideoStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown video status: {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_table_is_total_and_fixed() {
        assert_eq!(
            VideoStatus::ScriptCompleted.cascade_target(),
            Some(VideoStatus::NarrationRequested)
        );
        assert_eq!(
            VideoStatus::NarrationCompleted.cascade_target(),
            Some(VideoStatus::EditingRequested)
        );
        assert_eq!(
            VideoStatus::EditingCompleted.cascade_target(),
            Some(VideoStatus::ThumbnailRequested)
        );
        assert_eq!(VideoStatus::ThumbnailCompleted.cascade_target(), None);
    }

    #[test]
    fn only_completions_cascade() {
        for status in VideoStatus::ALL {
            if !status.is_completed() {
                assert_eq!(status.cascade_target(), None, "{status} must not cascade");
            }
        }
    }

    #[test]
    fn only_requested_states_notify() {
        assert_eq!(
            VideoStatus::NarrationRequested.notification_target(),
            Some(Department::Narration)
        );
        assert_eq!(VideoStatus::NarrationInProgress.notification_target(), None);
        assert_eq!(VideoStatus::Pending.notification_target(), None);
        assert_eq!(VideoStatus::Published.notification_target(), None);
    }

    #[test]
    fn wire_names_round_trip() {
        for status in VideoStatus::ALL {
            let parsed: VideoStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_value(VideoStatus::ScriptInProgress).unwrap();
        assert_eq!(json, serde_json::json!("Script_InProgress"));

        let status: VideoStatus = serde_json::from_value(json).unwrap();
        assert_eq!(status, VideoStatus::ScriptInProgress);
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        let err = "Script_Done".parse::<VideoStatus>().unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[test]
    fn stage_round_trips_with_decomposition() {
        for dept in Department::ALL {
            for phase in [Phase::Requested, Phase::InProgress, Phase::Completed] {
                let status = VideoStatus::stage(dept, phase);
                assert_eq!(status.department(), Some(dept));
                assert_eq!(status.phase(), Some(phase));
            }
        }
    }

    #[test]
    fn department_order_is_fixed() {
        assert_eq!(Department::Script.next(), Some(Department::Narration));
        assert_eq!(Department::Narration.next(), Some(Department::Editing));
        assert_eq!(Department::Editing.next(), Some(Department::Thumbnail));
        assert_eq!(Department::Thumbnail.next(), None);
    }
}
