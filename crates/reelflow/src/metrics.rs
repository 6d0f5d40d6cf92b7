//! Log-derived productivity metrics.
//!
//! There is no explicit "task" record anywhere in the system: a task's
//! realized duration exists only as the gap between an `_InProgress` log
//! entry and a later `_Completed` entry for the same (video, actor) pair.
//! This module reconstructs those pairs and aggregates them, reading the
//! same ledger the workflow engine writes but sharing none of its state.
//!
//! Everything here is a pure reduction over a fetched window: re-running
//! any query over an unchanged log yields identical results.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use time::Date;

use crate::error::Result;
use crate::model::{Actor, StatusLogEntry, VideoId, WorkerId};
use crate::pipeline::{Department, Phase, VideoStatus};
use crate::store::{LogFilter, LogStore};

/// Configuration for metrics queries.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// A realized duration strictly above this counts as a delay.
    pub delay_threshold: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            // One day.
            delay_threshold: Duration::from_secs(86_400),
        }
    }
}

/// One reconstructed task: an `_InProgress` → `_Completed` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealizedTask {
    pub video_id: VideoId,
    pub actor: Actor,
    pub department: Department,
    /// Whole seconds between the paired entries' timestamps. May diverge
    /// from the live-write duration when intermediate transitions occurred.
    pub duration_secs: i64,
}

/// Per-actor productivity aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerProductivity {
    pub actor: Actor,
    /// Completed tasks with a qualifying `_InProgress` predecessor.
    pub completed_tasks: u64,
    pub total_duration_secs: i64,
    /// Integer average over completed tasks.
    pub average_duration_secs: i64,
    /// Human-readable average, e.g. `"1d 2h 3m 4s"`.
    pub average_duration: String,
    /// Tasks whose realized duration exceeded the delay threshold.
    pub delays: u64,
}

/// Most-active-worker query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopWorker {
    pub worker_id: WorkerId,
    pub transitions: u64,
}

/// Most-active-department query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopDepartment {
    pub department: Department,
    pub transitions: u64,
}

/// Transition count for one status over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCount {
    pub status: VideoStatus,
    pub transitions: u64,
}

/// Read-side metrics over the transition log.
#[derive(Clone)]
pub struct MetricsEngine<S> {
    store: S,
    config: MetricsConfig,
}

impl<S> MetricsEngine<S>
where
    S: LogStore,
{
    /// Create a metrics engine with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, MetricsConfig::default())
    }

    /// Create a metrics engine with an explicit configuration.
    pub fn with_config(store: S, config: MetricsConfig) -> Self {
        Self { store, config }
    }

    /// Per-worker productivity aggregates over a filtered window.
    ///
    /// Results are ordered by actor for stable output.
    pub async fn productivity(&self, filter: &LogFilter) -> Result<Vec<WorkerProductivity>> {
        let entries = self.store.fetch_entries(filter).await?;
        let tasks = pair_completions(&entries);
        Ok(aggregate_productivity(
            &tasks,
            self.config.delay_threshold.as_secs() as i64,
        ))
    }

    /// The individual reconstructed tasks behind a productivity report,
    /// ordered by (video, actor) for stable output.
    pub async fn realized_tasks(&self, filter: &LogFilter) -> Result<Vec<RealizedTask>> {
        let entries = self.store.fetch_entries(filter).await?;
        let mut tasks = pair_completions(&entries);
        tasks.sort_by_key(|t| (t.video_id, t.actor));
        Ok(tasks)
    }

    /// The worker with the most log entries in the window.
    ///
    /// When counts tie, the worker whose entries appear first in the
    /// scanned window wins; no ordering contract is exposed for ties.
    pub async fn most_active_worker(&self, filter: &LogFilter) -> Result<Option<TopWorker>> {
        let entries = self.store.fetch_entries(filter).await?;
        Ok(top_worker(&entries))
    }

    /// The department with the most log entries in the window, keyed by
    /// each entry's `to_status`.
    ///
    /// Same tie behavior as [`most_active_worker`](Self::most_active_worker).
    pub async fn most_active_department(
        &self,
        filter: &LogFilter,
    ) -> Result<Option<TopDepartment>> {
        let entries = self.store.fetch_entries(filter).await?;
        Ok(top_department(&entries))
    }

    /// Transition counts per status, in pipeline vocabulary order.
    pub async fn status_breakdown(&self, filter: &LogFilter) -> Result<Vec<StatusCount>> {
        let entries = self.store.fetch_entries(filter).await?;
        Ok(status_breakdown(&entries))
    }

    /// Transition counts per UTC day, for dashboard time series.
    pub async fn daily_transitions(&self, filter: &LogFilter) -> Result<BTreeMap<Date, u64>> {
        let entries = self.store.fetch_entries(filter).await?;
        let mut days = BTreeMap::new();
        for entry in &entries {
            *days.entry(entry.created_at.date()).or_insert(0u64) += 1;
        }
        Ok(days)
    }
}

/// Pair `_Completed` entries with their nearest preceding matching
/// `_InProgress` entry within the same (video, actor) group.
///
/// Groups are ordered by `(created_at, id)`. A completion with no
/// qualifying predecessor is dropped — it contributes neither duration nor
/// a completed count.
pub(crate) fn pair_completions(entries: &[StatusLogEntry]) -> Vec<RealizedTask> {
    let mut groups: HashMap<(VideoId, Actor), Vec<&StatusLogEntry>> = HashMap::new();
    for entry in entries {
        groups
            .entry((entry.video_id, entry.actor))
            .or_default()
            .push(entry);
    }

    let mut tasks = Vec::new();
    for ((video_id, actor), mut group) in groups {
        group.sort_by_key(|e| (e.created_at, e.id));

        for (i, entry) in group.iter().enumerate() {
            if entry.to_status.phase() != Some(Phase::Completed) {
                continue;
            }
            let Some(department) = entry.to_status.department() else {
                continue;
            };
            let started = VideoStatus::stage(department, Phase::InProgress);

            if let Some(predecessor) = group[..i]
                .iter()
                .rev()
                .find(|e| e.to_status == started)
            {
                tasks.push(RealizedTask {
                    video_id,
                    actor,
                    department,
                    duration_secs: (entry.created_at - predecessor.created_at).whole_seconds(),
                });
            }
        }
    }
    tasks
}

/// Fold realized tasks into per-actor aggregates, ordered by actor.
pub(crate) fn aggregate_productivity(
    tasks: &[RealizedTask],
    delay_threshold_secs: i64,
) -> Vec<WorkerProductivity> {
    let mut by_actor: BTreeMap<Actor, (u64, i64, u64)> = BTreeMap::new();
    for task in tasks {
        let (completed, total, delays) = by_actor.entry(task.actor).or_default();
        *completed += 1;
        *total += task.duration_secs;
        if task.duration_secs > delay_threshold_secs {
            *delays += 1;
        }
    }

    by_actor
        .into_iter()
        .map(|(actor, (completed_tasks, total_duration_secs, delays))| {
            let average_duration_secs = total_duration_secs / completed_tasks as i64;
            WorkerProductivity {
                actor,
                completed_tasks,
                total_duration_secs,
                average_duration_secs,
                average_duration: format_duration(average_duration_secs),
                delays,
            }
        })
        .collect()
}

fn top_worker(entries: &[StatusLogEntry]) -> Option<TopWorker> {
    let mut counts: HashMap<WorkerId, u64> = HashMap::new();
    for entry in entries {
        if let Actor::Worker(worker_id) = entry.actor {
            *counts.entry(worker_id).or_insert(0) += 1;
        }
    }

    // First-encountered group wins ties: replace only on strictly greater.
    let mut seen = HashSet::new();
    let mut best: Option<TopWorker> = None;
    for entry in entries {
        let Actor::Worker(worker_id) = entry.actor else {
            continue;
        };
        if !seen.insert(worker_id) {
            continue;
        }
        let transitions = counts[&worker_id];
        if best.map_or(true, |b| transitions > b.transitions) {
            best = Some(TopWorker {
                worker_id,
                transitions,
            });
        }
    }
    best
}

fn top_department(entries: &[StatusLogEntry]) -> Option<TopDepartment> {
    let mut counts: HashMap<Department, u64> = HashMap::new();
    for entry in entries {
        if let Some(department) = entry.to_status.department() {
            *counts.entry(department).or_insert(0) += 1;
        }
    }

    let mut seen = HashSet::new();
    let mut best: Option<TopDepartment> = None;
    for entry in entries {
        let Some(department) = entry.to_status.department() else {
            continue;
        };
        if !seen.insert(department) {
            continue;
        }
        let transitions = counts[&department];
        if best.map_or(true, |b| transitions > b.transitions) {
            best = Some(TopDepartment {
                department,
                transitions,
            });
        }
    }
    best
}

fn status_breakdown(entries: &[StatusLogEntry]) -> Vec<StatusCount> {
    let mut counts: HashMap<VideoStatus, u64> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.to_status).or_insert(0) += 1;
    }

    VideoStatus::ALL
        .into_iter()
        .filter_map(|status| {
            counts.get(&status).map(|&transitions| StatusCount {
                status,
                transitions,
            })
        })
        .collect()
}

/// Format whole seconds as a days/hours/minutes/seconds breakdown.
///
/// Zero-valued components are omitted; zero (or negative) input renders
/// as `"0s"`.
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 {
        parts.push(format!("{seconds}s"));
    }

    if parts.is_empty() {
        "0s".to_owned()
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StaffId, TenantId};
    use time::{Duration as TimeDuration, OffsetDateTime};

    const T0: OffsetDateTime = OffsetDateTime::UNIX_EPOCH;

    fn entry(
        id: i64,
        video: i64,
        actor: Actor,
        to_status: VideoStatus,
        at: OffsetDateTime,
    ) -> StatusLogEntry {
        StatusLogEntry {
            id,
            tenant_id: TenantId(1),
            video_id: VideoId(video),
            actor,
            from_status: VideoStatus::Pending,
            to_status,
            duration_secs: None,
            created_at: at,
        }
    }

    fn worker(id: i64) -> Actor {
        Actor::Worker(WorkerId(id))
    }

    #[test]
    fn pairs_completion_with_nearest_preceding_in_progress() {
        let entries = vec![
            entry(1, 1, worker(7), VideoStatus::EditingInProgress, T0),
            entry(
                2,
                1,
                worker(7),
                VideoStatus::EditingCompleted,
                T0 + TimeDuration::seconds(40),
            ),
        ];

        let tasks = pair_completions(&entries);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].duration_secs, 40);
        assert_eq!(tasks[0].department, Department::Editing);
    }

    #[test]
    fn intermediate_entries_do_not_break_pairing() {
        // The realized duration spans InProgress -> Completed even when an
        // unrelated transition sits in between; this is where the log-side
        // figure diverges from the live-write "since last change" figure.
        let entries = vec![
            entry(1, 1, worker(7), VideoStatus::EditingInProgress, T0),
            entry(
                2,
                1,
                worker(7),
                VideoStatus::EditingRequested,
                T0 + TimeDuration::seconds(60),
            ),
            entry(
                3,
                1,
                worker(7),
                VideoStatus::EditingCompleted,
                T0 + TimeDuration::seconds(100),
            ),
        ];

        let tasks = pair_completions(&entries);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].duration_secs, 100);
    }

    #[test]
    fn completion_without_predecessor_is_excluded() {
        let entries = vec![entry(1, 1, worker(7), VideoStatus::ScriptCompleted, T0)];
        assert!(pair_completions(&entries).is_empty());
    }

    #[test]
    fn pairing_requires_matching_department() {
        let entries = vec![
            entry(1, 1, worker(7), VideoStatus::ScriptInProgress, T0),
            entry(
                2,
                1,
                worker(7),
                VideoStatus::EditingCompleted,
                T0 + TimeDuration::seconds(50),
            ),
        ];

        assert!(pair_completions(&entries).is_empty());
    }

    #[test]
    fn pairing_is_scoped_to_video_and_actor() {
        let entries = vec![
            entry(1, 1, worker(7), VideoStatus::ScriptInProgress, T0),
            // Different video: must not pair with the entry above.
            entry(
                2,
                2,
                worker(7),
                VideoStatus::ScriptCompleted,
                T0 + TimeDuration::seconds(10),
            ),
            // Different actor on the same video: must not pair either.
            entry(
                3,
                1,
                worker(8),
                VideoStatus::ScriptCompleted,
                T0 + TimeDuration::seconds(20),
            ),
        ];

        assert!(pair_completions(&entries).is_empty());
    }

    #[test]
    fn two_tasks_average_to_the_midpoint() {
        // Editing 40s on one video, script 200s on another, same worker:
        // 2 completed tasks, average 120s, no delays.
        let entries = vec![
            entry(1, 1, worker(7), VideoStatus::EditingInProgress, T0),
            entry(
                2,
                1,
                worker(7),
                VideoStatus::EditingCompleted,
                T0 + TimeDuration::seconds(40),
            ),
            entry(3, 2, worker(7), VideoStatus::ScriptInProgress, T0),
            entry(
                4,
                2,
                worker(7),
                VideoStatus::ScriptCompleted,
                T0 + TimeDuration::seconds(200),
            ),
        ];

        let report = aggregate_productivity(&pair_completions(&entries), 86_400);
        assert_eq!(report.len(), 1);
        let row = &report[0];
        assert_eq!(row.completed_tasks, 2);
        assert_eq!(row.total_duration_secs, 240);
        assert_eq!(row.average_duration_secs, 120);
        assert_eq!(row.average_duration, "2m");
        assert_eq!(row.delays, 0);
    }

    #[test]
    fn durations_above_threshold_count_as_delays() {
        let entries = vec![
            entry(1, 1, worker(7), VideoStatus::ScriptInProgress, T0),
            entry(
                2,
                1,
                worker(7),
                VideoStatus::ScriptCompleted,
                T0 + TimeDuration::seconds(93_784),
            ),
        ];

        let report = aggregate_productivity(&pair_completions(&entries), 86_400);
        assert_eq!(report[0].delays, 1);
        assert_eq!(report[0].average_duration, "1d 2h 3m 4s");
    }

    #[test]
    fn threshold_is_strictly_exceeded() {
        let tasks = vec![RealizedTask {
            video_id: VideoId(1),
            actor: worker(7),
            department: Department::Script,
            duration_secs: 86_400,
        }];

        let report = aggregate_productivity(&tasks, 86_400);
        assert_eq!(report[0].delays, 0);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let entries = vec![
            entry(1, 1, worker(7), VideoStatus::ScriptInProgress, T0),
            entry(
                2,
                1,
                worker(7),
                VideoStatus::ScriptCompleted,
                T0 + TimeDuration::seconds(90),
            ),
            entry(3, 1, worker(8), VideoStatus::EditingInProgress, T0),
            entry(
                4,
                1,
                worker(8),
                VideoStatus::EditingCompleted,
                T0 + TimeDuration::seconds(30),
            ),
        ];

        let first = aggregate_productivity(&pair_completions(&entries), 86_400);
        let second = aggregate_productivity(&pair_completions(&entries), 86_400);
        assert_eq!(first, second);
    }

    #[test]
    fn top_worker_counts_entries_and_ignores_staff() {
        let entries = vec![
            entry(1, 1, worker(7), VideoStatus::ScriptRequested, T0),
            entry(2, 1, worker(7), VideoStatus::ScriptInProgress, T0),
            entry(3, 1, Actor::Staff(StaffId(1)), VideoStatus::Cancelled, T0),
            entry(4, 2, worker(8), VideoStatus::ScriptRequested, T0),
        ];

        let top = top_worker(&entries).unwrap();
        assert_eq!(top.worker_id, WorkerId(7));
        assert_eq!(top.transitions, 2);
    }

    #[test]
    fn top_worker_tie_keeps_first_encountered() {
        let entries = vec![
            entry(1, 1, worker(7), VideoStatus::ScriptRequested, T0),
            entry(2, 2, worker(8), VideoStatus::ScriptRequested, T0),
            entry(3, 1, worker(7), VideoStatus::ScriptInProgress, T0),
            entry(4, 2, worker(8), VideoStatus::ScriptInProgress, T0),
        ];

        let top = top_worker(&entries).unwrap();
        assert_eq!(top.worker_id, WorkerId(7));
        assert_eq!(top.transitions, 2);
    }

    #[test]
    fn top_department_keys_off_to_status() {
        let entries = vec![
            entry(1, 1, worker(7), VideoStatus::EditingRequested, T0),
            entry(2, 1, worker(7), VideoStatus::EditingInProgress, T0),
            entry(3, 2, worker(8), VideoStatus::ScriptRequested, T0),
            entry(4, 3, worker(9), VideoStatus::Published, T0),
        ];

        let top = top_department(&entries).unwrap();
        assert_eq!(top.department, Department::Editing);
        assert_eq!(top.transitions, 2);
    }

    #[test]
    fn empty_window_has_no_top_contributors() {
        assert_eq!(top_worker(&[]), None);
        assert_eq!(top_department(&[]), None);
    }

    #[test]
    fn status_breakdown_follows_vocabulary_order() {
        let entries = vec![
            entry(1, 1, worker(7), VideoStatus::Published, T0),
            entry(2, 2, worker(7), VideoStatus::ScriptRequested, T0),
            entry(3, 3, worker(7), VideoStatus::ScriptRequested, T0),
        ];

        let breakdown = status_breakdown(&entries);
        assert_eq!(
            breakdown,
            vec![
                StatusCount {
                    status: VideoStatus::ScriptRequested,
                    transitions: 2
                },
                StatusCount {
                    status: VideoStatus::Published,
                    transitions: 1
                },
            ]
        );
    }

    #[test]
    fn format_duration_omits_zero_components() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(-5), "0s");
        assert_eq!(format_duration(120), "2m");
        assert_eq!(format_duration(3_601), "1h 1s");
        assert_eq!(format_duration(93_784), "1d 2h 3m 4s");
        assert_eq!(format_duration(86_400), "1d");
    }
}
