//! Duration and queue-time resolution for pipelines and jobs.
//!
//! API-reported duration fields win over timestamp arithmetic; timestamps
//! are only a fallback, and `None` means the value is genuinely unknowable.

use std::collections::HashMap;

use crate::ci::facts::StageAggregate;
use crate::gitlab::types::{Job, Pipeline};
use crate::stats::{average, seconds_between};

pub const UNKNOWN_STAGE: &str = "unknown";

/// Prefer the reported `duration`; otherwise derive from
/// `finished_at - started_at`.
pub fn pipeline_duration_seconds(pipeline: &Pipeline) -> Option<f64> {
    if let Some(duration) = pipeline.duration {
        return Some(duration);
    }
    match (pipeline.started_at, pipeline.finished_at) {
        (Some(started), Some(finished)) => Some(seconds_between(started, finished)),
        _ => None,
    }
}

/// Prefer the reported `queued_duration` (timestamps are ignored entirely
/// when it is present); otherwise derive from `started_at - created_at`.
pub fn job_queue_seconds(job: &Job) -> Option<f64> {
    if let Some(queued) = job.queued_duration {
        return Some(queued);
    }
    match (job.created_at, job.started_at) {
        (Some(created), Some(started)) => Some(seconds_between(created, started)),
        _ => None,
    }
}

/// Prefer the reported `duration`; otherwise derive from
/// `finished_at - started_at`.
pub fn job_duration_seconds(job: &Job) -> Option<f64> {
    if let Some(duration) = job.duration {
        return Some(duration);
    }
    match (job.started_at, job.finished_at) {
        (Some(started), Some(finished)) => Some(seconds_between(started, finished)),
        _ => None,
    }
}

/// Mean queue time over the jobs with a resolvable value.
pub fn pipeline_queue_mean_seconds(jobs: &[Job]) -> Option<f64> {
    let queues: Vec<f64> = jobs.iter().filter_map(job_queue_seconds).collect();
    average(&queues)
}

/// This pipeline's contribution to per-stage aggregation: one
/// `(stage, duration)` pair per job with a resolvable duration. Jobs with no
/// stage name land in the "unknown" stage.
pub fn stage_durations(jobs: &[Job]) -> Vec<(String, f64)> {
    jobs.iter()
        .filter_map(|job| {
            job_duration_seconds(job).map(|duration| {
                let stage = job.stage.clone().unwrap_or_else(|| UNKNOWN_STAGE.to_string());
                (stage, duration)
            })
        })
        .collect()
}

/// Finish stage aggregation over a whole project's pairs: one row per stage
/// with a job count and average duration, sorted by stage name for
/// deterministic output.
pub fn stage_aggregates(pairs: impl IntoIterator<Item = (String, f64)>) -> Vec<StageAggregate> {
    let mut stages: HashMap<String, Vec<f64>> = HashMap::new();
    for (stage, duration) in pairs {
        stages.entry(stage).or_default().push(duration);
    }

    let mut rows: Vec<StageAggregate> = stages
        .into_iter()
        .filter_map(|(stage, durations)| {
            average(&durations).map(|avg_duration_sec| StageAggregate {
                stage,
                jobs_count: durations.len(),
                avg_duration_sec,
            })
        })
        .collect();
    rows.sort_by(|a, b| a.stage.cmp(&b.stage));
    rows
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> Option<DateTime<Utc>> {
        Some(s.parse().unwrap())
    }

    fn job(
        queued_duration: Option<f64>,
        duration: Option<f64>,
        stage: Option<&str>,
    ) -> Job {
        Job {
            status: Some("success".to_string()),
            stage: stage.map(ToString::to_string),
            duration,
            queued_duration,
            created_at: ts("2024-03-01T10:00:00Z"),
            started_at: ts("2024-03-01T10:00:30Z"),
            finished_at: ts("2024-03-01T10:05:30Z"),
        }
    }

    mod queue_time {
        use super::*;

        #[test]
        fn reported_queued_duration_ignores_timestamps() {
            // created/started are 30s apart; queued_duration must win.
            let job = job(Some(7.0), Some(1.0), None);
            assert_eq!(job_queue_seconds(&job), Some(7.0));
        }

        #[test]
        fn falls_back_to_started_minus_created() {
            let job = job(None, Some(1.0), None);
            assert_eq!(job_queue_seconds(&job), Some(30.0));
        }

        #[test]
        fn unresolvable_without_timestamps() {
            let mut job = job(None, None, None);
            job.started_at = None;
            assert_eq!(job_queue_seconds(&job), None);
        }

        #[test]
        fn pipeline_mean_skips_unresolvable_jobs() {
            let mut no_queue = job(None, None, None);
            no_queue.created_at = None;
            no_queue.started_at = None;
            let jobs = vec![job(Some(10.0), None, None), job(Some(20.0), None, None), no_queue];
            assert_eq!(pipeline_queue_mean_seconds(&jobs), Some(15.0));
        }

        #[test]
        fn pipeline_mean_is_none_when_nothing_resolves() {
            assert_eq!(pipeline_queue_mean_seconds(&[]), None);
        }
    }

    mod durations {
        use super::*;

        #[test]
        fn reported_pipeline_duration_wins() {
            let pipeline = Pipeline {
                id: 1,
                started_at: ts("2024-03-01T10:00:00Z"),
                finished_at: ts("2024-03-01T10:10:00Z"),
                duration: Some(540.0),
            };
            assert_eq!(pipeline_duration_seconds(&pipeline), Some(540.0));
        }

        #[test]
        fn pipeline_duration_derived_from_timestamps() {
            let pipeline = Pipeline {
                id: 1,
                started_at: ts("2024-03-01T10:00:00Z"),
                finished_at: ts("2024-03-01T10:10:00Z"),
                duration: None,
            };
            assert_eq!(pipeline_duration_seconds(&pipeline), Some(600.0));
        }

        #[test]
        fn pipeline_duration_unresolvable_without_either() {
            let pipeline = Pipeline {
                id: 1,
                started_at: None,
                finished_at: ts("2024-03-01T10:10:00Z"),
                duration: None,
            };
            assert_eq!(pipeline_duration_seconds(&pipeline), None);
        }

        #[test]
        fn job_duration_derived_from_timestamps() {
            let job = job(None, None, None);
            assert_eq!(job_duration_seconds(&job), Some(300.0));
        }
    }

    mod stages {
        use super::*;

        #[test]
        fn groups_durations_by_stage_with_unknown_sentinel() {
            let pairs = stage_durations(&[
                job(None, Some(10.0), Some("build")),
                job(None, Some(20.0), Some("build")),
                job(None, Some(5.0), None),
            ]);
            let rows = stage_aggregates(pairs);

            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].stage, "build");
            assert_eq!(rows[0].jobs_count, 2);
            assert_eq!(rows[0].avg_duration_sec, 15.0);
            assert_eq!(rows[1].stage, UNKNOWN_STAGE);
            assert_eq!(rows[1].jobs_count, 1);
        }

        #[test]
        fn jobs_without_resolvable_duration_are_excluded() {
            let mut no_duration = job(None, None, Some("test"));
            no_duration.started_at = None;
            no_duration.finished_at = None;

            let pairs = stage_durations(&[no_duration]);
            assert!(stage_aggregates(pairs).is_empty());
        }
    }
}
