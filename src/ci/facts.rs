use chrono::{DateTime, Utc};
use serde::Serialize;

/// Final pipeline status, folded into the handful of outcomes the rollups
/// care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Success,
    Failed,
    Canceled,
    Skipped,
    Other,
}

impl PipelineStatus {
    pub fn parse(status: Option<&str>) -> Self {
        match status.unwrap_or("").to_lowercase().as_str() {
            "success" => Self::Success,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            "skipped" => Self::Skipped,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Skipped => "skipped",
            Self::Other => "other",
        }
    }
}

/// Job outcome counts within one pipeline.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct JobOutcomes {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub canceled: usize,
    pub skipped: usize,
}

/// One immutable row of measured data for a single pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineFact {
    pub project_id: u64,
    pub project_path: String,
    pub pipeline_id: u64,
    pub ref_: String,
    pub is_default_branch: bool,
    pub status: PipelineStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_sec: Option<f64>,
    /// Mean queue time over this pipeline's jobs with a resolvable value.
    pub queue_mean_sec: Option<f64>,
    pub jobs: JobOutcomes,
}

/// Average job duration for one stage across all of a project's pipelines.
#[derive(Debug, Clone, Serialize)]
pub struct StageAggregate {
    pub stage: String,
    pub jobs_count: usize,
    pub avg_duration_sec: f64,
}

/// Aggregated CI statistics for one project and one run.
///
/// Statistic fields are `None` (not zero) when no fact contributed a value.
#[derive(Debug, Clone, Serialize)]
pub struct CiRollup {
    pub project_id: u64,
    pub project_path: String,
    pub pipelines_total: usize,
    pub pipelines_success: usize,
    pub success_rate: Option<f64>,
    pub duration_mean_sec: Option<f64>,
    pub duration_p50_sec: Option<f64>,
    pub duration_p90_sec: Option<f64>,
    pub queue_mean_sec: Option<f64>,
    pub queue_p50_sec: Option<f64>,
    pub queue_p90_sec: Option<f64>,
    pub default_branch: Option<String>,
    pub default_success_rate: Option<f64>,
    pub default_duration_p50_sec: Option<f64>,
    pub default_duration_p90_sec: Option<f64>,
}
