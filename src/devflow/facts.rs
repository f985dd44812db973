use chrono::{DateTime, Utc};
use serde::Serialize;

use super::heuristics::SizeBucket;

/// One immutable row of measured data for a single merged merge request.
#[derive(Debug, Clone, Serialize)]
pub struct MrFact {
    pub project_id: u64,
    pub project_path: String,
    pub mr_id: u64,
    pub mr_iid: u64,
    pub title: String,
    pub author_username: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: DateTime<Utc>,
    /// Creation time, or the last "marked as ready" transition if any.
    pub start_time: DateTime<Utc>,
    pub time_to_merge_h: f64,
    pub time_to_first_review_h: Option<f64>,
    pub review_rounds: u32,
    pub files_changed: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SizeHistogram {
    pub xs: usize,
    pub s: usize,
    pub m: usize,
    pub l: usize,
    pub xl: usize,
    pub unknown: usize,
}

impl SizeHistogram {
    pub fn record(&mut self, bucket: SizeBucket) {
        match bucket {
            SizeBucket::Xs => self.xs += 1,
            SizeBucket::S => self.s += 1,
            SizeBucket::M => self.m += 1,
            SizeBucket::L => self.l += 1,
            SizeBucket::Xl => self.xl += 1,
            SizeBucket::Unknown => self.unknown += 1,
        }
    }
}

/// Aggregated developer-flow statistics for one project and one run.
///
/// Statistic fields are `None` (not zero) when no fact contributed a value.
#[derive(Debug, Clone, Serialize)]
pub struct DevFlowRollup {
    pub project_id: u64,
    pub project_path: String,
    pub mrs_merged: usize,
    pub mttm_mean_h: Option<f64>,
    pub mttm_p50_h: Option<f64>,
    pub mttm_p90_h: Option<f64>,
    pub ttfr_mean_h: Option<f64>,
    pub ttfr_p50_h: Option<f64>,
    pub ttfr_p90_h: Option<f64>,
    pub review_rounds_avg: Option<f64>,
    pub sizes: SizeHistogram,
}
