use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use log::{debug, warn};

use crate::config::Config;
use crate::devflow::facts::{DevFlowRollup, MrFact, SizeHistogram};
use crate::devflow::heuristics::SizeBucket;
use crate::devflow::processor::process_merge_request;
use crate::error::Result;
use crate::gitlab::client::GitLabClient;
use crate::gitlab::types::Project;
use crate::outcome::Outcome;
use crate::stats::{average, quantile};

/// Everything one project contributes to a run: fact rows, the rollup, and
/// the skip/failure tallies for observability.
#[derive(Debug)]
pub struct DevFlowReport {
    pub facts: Vec<MrFact>,
    pub rollup: DevFlowRollup,
    pub skipped: usize,
    pub failed: usize,
}

/// Collect merge-request metrics for one project.
///
/// Fetches the merged-MR listing, fans processors out across the inner
/// worker pool (completion order is not significant), then folds the facts
/// into the project rollup. An error fetching the listing itself propagates
/// as a project-level failure; individual MR failures are logged and
/// omitted.
pub async fn collect_project(
    config: &Config,
    project: &Project,
    since: DateTime<Utc>,
) -> Result<DevFlowReport> {
    let client = GitLabClient::new(config)?;
    let stubs = client.list_merged_merge_requests(project.id, since).await?;
    debug!(
        "{}: {} merged MRs listed",
        project.path_with_namespace,
        stubs.len()
    );

    let results: Vec<(u64, Result<Outcome<MrFact>>)> = stream::iter(stubs.iter().map(|stub| {
        let iid = stub.iid;
        async move { (iid, process_merge_request(config, project, iid, since).await) }
    }))
    .buffer_unordered(config.entity_concurrency)
    .collect()
    .await;

    let mut facts = Vec::new();
    let mut skipped = 0;
    let mut failed = 0;
    for (iid, result) in results {
        match result {
            Ok(Outcome::Fact(fact)) => facts.push(fact),
            Ok(Outcome::Skipped) => {
                skipped += 1;
                debug!("{} MR !{iid}: outside window", project.path_with_namespace);
            }
            Err(e) => {
                failed += 1;
                warn!("{} MR !{iid} failed: {e}", project.path_with_namespace);
            }
        }
    }

    let rollup = build_rollup(project, &facts);
    Ok(DevFlowReport {
        facts,
        rollup,
        skipped,
        failed,
    })
}

fn build_rollup(project: &Project, facts: &[MrFact]) -> DevFlowRollup {
    let mttm: Vec<f64> = facts.iter().map(|f| f.time_to_merge_h).collect();
    let ttfr: Vec<f64> = facts.iter().filter_map(|f| f.time_to_first_review_h).collect();
    let rounds: Vec<f64> = facts.iter().map(|f| f64::from(f.review_rounds)).collect();

    let mut sizes = SizeHistogram::default();
    for fact in facts {
        sizes.record(SizeBucket::from_files_changed(fact.files_changed));
    }

    DevFlowRollup {
        project_id: project.id,
        project_path: project.path_with_namespace.clone(),
        mrs_merged: facts.len(),
        mttm_mean_h: average(&mttm),
        mttm_p50_h: quantile(&mttm, 0.50),
        mttm_p90_h: quantile(&mttm, 0.90),
        ttfr_mean_h: average(&ttfr),
        ttfr_p50_h: quantile(&ttfr, 0.50),
        ttfr_p90_h: quantile(&ttfr, 0.90),
        review_rounds_avg: average(&rounds),
        sizes,
    }
}
