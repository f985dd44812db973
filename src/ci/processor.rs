use chrono::{DateTime, Utc};

use crate::ci::facts::{JobOutcomes, PipelineFact, PipelineStatus};
use crate::ci::heuristics::{
    pipeline_duration_seconds, pipeline_queue_mean_seconds, stage_durations,
};
use crate::config::Config;
use crate::error::Result;
use crate::gitlab::client::GitLabClient;
use crate::gitlab::types::{PipelineStub, Project};
use crate::outcome::Outcome;

/// A processed pipeline: the fact row plus this pipeline's contribution to
/// the project's per-stage duration aggregation.
#[derive(Debug)]
pub struct ProcessedPipeline {
    pub fact: PipelineFact,
    pub stage_durations: Vec<(String, f64)>,
}

/// Turn one pipeline stub into a fact record, a skip (created outside the
/// lookback window), or an error the collector logs and counts.
///
/// Builds its own client so concurrent processors share no state.
pub async fn process_pipeline(
    config: &Config,
    project: &Project,
    stub: &PipelineStub,
    since: DateTime<Utc>,
) -> Result<Outcome<ProcessedPipeline>> {
    // Older GitLab versions omit created_at from the listing.
    let Some(created_at) = stub.created_at.or(stub.updated_at) else {
        return Ok(Outcome::Skipped);
    };
    if created_at < since {
        return Ok(Outcome::Skipped);
    }

    let client = GitLabClient::new(config)?;
    let detail = client.get_pipeline(project.id, stub.id).await?;
    let jobs = client.get_pipeline_jobs(project.id, stub.id).await?;

    let mut outcomes = JobOutcomes {
        total: jobs.len(),
        ..JobOutcomes::default()
    };
    for job in &jobs {
        match PipelineStatus::parse(job.status.as_deref()) {
            PipelineStatus::Success => outcomes.success += 1,
            PipelineStatus::Failed => outcomes.failed += 1,
            PipelineStatus::Canceled => outcomes.canceled += 1,
            PipelineStatus::Skipped => outcomes.skipped += 1,
            PipelineStatus::Other => {}
        }
    }

    let ref_ = stub.ref_.clone().unwrap_or_default();
    let is_default_branch = project
        .default_branch
        .as_deref()
        .is_some_and(|branch| branch == ref_);

    let fact = PipelineFact {
        project_id: project.id,
        project_path: project.path_with_namespace.clone(),
        pipeline_id: stub.id,
        ref_,
        is_default_branch,
        status: PipelineStatus::parse(stub.status.as_deref()),
        created_at,
        started_at: detail.started_at,
        finished_at: detail.finished_at,
        duration_sec: pipeline_duration_seconds(&detail),
        queue_mean_sec: pipeline_queue_mean_seconds(&jobs),
        jobs: outcomes,
    };

    Ok(Outcome::Fact(ProcessedPipeline {
        stage_durations: stage_durations(&jobs),
        fact,
    }))
}
