use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use log::{debug, warn};

use crate::ci::facts::{CiRollup, PipelineFact, PipelineStatus, StageAggregate};
use crate::ci::heuristics::stage_aggregates;
use crate::ci::processor::{process_pipeline, ProcessedPipeline};
use crate::config::Config;
use crate::error::Result;
use crate::gitlab::client::GitLabClient;
use crate::gitlab::types::Project;
use crate::outcome::Outcome;
use crate::stats::{average, quantile, success_rate};

/// Everything one project contributes to a run: fact rows, per-stage
/// aggregates, the rollup, and the skip/failure tallies for observability.
#[derive(Debug)]
pub struct CiReport {
    pub facts: Vec<PipelineFact>,
    pub stages: Vec<StageAggregate>,
    pub rollup: CiRollup,
    pub skipped: usize,
    pub failed: usize,
}

/// Collect CI health metrics for one project.
///
/// Fetches the pipeline listing, fans processors out across the inner worker
/// pool (completion order is not significant), then folds the facts into the
/// project rollup and per-stage aggregates. An error fetching the listing
/// itself propagates as a project-level failure; individual pipeline
/// failures are logged and omitted.
pub async fn collect_project(
    config: &Config,
    project: &Project,
    since: DateTime<Utc>,
) -> Result<CiReport> {
    let client = GitLabClient::new(config)?;
    let stubs = client.list_pipelines(project.id).await?;
    debug!(
        "{}: {} pipelines listed",
        project.path_with_namespace,
        stubs.len()
    );

    let results: Vec<(u64, Result<Outcome<ProcessedPipeline>>)> =
        stream::iter(stubs.iter().map(|stub| {
            let id = stub.id;
            async move { (id, process_pipeline(config, project, stub, since).await) }
        }))
        .buffer_unordered(config.entity_concurrency)
        .collect()
        .await;

    let mut facts = Vec::new();
    let mut stage_pairs: Vec<(String, f64)> = Vec::new();
    let mut skipped = 0;
    let mut failed = 0;
    for (pipeline_id, result) in results {
        match result {
            Ok(Outcome::Fact(processed)) => {
                stage_pairs.extend(processed.stage_durations);
                facts.push(processed.fact);
            }
            Ok(Outcome::Skipped) => {
                skipped += 1;
                debug!(
                    "{} pipeline #{pipeline_id}: outside window",
                    project.path_with_namespace
                );
            }
            Err(e) => {
                failed += 1;
                warn!(
                    "{} pipeline #{pipeline_id} failed: {e}",
                    project.path_with_namespace
                );
            }
        }
    }

    let rollup = build_rollup(project, &facts);
    Ok(CiReport {
        facts,
        stages: stage_aggregates(stage_pairs),
        rollup,
        skipped,
        failed,
    })
}

fn build_rollup(project: &Project, facts: &[PipelineFact]) -> CiRollup {
    let durations: Vec<f64> = facts.iter().filter_map(|f| f.duration_sec).collect();
    let queues: Vec<f64> = facts.iter().filter_map(|f| f.queue_mean_sec).collect();
    let successes = facts
        .iter()
        .filter(|f| f.status == PipelineStatus::Success)
        .count();

    let default_facts: Vec<&PipelineFact> =
        facts.iter().filter(|f| f.is_default_branch).collect();
    let default_durations: Vec<f64> = default_facts
        .iter()
        .filter_map(|f| f.duration_sec)
        .collect();
    let default_successes = default_facts
        .iter()
        .filter(|f| f.status == PipelineStatus::Success)
        .count();

    CiRollup {
        project_id: project.id,
        project_path: project.path_with_namespace.clone(),
        pipelines_total: facts.len(),
        pipelines_success: successes,
        success_rate: success_rate(successes, facts.len()),
        duration_mean_sec: average(&durations),
        duration_p50_sec: quantile(&durations, 0.50),
        duration_p90_sec: quantile(&durations, 0.90),
        queue_mean_sec: average(&queues),
        queue_p50_sec: quantile(&queues, 0.50),
        queue_p90_sec: quantile(&queues, 0.90),
        default_branch: project.default_branch.clone(),
        default_success_rate: success_rate(default_successes, default_facts.len()),
        default_duration_p50_sec: quantile(&default_durations, 0.50),
        default_duration_p90_sec: quantile(&default_durations, 0.90),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use serde_json::json;

    fn test_config(base_url: &str) -> Config {
        Config::new(base_url, Token::from("test-token"), None, 8, 4).unwrap()
    }

    fn project() -> Project {
        Project {
            id: 7,
            path_with_namespace: "group/app".to_string(),
            default_branch: Some("main".to_string()),
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    async fn mock_pipeline(
        server: &mut mockito::Server,
        id: u64,
        duration: f64,
        jobs: serde_json::Value,
    ) {
        server
            .mock("GET", format!("/api/v4/projects/7/pipelines/{id}").as_str())
            .with_body(
                json!({
                    "id": id,
                    "started_at": "2024-05-02T10:00:00Z",
                    "finished_at": "2024-05-02T10:10:00Z",
                    "duration": duration,
                })
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock(
                "GET",
                format!("/api/v4/projects/7/pipelines/{id}/jobs").as_str(),
            )
            .match_query(mockito::Matcher::Any)
            .with_body(jobs.to_string())
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn folds_facts_stages_and_rollup() {
        let mut server = mockito::Server::new_async().await;

        server
            .mock("GET", "/api/v4/projects/7/pipelines")
            .match_query(mockito::Matcher::UrlEncoded("page".into(), "1".into()))
            .with_body(
                json!([
                    {"id": 1, "ref": "main", "status": "success",
                     "created_at": "2024-05-02T09:00:00Z"},
                    {"id": 2, "ref": "feature", "status": "failed",
                     "created_at": "2024-05-03T09:00:00Z"},
                    // Outside the window, skipped before any detail fetch.
                    {"id": 3, "ref": "main", "status": "success",
                     "created_at": "2023-01-01T09:00:00Z"},
                ])
                .to_string(),
            )
            .create_async()
            .await;

        mock_pipeline(
            &mut server,
            1,
            120.0,
            json!([
                {"status": "success", "stage": "build", "duration": 60.0, "queued_duration": 5.0},
                {"status": "success", "stage": "test", "duration": 50.0, "queued_duration": 15.0},
            ]),
        )
        .await;
        mock_pipeline(
            &mut server,
            2,
            240.0,
            json!([
                {"status": "failed", "stage": "build", "duration": 80.0, "queued_duration": 10.0},
            ]),
        )
        .await;

        let config = test_config(&server.url());
        let report = collect_project(&config, &project(), ts("2024-04-01T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(report.facts.len(), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);

        let rollup = &report.rollup;
        assert_eq!(rollup.pipelines_total, 2);
        assert_eq!(rollup.pipelines_success, 1);
        assert_eq!(rollup.success_rate, Some(0.5));
        assert_eq!(rollup.duration_mean_sec, Some(180.0));
        // Default-branch slice only covers pipeline 1.
        assert_eq!(rollup.default_success_rate, Some(1.0));
        assert_eq!(rollup.default_duration_p50_sec, Some(120.0));

        // Stage aggregation spans both pipelines, sorted by name.
        assert_eq!(report.stages.len(), 2);
        assert_eq!(report.stages[0].stage, "build");
        assert_eq!(report.stages[0].jobs_count, 2);
        assert_eq!(report.stages[0].avg_duration_sec, 70.0);
        assert_eq!(report.stages[1].stage, "test");
    }

    #[tokio::test]
    async fn empty_listing_yields_rollup_shell_with_no_data_markers() {
        let mut server = mockito::Server::new_async().await;

        server
            .mock("GET", "/api/v4/projects/7/pipelines")
            .match_query(mockito::Matcher::Any)
            .with_body("[]")
            .create_async()
            .await;

        let config = test_config(&server.url());
        let report = collect_project(&config, &project(), ts("2024-04-01T00:00:00Z"))
            .await
            .unwrap();

        assert!(report.facts.is_empty());
        assert_eq!(report.rollup.pipelines_total, 0);
        assert_eq!(report.rollup.success_rate, None);
        assert_eq!(report.rollup.duration_mean_sec, None);
        assert_eq!(report.rollup.queue_p90_sec, None);
    }
}
