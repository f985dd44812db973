//! Portfolio-level orchestration: project discovery and the outer worker
//! pool.
//!
//! One project's total failure never aborts the run for the others; the
//! failure is logged and the project omitted. Completed reports are folded
//! one at a time after each future resolves and sorted by project path so
//! output order is deterministic regardless of completion order.

use std::future::Future;

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use log::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::gitlab::client::GitLabClient;
use crate::gitlab::types::Project;

/// All projects with membership, or all projects under the configured group
/// path (subgroups included).
pub async fn discover_projects(config: &Config) -> Result<Vec<Project>> {
    let client = GitLabClient::new(config)?;
    match &config.group_path {
        Some(group_path) => client.list_group_projects(group_path).await,
        None => client.list_projects_membership().await,
    }
}

/// Fan a per-project collector out across the outer worker pool and fold the
/// surviving reports, sorted by project path.
pub async fn collect_portfolio<R, F, Fut>(
    config: &Config,
    since: DateTime<Utc>,
    collect: F,
) -> Result<Vec<(Project, R)>>
where
    F: Fn(Config, Project, DateTime<Utc>) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let projects = discover_projects(config).await?;
    info!("Discovered {} projects", projects.len());

    let results: Vec<(Project, Result<R>)> = stream::iter(projects.into_iter().map(|project| {
        let fut = collect(config.clone(), project.clone(), since);
        async move { (project, fut.await) }
    }))
    .buffer_unordered(config.project_concurrency)
    .collect()
    .await;

    let mut reports = Vec::new();
    for (project, result) in results {
        match result {
            Ok(report) => reports.push((project, report)),
            Err(e) => warn!(
                "project {} failed, omitting from portfolio: {e}",
                project.path_with_namespace
            ),
        }
    }
    reports.sort_by(|a, b| a.0.path_with_namespace.cmp(&b.0.path_with_namespace));

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use crate::{ci, devflow};
    use serde_json::json;

    fn test_config(base_url: &str, group_path: Option<&str>) -> Config {
        Config::new(
            base_url,
            Token::from("test-token"),
            group_path.map(ToString::to_string),
            8,
            4,
        )
        .unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn group_path_switches_discovery_endpoint() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/api/v4/groups/parent%2Fsub/projects")
            .match_query(mockito::Matcher::UrlEncoded(
                "include_subgroups".into(),
                "true".into(),
            ))
            .with_body(
                json!([{"id": 1, "path_with_namespace": "parent/sub/app", "default_branch": "main"}])
                    .to_string(),
            )
            .create_async()
            .await;

        let config = test_config(&server.url(), Some("parent/sub"));
        let projects = discover_projects(&config).await.unwrap();

        mock.assert_async().await;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].path_with_namespace, "parent/sub/app");
    }

    #[tokio::test]
    async fn failing_project_is_omitted_without_aborting_the_run() {
        let mut server = mockito::Server::new_async().await;

        server
            .mock("GET", "/api/v4/projects")
            .match_query(mockito::Matcher::UrlEncoded("membership".into(), "true".into()))
            .with_body(
                json!([
                    {"id": 1, "path_with_namespace": "g/ok", "default_branch": "main"},
                    {"id": 2, "path_with_namespace": "g/broken", "default_branch": "main"},
                ])
                .to_string(),
            )
            .create_async()
            .await;

        // Healthy project with an empty pipeline listing.
        server
            .mock("GET", "/api/v4/projects/1/pipelines")
            .match_query(mockito::Matcher::Any)
            .with_body("[]")
            .create_async()
            .await;
        // Broken project: sub-entity discovery fails outright.
        server
            .mock("GET", "/api/v4/projects/2/pipelines")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let config = test_config(&server.url(), None);
        let reports =
            collect_portfolio(&config, ts("2024-04-01T00:00:00Z"), |cfg, project, since| {
                async move { ci::collector::collect_project(&cfg, &project, since).await }
            })
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0.path_with_namespace, "g/ok");
        assert_eq!(reports[0].1.rollup.pipelines_total, 0);
    }

    #[tokio::test]
    async fn reports_are_sorted_by_project_path() {
        let mut server = mockito::Server::new_async().await;

        server
            .mock("GET", "/api/v4/projects")
            .match_query(mockito::Matcher::UrlEncoded("membership".into(), "true".into()))
            .with_body(
                json!([
                    {"id": 1, "path_with_namespace": "g/zebra", "default_branch": null},
                    {"id": 2, "path_with_namespace": "g/alpha", "default_branch": null},
                ])
                .to_string(),
            )
            .create_async()
            .await;

        for id in [1, 2] {
            server
                .mock("GET", format!("/api/v4/projects/{id}/merge_requests").as_str())
                .match_query(mockito::Matcher::Any)
                .with_body("[]")
                .create_async()
                .await;
        }

        let config = test_config(&server.url(), None);
        let reports = collect_portfolio(&config, ts("2024-04-01T00:00:00Z"), {
            |cfg, project, since| async move {
                devflow::collector::collect_project(&cfg, &project, since).await
            }
        })
        .await
        .unwrap();

        let paths: Vec<&str> = reports
            .iter()
            .map(|(p, _)| p.path_with_namespace.as_str())
            .collect();
        assert_eq!(paths, vec!["g/alpha", "g/zebra"]);
    }
}
