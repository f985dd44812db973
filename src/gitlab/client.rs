//! REST client for the GitLab v4 API.
//!
//! Each logical worker builds its own `GitLabClient` from the shared
//! `Config`; no connection pool or auth state is shared across concurrent
//! workers, so no locking is needed anywhere in the fetch path.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::{Config, REQUEST_TIMEOUT_SECONDS};
use crate::error::{DevLensError, Result};
use crate::gitlab::types::{
    Commit, Job, MergeRequest, MergeRequestChanges, MergeRequestStub, Note, Pipeline,
    PipelineStub, Project,
};

const MAX_ATTEMPTS: u32 = 5;
const RETRY_BACKOFF_SECONDS: f64 = 1.5;
const PER_PAGE: u32 = 100;

pub struct GitLabClient {
    client: Client,
    config: Config,
}

impl GitLabClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("devlens/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| DevLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{path}",
            self.config.base_url.as_str().trim_end_matches('/')
        )
    }

    /// Authenticated GET with retry on transient failures.
    ///
    /// Status 429 and all 5xx responses, as well as connect/timeout errors,
    /// are retried with a `1.5 * attempt` seconds backoff for up to
    /// `MAX_ATTEMPTS` attempts. Any other non-2xx status fails immediately.
    async fn get_with_retry(&self, path: &str, query: &[(String, String)]) -> Result<Response> {
        let url = self.endpoint(path);
        let mut attempt: u32 = 1;

        loop {
            let request = self
                .client
                .get(&url)
                .bearer_auth(self.config.token.as_str())
                .query(query);

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(e.into());
                    }
                    warn!("Network error on {path} ({e}), retrying ({attempt}/{MAX_ATTEMPTS})");
                    Self::backoff(attempt).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if attempt >= MAX_ATTEMPTS {
                    return Err(DevLensError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: MAX_ATTEMPTS,
                    });
                }
                warn!("GitLab returned {status} for {path}, retrying ({attempt}/{MAX_ATTEMPTS})");
                Self::backoff(attempt).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unable to read error response".to_string());
                return Err(DevLensError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }
    }

    async fn backoff(attempt: u32) {
        tokio::time::sleep(Duration::from_secs_f64(
            RETRY_BACKOFF_SECONDS * f64::from(attempt),
        ))
        .await;
    }

    /// Single non-paginated GET returning the body as one record.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let response = self.get_with_retry(path, query).await?;
        Ok(response.json().await?)
    }

    /// Walk numbered pages until the `x-next-page` response header is absent,
    /// concatenating items.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut paged_query = query.to_vec();
            paged_query.push(("per_page".to_string(), PER_PAGE.to_string()));
            paged_query.push(("page".to_string(), page.to_string()));

            let response = self.get_with_retry(path, &paged_query).await?;
            let next_page = response
                .headers()
                .get("x-next-page")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u32>().ok());

            let mut batch: Vec<T> = response.json().await?;
            items.append(&mut batch);

            match next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(items)
    }

    // Projects

    pub async fn list_projects_membership(&self) -> Result<Vec<Project>> {
        self.get_paginated(
            "/api/v4/projects",
            &query(&[
                ("membership", "true"),
                ("order_by", "last_activity_at"),
                ("sort", "desc"),
            ]),
        )
        .await
    }

    pub async fn list_group_projects(&self, group_path: &str) -> Result<Vec<Project>> {
        let encoded = encode_path_component(group_path);
        self.get_paginated(
            &format!("/api/v4/groups/{encoded}/projects"),
            &query(&[
                ("include_subgroups", "true"),
                ("order_by", "last_activity_at"),
                ("sort", "desc"),
            ]),
        )
        .await
    }

    // Pipelines

    pub async fn list_pipelines(&self, project_id: u64) -> Result<Vec<PipelineStub>> {
        self.get_paginated(
            &format!("/api/v4/projects/{project_id}/pipelines"),
            &query(&[("order_by", "updated_at"), ("sort", "desc")]),
        )
        .await
    }

    pub async fn get_pipeline(&self, project_id: u64, pipeline_id: u64) -> Result<Pipeline> {
        self.get_json(
            &format!("/api/v4/projects/{project_id}/pipelines/{pipeline_id}"),
            &[],
        )
        .await
    }

    pub async fn get_pipeline_jobs(&self, project_id: u64, pipeline_id: u64) -> Result<Vec<Job>> {
        self.get_paginated(
            &format!("/api/v4/projects/{project_id}/pipelines/{pipeline_id}/jobs"),
            &[],
        )
        .await
    }

    // Merge requests

    pub async fn list_merged_merge_requests(
        &self,
        project_id: u64,
        updated_after: DateTime<Utc>,
    ) -> Result<Vec<MergeRequestStub>> {
        self.get_paginated(
            &format!("/api/v4/projects/{project_id}/merge_requests"),
            &[
                ("state".to_string(), "merged".to_string()),
                ("scope".to_string(), "all".to_string()),
                ("order_by".to_string(), "updated_at".to_string()),
                ("sort".to_string(), "desc".to_string()),
                ("updated_after".to_string(), updated_after.to_rfc3339()),
            ],
        )
        .await
    }

    pub async fn get_merge_request(&self, project_id: u64, iid: u64) -> Result<MergeRequest> {
        self.get_json(
            &format!("/api/v4/projects/{project_id}/merge_requests/{iid}"),
            &[],
        )
        .await
    }

    pub async fn get_merge_request_notes(&self, project_id: u64, iid: u64) -> Result<Vec<Note>> {
        self.get_paginated(
            &format!("/api/v4/projects/{project_id}/merge_requests/{iid}/notes"),
            &query(&[("sort", "asc")]),
        )
        .await
    }

    pub async fn get_merge_request_commits(
        &self,
        project_id: u64,
        iid: u64,
    ) -> Result<Vec<Commit>> {
        self.get_paginated(
            &format!("/api/v4/projects/{project_id}/merge_requests/{iid}/commits"),
            &[],
        )
        .await
    }

    pub async fn get_merge_request_changes(
        &self,
        project_id: u64,
        iid: u64,
    ) -> Result<MergeRequestChanges> {
        self.get_json(
            &format!("/api/v4/projects/{project_id}/merge_requests/{iid}/changes"),
            &[],
        )
        .await
    }
}

fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Group paths appear as a single URL path component; GitLab expects the
/// separators percent-encoded.
fn encode_path_component(path: &str) -> String {
    path.replace('/', "%2F")
}
