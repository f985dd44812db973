use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::devflow::facts::MrFact;
use crate::devflow::heuristics::{count_review_rounds, find_ready_time, time_to_first_review};
use crate::error::Result;
use crate::gitlab::client::GitLabClient;
use crate::gitlab::types::Project;
use crate::outcome::Outcome;
use crate::stats::hours_between;

/// Turn one merge request stub into a fact record, a skip (not merged inside
/// the lookback window), or an error the collector logs and counts.
///
/// Builds its own client so concurrent processors share no state.
pub async fn process_merge_request(
    config: &Config,
    project: &Project,
    iid: u64,
    since: DateTime<Utc>,
) -> Result<Outcome<MrFact>> {
    let client = GitLabClient::new(config)?;

    let mr = client.get_merge_request(project.id, iid).await?;
    let Some(merged_at) = mr.merged_at else {
        return Ok(Outcome::Skipped);
    };
    if merged_at < since {
        return Ok(Outcome::Skipped);
    }

    let notes = client.get_merge_request_notes(project.id, iid).await?;
    let commits = client.get_merge_request_commits(project.id, iid).await?;
    let changes = client.get_merge_request_changes(project.id, iid).await?;

    let author_username = mr
        .author
        .and_then(|a| a.username)
        .unwrap_or_else(|| "unknown".to_string());

    let start_time = find_ready_time(mr.created_at, &notes);
    let time_to_merge_h = hours_between(start_time, merged_at);
    let time_to_first_review_h = time_to_first_review(mr.created_at, &author_username, &notes);
    let review_rounds =
        count_review_rounds(&author_username, &notes, &commits, start_time, merged_at);

    Ok(Outcome::Fact(MrFact {
        project_id: project.id,
        project_path: project.path_with_namespace.clone(),
        mr_id: mr.id,
        mr_iid: mr.iid,
        title: mr.title.unwrap_or_default(),
        author_username,
        created_at: mr.created_at,
        merged_at,
        start_time,
        time_to_merge_h,
        time_to_first_review_h,
        review_rounds,
        files_changed: changes.files_changed(),
    }))
}
