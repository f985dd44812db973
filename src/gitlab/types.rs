//! Serde models for the slices of the GitLab REST v4 API this tool consumes.
//!
//! Fields the collectors never read are left out; unknown fields in responses
//! are ignored. Timestamps deserialize through chrono's RFC 3339 support,
//! which accepts both with and without sub-second precision.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A project as returned by the project discovery endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    pub path_with_namespace: String,
    pub default_branch: Option<String>,
}

/// One entry of a project's pipeline listing.
///
/// The listing carries enough to apply the lookback filter and record status;
/// timing details come from the per-pipeline endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineStub {
    pub id: u64,
    #[serde(rename = "ref")]
    pub ref_: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Full pipeline detail.
#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in seconds as reported by GitLab, when available.
    pub duration: Option<f64>,
}

/// A job within a pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub status: Option<String>,
    pub stage: Option<String>,
    pub duration: Option<f64>,
    /// Seconds the job waited for a runner, when GitLab reports it.
    pub queued_duration: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One entry of a project's merge request listing.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestStub {
    pub iid: u64,
}

/// Full merge request detail.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequest {
    pub id: u64,
    pub iid: u64,
    pub title: Option<String>,
    pub author: Option<User>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub username: Option<String>,
}

/// A note (comment) on a merge request. System notes record state
/// transitions such as draft/ready toggles.
#[derive(Debug, Clone, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub system: bool,
    pub body: Option<String>,
    pub author: Option<User>,
    pub created_at: DateTime<Utc>,
}

/// A commit belonging to a merge request.
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub created_at: DateTime<Utc>,
}

/// The changes endpoint response; only the file count is used.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestChanges {
    pub changes: Option<Vec<serde_json::Value>>,
}

impl MergeRequestChanges {
    pub fn files_changed(&self) -> Option<usize> {
        self.changes.as_ref().map(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timestamps_with_and_without_subseconds() {
        let with_subsec: Note = serde_json::from_str(
            r#"{"system": true, "body": "x", "created_at": "2024-03-01T10:00:00.123Z"}"#,
        )
        .unwrap();
        let without_subsec: Note = serde_json::from_str(
            r#"{"system": false, "body": "x", "created_at": "2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert!(with_subsec.created_at > without_subsec.created_at);
    }

    #[test]
    fn note_system_flag_defaults_to_false() {
        let note: Note =
            serde_json::from_str(r#"{"created_at": "2024-03-01T10:00:00Z"}"#).unwrap();
        assert!(!note.system);
        assert!(note.body.is_none());
        assert!(note.author.is_none());
    }

    #[test]
    fn changes_expose_file_count() {
        let changes: MergeRequestChanges =
            serde_json::from_str(r#"{"changes": [{}, {}, {}]}"#).unwrap();
        assert_eq!(changes.files_changed(), Some(3));

        let absent: MergeRequestChanges = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.files_changed(), None);
    }

    #[test]
    fn ignores_unknown_fields() {
        let project: Project = serde_json::from_str(
            r#"{"id": 7, "path_with_namespace": "group/app", "default_branch": "main",
                "web_url": "https://gitlab.example.com/group/app", "star_count": 3}"#,
        )
        .unwrap();
        assert_eq!(project.id, 7);
        assert_eq!(project.default_branch.as_deref(), Some("main"));
    }
}
