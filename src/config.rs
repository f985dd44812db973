use url::Url;

use crate::auth::Token;
use crate::error::{DevLensError, Result};

pub const DEFAULT_PROJECT_CONCURRENCY: usize = 8;
pub const DEFAULT_ENTITY_CONCURRENCY: usize = 4;

/// Per-request timeout. Exceeding it counts as a transient failure and goes
/// through the client's retry policy.
pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Resolved run configuration.
///
/// Built and validated once before any fan-out begins; an invalid value here
/// is the only error that aborts a run. Cheap to clone so that every worker
/// can carry its own copy and build its own private HTTP client from it.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub token: Token,
    /// Restrict project discovery to this group path (subgroups included).
    pub group_path: Option<String>,
    /// Outer worker-pool width (concurrent projects).
    pub project_concurrency: usize,
    /// Inner worker-pool width (concurrent sub-entities per project).
    pub entity_concurrency: usize,
}

impl Config {
    pub fn new(
        base_url: &str,
        token: Token,
        group_path: Option<String>,
        project_concurrency: usize,
        entity_concurrency: usize,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DevLensError::Config(format!("Invalid base URL: {e}")))?;

        if token.as_str().is_empty() {
            return Err(DevLensError::Config("Access token must not be empty".to_string()));
        }
        if project_concurrency == 0 || entity_concurrency == 0 {
            return Err(DevLensError::Config(
                "Worker pool widths must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            token,
            group_path,
            project_concurrency,
            entity_concurrency,
        })
    }
}
