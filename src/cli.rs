use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::{Config, DEFAULT_ENTITY_CONCURRENCY, DEFAULT_PROJECT_CONCURRENCY};
use crate::{ci, devflow, output, portfolio};

#[derive(Parser)]
#[command(name = "devlens")]
#[command(author, version, about = "GitLab engineering metrics collector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// GitLab instance base URL
    #[arg(short, long, env = "GITLAB_URL", default_value = "https://gitlab.com")]
    url: String,

    /// Personal access token with API scope
    #[arg(short, long, env = "GITLAB_TOKEN")]
    token: String,

    /// Restrict collection to a group path, e.g. 'parent/subgroup'
    /// (subgroups included)
    #[arg(short, long)]
    group_path: Option<String>,

    /// Concurrent projects (outer worker pool width)
    #[arg(long, default_value_t = DEFAULT_PROJECT_CONCURRENCY)]
    project_concurrency: usize,

    /// Concurrent sub-entities per project (inner worker pool width)
    #[arg(long, default_value_t = DEFAULT_ENTITY_CONCURRENCY)]
    entity_concurrency: usize,

    /// Directory for CSV output files
    #[arg(short, long, default_value = "outputs")]
    output: PathBuf,
}

impl CommonArgs {
    fn to_config(&self) -> Result<Config> {
        Ok(Config::new(
            &self.url,
            Token::from(self.token.as_str()),
            self.group_path.clone(),
            self.project_concurrency,
            self.entity_concurrency,
        )?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Collect CI pipeline health metrics
    Ci {
        #[command(flatten)]
        common: CommonArgs,

        /// Lookback window in days
        #[arg(short, long, default_value_t = 30)]
        days: i64,
    },
    /// Collect developer-flow (merge request) metrics
    Devflow {
        #[command(flatten)]
        common: CommonArgs,

        /// Lookback window in days
        #[arg(short, long, default_value_t = 90)]
        days: i64,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Ci { common, days } => Self::execute_ci(common, *days).await,
            Commands::Devflow { common, days } => Self::execute_devflow(common, *days).await,
        }
    }

    async fn execute_ci(common: &CommonArgs, days: i64) -> Result<()> {
        let config = common.to_config()?;
        let since = Utc::now() - Duration::days(days);
        info!("Collecting CI health metrics since {since}");

        let reports =
            portfolio::collect_portfolio(&config, since, |cfg, project, since| async move {
                ci::collector::collect_project(&cfg, &project, since).await
            })
            .await?;

        let outdir = output::ensure_output_dir(&common.output, Some("ci"))?;
        let mut rollups = Vec::new();
        for (project, report) in reports {
            log_tallies(&project.path_with_namespace, report.skipped, report.failed);
            if report.facts.is_empty() {
                info!(
                    "{}: no pipelines in lookback window, skipping",
                    project.path_with_namespace
                );
                continue;
            }
            output::write_pipeline_facts_csv(&outdir, &report.facts, &project.path_with_namespace)?;
            if !report.stages.is_empty() {
                output::write_stage_csv(&outdir, &report.stages, &project.path_with_namespace)?;
            }
            rollups.push(report.rollup);
        }

        if rollups.is_empty() {
            info!("No CI data found for any project in the window");
        } else {
            output::write_ci_summary_csv(&outdir, &rollups)?;
        }
        Ok(())
    }

    async fn execute_devflow(common: &CommonArgs, days: i64) -> Result<()> {
        let config = common.to_config()?;
        let since = Utc::now() - Duration::days(days);
        info!("Collecting developer-flow metrics since {since}");

        let reports =
            portfolio::collect_portfolio(&config, since, |cfg, project, since| async move {
                devflow::collector::collect_project(&cfg, &project, since).await
            })
            .await?;

        let outdir = output::ensure_output_dir(&common.output, None)?;
        let mut rollups = Vec::new();
        for (project, report) in reports {
            log_tallies(&project.path_with_namespace, report.skipped, report.failed);
            if report.facts.is_empty() {
                info!(
                    "{}: no merged MRs in lookback window, skipping",
                    project.path_with_namespace
                );
                continue;
            }
            output::write_mr_facts_csv(&outdir, &report.facts, &project.path_with_namespace)?;
            rollups.push(report.rollup);
        }

        if rollups.is_empty() {
            info!("No developer-flow data found for any project in the window");
        } else {
            output::write_devflow_summary_csv(&outdir, &rollups)?;
        }
        Ok(())
    }
}

fn log_tallies(project_path: &str, skipped: usize, failed: usize) {
    if skipped > 0 || failed > 0 {
        info!("{project_path}: {skipped} outside window, {failed} failed");
    }
}
