//! CSV sink for fact and rollup records.
//!
//! The collection core hands this module plain record lists; everything
//! about serialization, file naming, and directory layout lives here. Empty
//! optional metrics serialize as empty cells so "no data" never reads as
//! zero downstream.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::ci::facts::{CiRollup, PipelineFact, StageAggregate};
use crate::devflow::facts::{DevFlowRollup, MrFact};

/// Replace runs of characters unsafe in filenames with a single underscore.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_replacement = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            last_was_replacement = false;
        } else if !last_was_replacement {
            out.push('_');
            last_was_replacement = true;
        }
    }
    out
}

fn project_file_stem(project_path: &str) -> String {
    sanitize_filename(&project_path.replace('/', "__"))
}

pub fn ensure_output_dir(base: &Path, subdir: Option<&str>) -> Result<PathBuf> {
    let dir = match subdir {
        Some(sub) => base.join(sub),
        None => base.to_path_buf(),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    Ok(dir)
}

fn opt_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Minimal CSV quoting: wrap and double embedded quotes only when the cell
/// contains a comma, quote, or newline. Every string cell goes through this
/// so no value can break the row layout.
fn quoted(text: &str) -> String {
    if text.contains(['"', ',', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

pub fn write_mr_facts_csv(outdir: &Path, facts: &[MrFact], project_path: &str) -> Result<PathBuf> {
    let path = outdir.join(format!("{}.csv", project_file_stem(project_path)));
    let mut w = create(&path)?;

    writeln!(
        w,
        "project_path,mr_iid,title,author,created_at,ready_or_created_at,merged_at,\
         time_to_merge_h,time_to_first_review_h,review_rounds,files_changed"
    )?;
    for fact in facts {
        writeln!(
            w,
            "{},{},{},{},{},{},{},{},{},{},{}",
            quoted(&fact.project_path),
            fact.mr_iid,
            quoted(&fact.title),
            quoted(&fact.author_username),
            fact.created_at.to_rfc3339(),
            fact.start_time.to_rfc3339(),
            fact.merged_at.to_rfc3339(),
            fact.time_to_merge_h,
            opt_cell(fact.time_to_first_review_h),
            fact.review_rounds,
            fact.files_changed.map(|n| n.to_string()).unwrap_or_default(),
        )?;
    }

    info!("wrote {}", path.display());
    Ok(path)
}

pub fn write_devflow_summary_csv(outdir: &Path, rollups: &[DevFlowRollup]) -> Result<PathBuf> {
    let path = outdir.join("_summary.csv");
    let mut w = create(&path)?;

    writeln!(
        w,
        "project_path,mrs_merged,mttm_mean_h,mttm_p50_h,mttm_p90_h,\
         ttfr_mean_h,ttfr_p50_h,ttfr_p90_h,review_rounds_avg,\
         size_xs,size_s,size_m,size_l,size_xl"
    )?;
    for r in rollups {
        writeln!(
            w,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            quoted(&r.project_path),
            r.mrs_merged,
            opt_cell(r.mttm_mean_h),
            opt_cell(r.mttm_p50_h),
            opt_cell(r.mttm_p90_h),
            opt_cell(r.ttfr_mean_h),
            opt_cell(r.ttfr_p50_h),
            opt_cell(r.ttfr_p90_h),
            opt_cell(r.review_rounds_avg),
            r.sizes.xs,
            r.sizes.s,
            r.sizes.m,
            r.sizes.l,
            r.sizes.xl,
        )?;
    }

    info!("wrote {}", path.display());
    Ok(path)
}

pub fn write_pipeline_facts_csv(
    outdir: &Path,
    facts: &[PipelineFact],
    project_path: &str,
) -> Result<PathBuf> {
    let path = outdir.join(format!("{}.csv", project_file_stem(project_path)));
    let mut w = create(&path)?;

    writeln!(
        w,
        "project_path,pipeline_id,ref,is_default_branch,status,created_at,started_at,\
         finished_at,duration_sec,queue_mean_sec,jobs_total,jobs_success,jobs_failed,\
         jobs_canceled,jobs_skipped"
    )?;
    for fact in facts {
        writeln!(
            w,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            quoted(&fact.project_path),
            fact.pipeline_id,
            quoted(&fact.ref_),
            u8::from(fact.is_default_branch),
            fact.status.as_str(),
            fact.created_at.to_rfc3339(),
            fact.started_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            fact.finished_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            opt_cell(fact.duration_sec),
            opt_cell(fact.queue_mean_sec),
            fact.jobs.total,
            fact.jobs.success,
            fact.jobs.failed,
            fact.jobs.canceled,
            fact.jobs.skipped,
        )?;
    }

    info!("wrote {}", path.display());
    Ok(path)
}

pub fn write_stage_csv(
    outdir: &Path,
    stages: &[StageAggregate],
    project_path: &str,
) -> Result<PathBuf> {
    let path = outdir.join(format!("{}__stages.csv", project_file_stem(project_path)));
    let mut w = create(&path)?;

    writeln!(w, "stage,jobs_count,avg_job_duration_sec")?;
    for stage in stages {
        writeln!(
            w,
            "{},{},{}",
            quoted(&stage.stage),
            stage.jobs_count,
            stage.avg_duration_sec
        )?;
    }

    info!("wrote {}", path.display());
    Ok(path)
}

pub fn write_ci_summary_csv(outdir: &Path, rollups: &[CiRollup]) -> Result<PathBuf> {
    let path = outdir.join("_summary.csv");
    let mut w = create(&path)?;

    writeln!(
        w,
        "project_path,pipelines_total,pipelines_success,success_rate,\
         duration_mean_sec,duration_p50_sec,duration_p90_sec,\
         queue_mean_sec,queue_p50_sec,queue_p90_sec,\
         default_branch,default_success_rate,default_duration_p50_sec,default_duration_p90_sec"
    )?;
    for r in rollups {
        writeln!(
            w,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            quoted(&r.project_path),
            r.pipelines_total,
            r.pipelines_success,
            opt_cell(r.success_rate),
            opt_cell(r.duration_mean_sec),
            opt_cell(r.duration_p50_sec),
            opt_cell(r.duration_p90_sec),
            opt_cell(r.queue_mean_sec),
            opt_cell(r.queue_p50_sec),
            opt_cell(r.queue_p90_sec),
            quoted(r.default_branch.as_deref().unwrap_or_default()),
            opt_cell(r.default_success_rate),
            opt_cell(r.default_duration_p50_sec),
            opt_cell(r.default_duration_p90_sec),
        )?;
    }

    info!("wrote {}", path.display());
    Ok(path)
}
