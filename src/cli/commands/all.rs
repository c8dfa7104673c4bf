//! All command - batch run over every story.

use super::run::build_orchestrator;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{BatchReport, RunOptions};
use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Run the pipeline for every story in the stories directory.
pub async fn run_all(
    force: bool,
    upload: bool,
    localize: bool,
    concurrency: Option<usize>,
    mut settings: Settings,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    if let Some(n) = concurrency {
        settings.batch.max_concurrent_stories = n.max(1);
    }
    let options = RunOptions {
        force,
        upload: upload || settings.upload.enabled,
        localize: localize || settings.localization.enabled,
        only: None,
    };

    let orchestrator = build_orchestrator(settings, &options, cancel)?;
    let ids = orchestrator.story_ids()?;
    if ids.is_empty() {
        Output::info(&format!(
            "No stories found in {}",
            orchestrator.layout().stories_dir.display()
        ));
        return Ok(());
    }

    Output::info(&format!(
        "Processing {} stories ({} at a time)",
        ids.len(),
        orchestrator.settings().batch.max_concurrent_stories
    ));
    let report = orchestrator.run_batch(&ids, &options).await;
    finish_batch(&report)
}

/// Print the batch summary and turn failures into an error exit.
pub(super) fn finish_batch(report: &BatchReport) -> Result<()> {
    Output::batch_summary(report);
    println!();

    if report.succeeded() {
        Output::success("All stories complete.");
        return Ok(());
    }

    let failed = report.failed().len();
    let cancelled = report.cancelled().len();
    anyhow::bail!(
        "{} of {} stories failed, {} cancelled",
        failed,
        report.stories.len(),
        cancelled
    )
}
