//! Run command - the full pipeline for one story.

use crate::artifacts::Stage;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, RunOptions, StoryReport};
use crate::story::story_id;
use anyhow::Result;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Run the full pipeline for one story.
pub async fn run_story(
    story: &str,
    force: bool,
    upload: bool,
    localize: bool,
    settings: Settings,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let options = RunOptions {
        force,
        upload: upload || settings.upload.enabled,
        localize: localize || settings.localization.enabled,
        only: None,
    };
    let id = resolve_story_id(story)?;

    let orchestrator = build_orchestrator(settings, &options, cancel)?;
    Output::info(&format!("Processing {}", id));

    let report = orchestrator.run_story(&id, &options).await;
    finish_story(&report)
}

/// Accept either a story identifier or a path to its markdown file.
pub(super) fn resolve_story_id(story: &str) -> Result<String> {
    let path = Path::new(story);
    if path.extension().is_some_and(|e| e == "md") {
        Ok(story_id(path)?)
    } else {
        Ok(story.to_string())
    }
}

/// Check requirements for `options` and build an orchestrator with progress output.
pub(super) fn build_orchestrator(
    settings: Settings,
    options: &RunOptions,
    cancel: Arc<AtomicBool>,
) -> Result<Orchestrator> {
    let needs = |stage: Stage| match options.only {
        Some(only) => only == stage,
        None => match stage {
            Stage::Upload => options.upload,
            Stage::Localization => options.localize,
            _ => true,
        },
    };

    if needs(Stage::Narration) {
        preflight::check(Operation::Narrate, &settings)?;
    }
    if needs(Stage::Mix) || needs(Stage::Video) {
        preflight::check(Operation::Render, &settings)?;
    }
    if needs(Stage::Upload) || needs(Stage::Localization) {
        preflight::check(Operation::Publish, &settings)?;
    }
    if needs(Stage::Localization) {
        preflight::check(Operation::Localize, &settings)?;
    }

    Ok(Orchestrator::new(settings)?.with_cancel_flag(cancel))
}

/// Print a story report and turn a failure into an error exit.
pub(super) fn finish_story(report: &StoryReport) -> Result<()> {
    println!();
    Output::story_report(report);
    println!();

    if let Some((stage, cause)) = report.failure() {
        Output::error(&format!("{} failed at {}: {}", report.story_id, stage, cause));
        anyhow::bail!("{} failed", report.story_id);
    }
    if report.is_cancelled() {
        Output::warning(&format!("{} was cancelled", report.story_id));
        anyhow::bail!("{} cancelled", report.story_id);
    }

    if report.all_skipped() {
        Output::success(&format!("{} is already complete.", report.story_id));
    } else {
        Output::success(&format!("{} complete.", report.story_id));
    }
    Ok(())
}
