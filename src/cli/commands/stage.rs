//! Stage command - one stage for one story or for every story.

use super::all::finish_batch;
use super::run::{build_orchestrator, finish_story, resolve_story_id};
use crate::artifacts::Stage;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::RunOptions;
use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Run a single stage.
pub async fn run_stage(
    stage: Stage,
    story: Option<&str>,
    force: bool,
    settings: Settings,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let options = RunOptions {
        force,
        only: Some(stage),
        ..RunOptions::default()
    };
    let orchestrator = build_orchestrator(settings, &options, cancel)?;

    match story {
        Some(story) => {
            let id = resolve_story_id(story)?;
            Output::info(&format!("Running {} for {}", stage, id));
            let report = orchestrator.run_story(&id, &options).await;
            finish_story(&report)
        }
        None => {
            let ids = orchestrator.story_ids()?;
            if ids.is_empty() {
                Output::info("No stories found.");
                return Ok(());
            }
            Output::info(&format!("Running {} for {} stories", stage, ids.len()));
            let report = orchestrator.run_batch(&ids, &options).await;
            finish_batch(&report)
        }
    }
}
