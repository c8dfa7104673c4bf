//! Status command implementation.

use crate::artifacts::{status_report, ArtifactLayout};
use crate::cli::Output;
use crate::config::Settings;
use crate::story::list_stories;
use anyhow::Result;

/// Print the stage status table for every known story.
pub fn run_status(settings: &Settings) -> Result<()> {
    let layout = ArtifactLayout::from_settings(settings);
    let ids = list_stories(&layout.stories_dir)?;

    if ids.is_empty() {
        Output::info(&format!(
            "No stories found in {}",
            layout.stories_dir.display()
        ));
        return Ok(());
    }

    Output::header(&format!("Stage Status ({} stories)", ids.len()));
    println!();
    Output::status_table(&status_report(&layout, &ids));

    match layout.existing_background() {
        Some(path) => Output::kv("Background music", &path.display().to_string()),
        None => Output::kv("Background music", "none (narration is used unmixed)"),
    }

    Ok(())
}
