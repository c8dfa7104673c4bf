//! List command implementation.

use crate::artifacts::{evaluate, ArtifactLayout, Stage, StageStatus};
use crate::audio::wav;
use crate::cli::Output;
use crate::config::Settings;
use crate::story::{list_stories, StoryDocument};
use anyhow::Result;

/// Run the list command.
pub fn run_list(settings: &Settings) -> Result<()> {
    let layout = ArtifactLayout::from_settings(settings);
    let ids = list_stories(&layout.stories_dir)?;

    if ids.is_empty() {
        Output::info(&format!(
            "No stories yet. Add markdown files to {}",
            layout.stories_dir.display()
        ));
        return Ok(());
    }

    Output::header(&format!("Stories ({})", ids.len()));
    println!();

    let mut total_words = 0;
    for id in &ids {
        let story = match StoryDocument::load(&layout.story_path(id)) {
            Ok(story) => story,
            Err(e) => {
                Output::warning(&format!("{}: {}", id, e));
                continue;
            }
        };
        let words = story.body.split_whitespace().count();
        total_words += words;

        let status = evaluate(&layout, id);
        let complete = status
            .records
            .iter()
            .filter(|r| r.status == StageStatus::Complete)
            .count();
        let narration = wav::probe(&status.record(Stage::Narration).path)
            .ok()
            .map(|info| info.duration_seconds());

        Output::story_info(id, &story.title, words, narration, complete, Stage::ALL.len());
    }

    println!();
    Output::kv("Total stories", &ids.len().to_string());
    Output::kv("Total words", &total_words.to_string());

    Ok(())
}
