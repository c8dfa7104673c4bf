//! Where stories and artifacts live on disk.

use super::Stage;
use crate::config::Settings;
use std::path::PathBuf;

/// Resolved directories for stories and every stage's artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactLayout {
    pub stories_dir: PathBuf,
    pub narrations_dir: PathBuf,
    pub subtitles_dir: PathBuf,
    pub mixed_dir: PathBuf,
    pub images_dir: PathBuf,
    pub videos_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub localizations_dir: PathBuf,
    /// Optional background music consumed by the mix stage.
    pub background: Option<PathBuf>,
}

impl ArtifactLayout {
    pub fn from_settings(settings: &Settings) -> Self {
        let paths = &settings.paths;
        Self {
            stories_dir: settings.resolve(&paths.stories_dir),
            narrations_dir: settings.resolve(&paths.narrations_dir),
            subtitles_dir: settings.resolve(&paths.subtitles_dir),
            mixed_dir: settings.resolve(&paths.mixed_dir),
            images_dir: settings.resolve(&paths.images_dir),
            videos_dir: settings.resolve(&paths.videos_dir),
            uploads_dir: settings.resolve(&paths.uploads_dir),
            localizations_dir: settings.resolve(&paths.localizations_dir),
            background: settings.background_music(),
        }
    }

    /// Markdown source of a story.
    pub fn story_path(&self, story_id: &str) -> PathBuf {
        self.stories_dir.join(format!("{}.md", story_id))
    }

    pub fn stage_dir(&self, stage: Stage) -> &PathBuf {
        match stage {
            Stage::Narration => &self.narrations_dir,
            Stage::Subtitles => &self.subtitles_dir,
            Stage::Mix => &self.mixed_dir,
            Stage::Cover => &self.images_dir,
            Stage::Video => &self.videos_dir,
            Stage::Upload => &self.uploads_dir,
            Stage::Localization => &self.localizations_dir,
        }
    }

    /// Artifact a stage produces for a story.
    pub fn artifact_path(&self, stage: Stage, story_id: &str) -> PathBuf {
        self.stage_dir(stage)
            .join(format!("{}.{}", story_id, stage.extension()))
    }

    /// Background music, when configured and present.
    pub fn existing_background(&self) -> Option<&PathBuf> {
        self.background.as_ref().filter(|p| p.is_file())
    }

    /// Create every artifact directory.
    pub fn create_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.stories_dir)?;
        for stage in Stage::ALL {
            std::fs::create_dir_all(self.stage_dir(stage))?;
        }
        Ok(())
    }
}
