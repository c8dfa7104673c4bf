//! Stage status evaluation.

use super::{ArtifactLayout, Stage};
use crate::artwork::supplied_cover;
use crate::audio::wav;
use crate::publish::{LocalizationRecord, UploadReceipt};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What is on disk at an artifact path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactState {
    Missing,
    /// Present but empty or unreadable.
    Unusable(String),
    /// Present and usable, with its modification time.
    Present(SystemTime),
}

impl ArtifactState {
    pub fn modified(&self) -> Option<SystemTime> {
        match self {
            ArtifactState::Present(t) => Some(*t),
            _ => None,
        }
    }
}

/// Derived status of a stage for one story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// No usable artifact.
    Absent,
    /// Artifact exists but its inputs are incomplete or newer.
    Stale,
    Complete,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageStatus::Absent => "absent",
            StageStatus::Stale => "stale",
            StageStatus::Complete => "complete",
        })
    }
}

/// Status of one stage of one story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub path: PathBuf,
    pub state: ArtifactState,
    pub status: StageStatus,
}

/// Status of every stage of one story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryStatus {
    pub story_id: String,
    pub records: Vec<StageRecord>,
}

impl StoryStatus {
    pub fn record(&self, stage: Stage) -> &StageRecord {
        // `evaluate` produces one record per stage in `Stage::ALL` order.
        &self.records[stage as usize]
    }

    pub fn status(&self, stage: Stage) -> StageStatus {
        self.record(stage).status
    }
}

fn parses_as<T: DeserializeOwned>(path: &Path) -> Result<(), String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    serde_json::from_slice::<T>(&bytes)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Check an artifact's presence and usability.
pub fn inspect(stage: Stage, path: &Path) -> ArtifactState {
    let meta = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return ArtifactState::Missing,
    };
    if meta.len() == 0 {
        return ArtifactState::Unusable("empty file".to_string());
    }

    let usable = match stage {
        Stage::Narration | Stage::Mix => match wav::probe(path) {
            Ok(info) if info.frames > 0 => Ok(()),
            Ok(_) => Err("WAV has no samples".to_string()),
            Err(e) => Err(e.to_string()),
        },
        Stage::Upload => parses_as::<UploadReceipt>(path),
        Stage::Localization => parses_as::<LocalizationRecord>(path),
        Stage::Subtitles | Stage::Cover | Stage::Video => Ok(()),
    };

    match (usable, meta.modified()) {
        (Ok(()), Ok(modified)) => ArtifactState::Present(modified),
        (Ok(()), Err(e)) => ArtifactState::Unusable(e.to_string()),
        (Err(reason), _) => ArtifactState::Unusable(reason),
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Inputs outside the pipeline a stage reads, besides upstream artifacts.
/// `None` means a required input is missing.
fn external_inputs(layout: &ArtifactLayout, stage: Stage, story_id: &str) -> Option<Vec<SystemTime>> {
    match stage {
        Stage::Narration => modified(&layout.story_path(story_id)).map(|t| vec![t]),
        Stage::Mix => Some(
            layout
                .existing_background()
                .and_then(|p| modified(p))
                .into_iter()
                .collect(),
        ),
        Stage::Cover => Some(
            supplied_cover(&layout.stories_dir, story_id)
                .and_then(|p| modified(&p))
                .into_iter()
                .collect(),
        ),
        _ => Some(Vec::new()),
    }
}

/// Derive the status of every stage of a story from the filesystem.
pub fn evaluate(layout: &ArtifactLayout, story_id: &str) -> StoryStatus {
    let mut by_stage: HashMap<Stage, (StageStatus, Option<SystemTime>)> = HashMap::new();
    let mut records = Vec::with_capacity(Stage::ALL.len());

    for stage in Stage::ALL {
        let path = layout.artifact_path(stage, story_id);
        let state = inspect(stage, &path);

        let status = match state.modified() {
            None => StageStatus::Absent,
            Some(own) => {
                let upstream_ok = stage.upstream().iter().all(|up| match by_stage.get(up) {
                    Some((StageStatus::Complete, Some(t))) => *t <= own,
                    _ => false,
                });
                let inputs_ok = external_inputs(layout, stage, story_id)
                    .is_some_and(|times| times.iter().all(|t| *t <= own));
                if upstream_ok && inputs_ok {
                    StageStatus::Complete
                } else {
                    StageStatus::Stale
                }
            }
        };

        by_stage.insert(stage, (status, state.modified()));
        records.push(StageRecord {
            stage,
            path,
            state,
            status,
        });
    }

    StoryStatus {
        story_id: story_id.to_string(),
        records,
    }
}

/// Status of every given story.
pub fn status_report(layout: &ArtifactLayout, story_ids: &[String]) -> Vec<StoryStatus> {
    story_ids.iter().map(|id| evaluate(layout, id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{wav::write_wav_atomic, PcmAudio};
    use crate::config::Settings;
    use std::time::Duration;

    fn layout(dir: &Path) -> ArtifactLayout {
        let mut settings = Settings::default();
        settings.general.workspace_dir = dir.to_string_lossy().into_owned();
        settings.paths.background_music = None;
        ArtifactLayout::from_settings(&settings)
    }

    fn touch(path: &Path, time: SystemTime) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    fn write_wav(path: &Path) {
        write_wav_atomic(path, &PcmAudio::new(24_000, 1, vec![1, 2, 3])).unwrap();
    }

    #[test]
    fn test_nothing_on_disk_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let status = evaluate(&layout(dir.path()), "story");
        assert!(status.records.iter().all(|r| r.status == StageStatus::Absent));
        assert_eq!(status.records.len(), Stage::ALL.len());
    }

    #[test]
    fn test_narration_complete_then_stale_after_story_edit() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        std::fs::create_dir_all(&layout.stories_dir).unwrap();
        let story = layout.story_path("s");
        std::fs::write(&story, "# S\n\nText.").unwrap();
        let narration = layout.artifact_path(Stage::Narration, "s");
        write_wav(&narration);

        let base = SystemTime::now() - Duration::from_secs(100);
        touch(&story, base);
        touch(&narration, base + Duration::from_secs(10));
        assert_eq!(evaluate(&layout, "s").status(Stage::Narration), StageStatus::Complete);

        touch(&story, base + Duration::from_secs(20));
        assert_eq!(evaluate(&layout, "s").status(Stage::Narration), StageStatus::Stale);
    }

    #[test]
    fn test_newer_upstream_makes_downstream_stale() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        std::fs::create_dir_all(&layout.stories_dir).unwrap();
        let story = layout.story_path("s");
        std::fs::write(&story, "Text.").unwrap();
        let narration = layout.artifact_path(Stage::Narration, "s");
        let mixed = layout.artifact_path(Stage::Mix, "s");
        write_wav(&narration);
        write_wav(&mixed);

        let base = SystemTime::now() - Duration::from_secs(100);
        touch(&story, base);
        touch(&narration, base + Duration::from_secs(1));
        touch(&mixed, base + Duration::from_secs(2));
        assert_eq!(evaluate(&layout, "s").status(Stage::Mix), StageStatus::Complete);

        touch(&narration, base + Duration::from_secs(3));
        let status = evaluate(&layout, "s");
        assert_eq!(status.status(Stage::Narration), StageStatus::Complete);
        assert_eq!(status.status(Stage::Mix), StageStatus::Stale);
    }

    #[test]
    fn test_missing_upstream_makes_downstream_stale() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        let video = layout.artifact_path(Stage::Video, "s");
        std::fs::create_dir_all(video.parent().unwrap()).unwrap();
        std::fs::write(&video, b"mp4").unwrap();

        let status = evaluate(&layout, "s");
        assert_eq!(status.status(Stage::Video), StageStatus::Stale);
    }

    #[test]
    fn test_unusable_artifacts_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        let narration = layout.artifact_path(Stage::Narration, "s");
        let receipt = layout.artifact_path(Stage::Upload, "s");
        let cover = layout.artifact_path(Stage::Cover, "s");
        for path in [&narration, &receipt, &cover] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        }
        std::fs::write(&narration, b"RIFF garbage").unwrap();
        std::fs::write(&receipt, b"{\"video_id\": ").unwrap();
        std::fs::write(&cover, b"").unwrap();

        assert!(matches!(inspect(Stage::Narration, &narration), ArtifactState::Unusable(_)));
        assert!(matches!(inspect(Stage::Upload, &receipt), ArtifactState::Unusable(_)));
        assert!(matches!(inspect(Stage::Cover, &cover), ArtifactState::Unusable(_)));

        let status = evaluate(&layout, "s");
        assert_eq!(status.status(Stage::Narration), StageStatus::Absent);
        assert_eq!(status.status(Stage::Upload), StageStatus::Absent);
        assert_eq!(status.status(Stage::Cover), StageStatus::Absent);
    }

    #[test]
    fn test_cover_has_no_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        let cover = layout.artifact_path(Stage::Cover, "s");
        std::fs::create_dir_all(cover.parent().unwrap()).unwrap();
        std::fs::write(&cover, b"png").unwrap();
        assert_eq!(evaluate(&layout, "s").status(Stage::Cover), StageStatus::Complete);
    }

    #[test]
    fn test_newer_supplied_cover_makes_cover_stale() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        std::fs::create_dir_all(&layout.stories_dir).unwrap();
        let cover = layout.artifact_path(Stage::Cover, "s");
        std::fs::create_dir_all(cover.parent().unwrap()).unwrap();
        std::fs::write(&cover, b"generated").unwrap();

        let base = SystemTime::now() - Duration::from_secs(100);
        touch(&cover, base);
        assert_eq!(evaluate(&layout, "s").status(Stage::Cover), StageStatus::Complete);

        let supplied = layout.stories_dir.join("s.jpg");
        std::fs::write(&supplied, b"jpeg").unwrap();
        touch(&supplied, base + Duration::from_secs(10));
        let status = evaluate(&layout, "s");
        assert_eq!(status.status(Stage::Cover), StageStatus::Stale);

        touch(&cover, base + Duration::from_secs(20));
        assert_eq!(evaluate(&layout, "s").status(Stage::Cover), StageStatus::Complete);
    }

    #[test]
    fn test_newer_background_makes_mix_stale() {
        let dir = tempfile::tempdir().unwrap();
        let mut layout = layout(dir.path());
        let background = dir.path().join("bg.m4a");
        std::fs::write(&background, b"music").unwrap();
        layout.background = Some(background.clone());

        std::fs::create_dir_all(&layout.stories_dir).unwrap();
        let story = layout.story_path("s");
        std::fs::write(&story, "Text.").unwrap();
        let narration = layout.artifact_path(Stage::Narration, "s");
        let mixed = layout.artifact_path(Stage::Mix, "s");
        write_wav(&narration);
        write_wav(&mixed);

        let base = SystemTime::now() - Duration::from_secs(100);
        touch(&story, base);
        touch(&background, base);
        touch(&narration, base + Duration::from_secs(1));
        touch(&mixed, base + Duration::from_secs(2));
        assert_eq!(evaluate(&layout, "s").status(Stage::Mix), StageStatus::Complete);

        touch(&background, base + Duration::from_secs(5));
        assert_eq!(evaluate(&layout, "s").status(Stage::Mix), StageStatus::Stale);
    }
}
