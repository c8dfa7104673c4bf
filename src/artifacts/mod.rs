//! Pipeline stages, their artifacts, and status derived from the filesystem.
//!
//! Every stage writes exactly one artifact per story. Whether a stage needs
//! to run is decided only by looking at artifacts on disk: nothing about a
//! previous run is remembered anywhere else.

mod layout;
mod status;

pub use layout::ArtifactLayout;
pub use status::{evaluate, inspect, status_report, ArtifactState, StageRecord, StageStatus, StoryStatus};

use crate::error::{FortellError, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Narration,
    Subtitles,
    Mix,
    Cover,
    Video,
    Upload,
    Localization,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Narration,
        Stage::Subtitles,
        Stage::Mix,
        Stage::Cover,
        Stage::Video,
        Stage::Upload,
        Stage::Localization,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Narration => "narration",
            Stage::Subtitles => "subtitles",
            Stage::Mix => "mix",
            Stage::Cover => "cover",
            Stage::Video => "video",
            Stage::Upload => "upload",
            Stage::Localization => "localization",
        }
    }

    /// Stages whose artifacts this stage consumes.
    pub fn upstream(&self) -> &'static [Stage] {
        match self {
            Stage::Narration | Stage::Cover => &[],
            Stage::Subtitles | Stage::Mix => &[Stage::Narration],
            Stage::Video => &[Stage::Mix, Stage::Cover],
            Stage::Upload => &[Stage::Video],
            Stage::Localization => &[Stage::Upload],
        }
    }

    /// Whether `self` consumes `other`'s artifact, directly or transitively.
    pub fn depends_on(&self, other: Stage) -> bool {
        self.upstream()
            .iter()
            .any(|up| *up == other || up.depends_on(other))
    }

    /// Stages that consume this stage's artifact, directly or transitively.
    pub fn dependents(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| s.depends_on(*self))
            .collect()
    }

    /// Artifact file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Stage::Narration | Stage::Mix => "wav",
            Stage::Subtitles => "srt",
            Stage::Cover => "png",
            Stage::Video => "mp4",
            Stage::Upload | Stage::Localization => "json",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == lower)
            .ok_or_else(|| {
                let names: Vec<_> = Stage::ALL.iter().map(|s| s.name()).collect();
                format!("Unknown stage '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// Write bytes to `path` through a temporary file in the same directory.
///
/// Readers see either the previous file or the complete new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| FortellError::Io(e.error))?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json)
}

/// Copy a file byte for byte, atomically.
pub fn copy_atomic(from: &Path, to: &Path) -> Result<()> {
    let bytes = std::fs::read(from)?;
    write_atomic(to, &bytes)
}
