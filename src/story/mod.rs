//! Story documents.
//!
//! A story is a markdown file in the stories directory. Its file stem is the
//! story identifier used to correlate every artifact produced for it.

use crate::error::{FortellError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static HEADING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+ .*$").expect("valid heading regex"));
static HEADING_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s*\**\s*(.+?)\s*\**\s*$").expect("valid title regex"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank-run regex"));
static ORDINAL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[-_]").expect("valid prefix regex"));

/// A loaded story. Immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryDocument {
    /// Identifier derived from the file name.
    pub id: String,
    /// First markdown heading, or the identifier when there is none.
    pub title: String,
    /// Narratable body with markdown stripped.
    pub body: String,
    /// File the story was read from.
    pub path: PathBuf,
}

impl StoryDocument {
    /// Read and clean a story file.
    pub fn load(path: &Path) -> Result<Self> {
        let id = story_id(path)?;
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FortellError::MissingInput(format!("story '{}' ({}): {}", id, path.display(), e))
        })?;
        debug!("Loaded story {} ({} bytes)", id, raw.len());
        Ok(Self::parse(&id, &raw, path))
    }

    /// Build a story from markdown text.
    pub fn parse(id: &str, markdown: &str, path: &Path) -> Self {
        Self {
            id: id.to_string(),
            title: extract_title(markdown).unwrap_or_else(|| id.to_string()),
            body: clean_markdown(markdown),
            path: path.to_path_buf(),
        }
    }

    /// Identifier without a leading ordinal such as `07-`.
    pub fn display_name(&self) -> String {
        display_name(&self.id)
    }
}

/// Derive the story identifier from a file path.
pub fn story_id(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| FortellError::Story(format!("Invalid story path: {}", path.display())))
}

/// Strip a leading ordinal prefix (`07-Name` or `07_Name`).
pub fn display_name(id: &str) -> String {
    ORDINAL_PREFIX.replace(id, "").into_owned()
}

/// Remove headings and emphasis markers, collapse blank runs, trim.
pub fn clean_markdown(markdown: &str) -> String {
    let normalized = markdown.replace("\r\n", "\n");
    let text = HEADING_LINE.replace_all(&normalized, "");
    let text = text.replace("**", "");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// First markdown heading with emphasis markers removed.
pub fn extract_title(markdown: &str) -> Option<String> {
    markdown.lines().find_map(|line| {
        HEADING_TITLE
            .captures(line.trim_end())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim_matches('*').trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Sorted identifiers of all `*.md` stories in a directory.
pub fn list_stories(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "md") {
            ids.push(story_id(&path)?);
        }
    }
    ids.sort();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# **Little Red Riding Hood**\n\nOnce upon a time there was a **little** girl.\n\n\n\nShe lived near the woods.\n";

    #[test]
    fn test_parse_story() {
        let story = StoryDocument::parse("07-red-hood", SAMPLE, Path::new("stories/07-red-hood.md"));
        assert_eq!(story.title, "Little Red Riding Hood");
        assert_eq!(
            story.body,
            "Once upon a time there was a little girl.\n\nShe lived near the woods."
        );
        assert_eq!(story.display_name(), "red-hood");
    }

    #[test]
    fn test_title_falls_back_to_id() {
        let story = StoryDocument::parse("plain", "Just text.", Path::new("plain.md"));
        assert_eq!(story.title, "plain");
        assert_eq!(story.body, "Just text.");
    }

    #[test]
    fn test_body_has_no_surrounding_whitespace() {
        let story = StoryDocument::parse("s", "\n\n  # T\n\n  text  \n\n", Path::new("s.md"));
        assert_eq!(story.body, story.body.trim());
    }

    #[test]
    fn test_display_name_keeps_unprefixed_ids() {
        assert_eq!(display_name("12_snow-white"), "snow-white");
        assert_eq!(display_name("snow-white"), "snow-white");
        assert_eq!(display_name("格林童话-07-小红帽"), "格林童话-07-小红帽");
    }

    #[test]
    fn test_list_stories_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let ids = list_stories(dir.path()).unwrap();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_load_missing_story() {
        let err = StoryDocument::load(Path::new("/nonexistent/story.md")).unwrap_err();
        assert!(matches!(err, FortellError::MissingInput(_)));
    }
}
