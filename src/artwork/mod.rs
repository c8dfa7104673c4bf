//! Cover art for story videos.
//!
//! A cover is either supplied by the user as an image next to the story file
//! or generated from a prompt built from the story title.

mod openai;

pub use openai::OpenAIImageGenerator;

use crate::artifacts::write_atomic;
use crate::config::{Prompts, RetrySettings};
use crate::error::{FortellError, Result};
use crate::retry::{with_retry, with_timeout};
use crate::story::StoryDocument;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

/// Image extensions accepted as user-supplied covers, in lookup order.
pub const SUPPLIED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Generates an image from a text prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Encoded image bytes (PNG).
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
}

/// Where a story's cover comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverSource {
    /// An image the user placed next to the story.
    Supplied(PathBuf),
    /// An image to generate from this prompt.
    Generated { prompt: String },
}

/// First existing `<stories_dir>/<id>.{png,jpg,jpeg}`.
pub fn supplied_cover(stories_dir: &Path, story_id: &str) -> Option<PathBuf> {
    SUPPLIED_EXTENSIONS
        .iter()
        .map(|ext| stories_dir.join(format!("{}.{}", story_id, ext)))
        .find(|p| p.is_file())
}

impl CoverSource {
    /// Prefer a supplied cover, else a generated one.
    pub fn resolve(stories_dir: &Path, story: &StoryDocument, prompts: &Prompts) -> Self {
        supplied_cover(stories_dir, &story.id)
            .map(CoverSource::Supplied)
            .unwrap_or_else(|| CoverSource::Generated {
                prompt: prompts.cover_prompt(&story.title),
            })
    }
}

/// Write the cover for `source` to `output`.
///
/// Supplied images are copied as-is, so a JPEG cover keeps its JPEG encoding
/// under the `.png` artifact name. ffmpeg detects the format from the content.
#[instrument(skip(generator, retry), fields(output = %output.display()))]
pub async fn produce_cover(
    source: &CoverSource,
    generator: &dyn ImageGenerator,
    output: &Path,
    retry: &RetrySettings,
    timeout: Duration,
) -> Result<()> {
    let bytes = match source {
        CoverSource::Supplied(path) => {
            info!("Using supplied cover {}", path.display());
            tokio::fs::read(path).await?
        }
        CoverSource::Generated { prompt } => {
            info!("Generating cover image");
            with_retry(retry, "cover generation", || {
                with_timeout(timeout, "cover generation", generator.generate(prompt))
            })
            .await?
        }
    };

    if bytes.is_empty() {
        return Err(FortellError::Artwork("cover image is empty".to_string()));
    }
    write_atomic(output, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{instant_settings, FakeImageGenerator};

    fn story() -> StoryDocument {
        StoryDocument::parse(
            "03-frog-prince",
            "# The Frog Prince\n\nA princess lost her golden ball.",
            Path::new("stories/03-frog-prince.md"),
        )
    }

    #[test]
    fn test_resolve_generated_when_nothing_supplied() {
        let dir = tempfile::tempdir().unwrap();
        let source = CoverSource::resolve(dir.path(), &story(), &Prompts::default());
        match source {
            CoverSource::Generated { prompt } => assert!(prompt.contains("The Frog Prince")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resolve_prefers_supplied_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("03-frog-prince.jpg");
        std::fs::write(&image, b"jpeg").unwrap();

        let source = CoverSource::resolve(dir.path(), &story(), &Prompts::default());
        assert_eq!(source, CoverSource::Supplied(image));
    }

    #[tokio::test]
    async fn test_supplied_cover_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("cover.png");
        std::fs::write(&image, b"png bytes").unwrap();
        let output = dir.path().join("images").join("story.png");
        let generator = FakeImageGenerator::new();

        produce_cover(
            &CoverSource::Supplied(image),
            &generator,
            &output,
            &instant_settings().retry,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"png bytes");
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_supplied_jpeg_keeps_its_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("03-frog-prince.jpeg");
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        std::fs::write(&image, jpeg).unwrap();
        let output = dir.path().join("images").join("03-frog-prince.png");

        let source = CoverSource::resolve(dir.path(), &story(), &Prompts::default());
        produce_cover(
            &source,
            &FakeImageGenerator::new(),
            &output,
            &instant_settings().retry,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), jpeg);
    }

    #[tokio::test]
    async fn test_generated_cover_calls_generator() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("story.png");
        let generator = FakeImageGenerator::new();

        produce_cover(
            &CoverSource::Generated {
                prompt: "a frog".to_string(),
            },
            &generator,
            &output,
            &instant_settings().retry,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(generator.calls(), 1);
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }
}
