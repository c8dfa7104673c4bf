//! Speech synthesis for story narration.
//!
//! A [`Synthesizer`] turns one piece of text into PCM audio. The
//! [`NarrationSynthesizer`] drives it over all segments of a story with
//! bounded concurrency, per-call timeouts, retries for transient failures
//! and an optional fragment cache, and returns the fragments in segment order.

pub mod cache;
mod elevenlabs;
mod openai;

pub use cache::{fragment_hash, FragmentCache};
pub use elevenlabs::ElevenLabsSynthesizer;
pub use openai::OpenAISynthesizer;

use crate::audio::{AudioFragment, PcmAudio};
use crate::chunking::TextSegment;
use crate::config::{NarrationSettings, RetrySettings, Settings, VoiceProvider};
use crate::error::{FortellError, Result};
use crate::retry::{with_retry, with_timeout};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

/// Sample rate every synthesizer delivers.
pub const SAMPLE_RATE: u32 = 24_000;
/// Channel count every synthesizer delivers.
pub const CHANNELS: u16 = 1;

/// Voice selection passed to a synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    pub provider: VoiceProvider,
    pub model: String,
    pub voice: String,
    pub speed: f32,
}

impl VoiceConfig {
    pub fn from_settings(settings: &NarrationSettings) -> Self {
        Self {
            provider: settings.provider,
            model: settings.model().to_string(),
            voice: settings.voice().to_string(),
            speed: settings.speed,
        }
    }

    /// Everything besides the text that changes the synthesized audio.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.provider, self.model, self.voice, self.speed
        )
    }
}

/// A text-to-speech service.
///
/// Implementations return 16-bit PCM at [`SAMPLE_RATE`] with [`CHANNELS`]
/// channels, and classify failures through [`FortellError::is_retryable`].
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<PcmAudio>;
}

/// Create the configured synthesizer.
pub fn create_synthesizer(settings: &Settings) -> Result<Arc<dyn Synthesizer>> {
    let timeout = settings.timeouts.synthesis();
    Ok(match settings.narration.provider {
        VoiceProvider::OpenAI => Arc::new(OpenAISynthesizer::new(timeout)?),
        VoiceProvider::ElevenLabs => Arc::new(ElevenLabsSynthesizer::from_env(timeout)?),
    })
}

/// Synthesizes every segment of a story.
pub struct NarrationSynthesizer {
    synthesizer: Arc<dyn Synthesizer>,
    cache: Option<Arc<FragmentCache>>,
    voice: VoiceConfig,
    retry: RetrySettings,
    timeout: Duration,
    max_concurrent_segments: usize,
    permits: Arc<Semaphore>,
    show_progress: bool,
}

impl NarrationSynthesizer {
    /// `permits` bounds in-flight calls across every story sharing it.
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        settings: &Settings,
        permits: Arc<Semaphore>,
    ) -> Self {
        Self {
            synthesizer,
            cache: None,
            voice: VoiceConfig::from_settings(&settings.narration),
            retry: settings.retry.clone(),
            timeout: settings.timeouts.synthesis(),
            max_concurrent_segments: settings.narration.max_concurrent_segments.max(1),
            permits,
            show_progress: false,
        }
    }

    pub fn with_cache(mut self, cache: Arc<FragmentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn voice(&self) -> &VoiceConfig {
        &self.voice
    }

    pub fn cache(&self) -> Option<&Arc<FragmentCache>> {
        self.cache.as_ref()
    }

    /// Cache hash of a segment under the current voice.
    pub fn segment_hash(&self, segment: &TextSegment) -> String {
        fragment_hash(&self.voice.fingerprint(), segment.text.trim())
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("  {spinner:.green} Narrating [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Produce one fragment per segment, in segment order.
    ///
    /// Fails as soon as any segment exhausts its retries.
    #[instrument(skip(self, segments), fields(segments = segments.len()))]
    pub async fn synthesize(
        &self,
        story_id: &str,
        segments: &[TextSegment],
    ) -> Result<Vec<AudioFragment>> {
        info!(
            "Synthesizing {} segments with {} ({})",
            segments.len(),
            self.synthesizer.name(),
            self.voice.voice
        );

        let pb = self.progress_bar(segments.len());
        let mut fragments = Vec::with_capacity(segments.len());

        let mut stream = stream::iter(segments)
            .map(|segment| async move {
                let result = self.synthesize_segment(story_id, segment).await;
                (segment.index, result)
            })
            .buffer_unordered(self.max_concurrent_segments);

        while let Some((index, result)) = stream.next().await {
            pb.inc(1);
            match result {
                Ok(audio) => fragments.push(AudioFragment::new(index, audio)),
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(FortellError::Synthesis(format!(
                        "segment {} of '{}': {}",
                        index, story_id, e
                    )));
                }
            }
        }
        pb.finish_and_clear();

        fragments.sort_by_key(|f| f.index);
        Ok(fragments)
    }

    async fn synthesize_segment(&self, story_id: &str, segment: &TextSegment) -> Result<PcmAudio> {
        let text = segment.text.trim();
        let hash = self.segment_hash(segment);

        if let Some(cache) = &self.cache {
            match cache.get(story_id, segment.index, &hash) {
                Ok(Some(audio)) => return Ok(audio),
                Ok(None) => {}
                Err(e) => warn!("Fragment cache lookup failed: {}", e),
            }
        }

        let what = format!("{} segment {}", self.synthesizer.name(), segment.index);
        let audio = with_retry(&self.retry, &what, || async {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| FortellError::Cancelled)?;
            let audio = with_timeout(
                self.timeout,
                &what,
                self.synthesizer.synthesize(text, &self.voice),
            )
            .await?;
            if audio.is_empty() {
                return Err(FortellError::ServiceTransient(format!(
                    "{} returned no audio",
                    what
                )));
            }
            Ok(audio)
        })
        .await?;

        debug!(
            "Segment {} synthesized: {:.1}s",
            segment.index,
            audio.duration_seconds()
        );

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(story_id, segment.index, &hash, &audio) {
                warn!("Failed to cache segment {}: {}", segment.index, e);
            }
        }

        Ok(audio)
    }
}
