//! Pipeline orchestrator for Fortell.
//!
//! Runs the stages of a story in order, deciding from the artifacts on disk
//! which ones still need work, and runs batches of stories concurrently.

use crate::artifacts::{
    self, copy_atomic, write_atomic, write_json_atomic, ArtifactLayout, Stage, StageStatus,
};
use crate::artwork::{produce_cover, CoverSource, ImageGenerator, OpenAIImageGenerator};
use crate::audio::{self, wav};
use crate::chunking::ChunkSplitter;
use crate::config::{Prompts, Settings};
use crate::error::{FortellError, Result};
use crate::media::{AudioDecoder, FfmpegTool, MuxRequest, VideoMuxer};
use crate::publish::{
    publish_slot, LocalizationRecord, OpenAITranslator, Translator, UploadReceipt, Uploader,
    VideoMetadata, YoutubeUploader,
};
use crate::retry::{with_retry, with_timeout};
use crate::story::StoryDocument;
use crate::subtitles::{self, SegmentTiming};
use crate::synthesis::{create_synthesizer, FragmentCache, NarrationSynthesizer, Synthesizer};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

/// Narration and fragment durations may differ by this much before
/// subtitles fall back to whole-track timing.
const TIMING_TOLERANCE_SECS: f64 = 0.5;

/// What to run for each story.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Re-run stages even when their artifacts are complete.
    pub force: bool,
    /// Include the upload stage.
    pub upload: bool,
    /// Include the localization stage.
    pub localize: bool,
    /// Run only this stage.
    pub only: Option<Stage>,
}

/// Result of one stage in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Artifact was already complete.
    Skipped,
    Completed,
    Failed(String),
    /// An earlier stage failed.
    NotAttempted,
    Cancelled,
}

impl StageOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            StageOutcome::Skipped => "skipped",
            StageOutcome::Completed => "completed",
            StageOutcome::Failed(_) => "failed",
            StageOutcome::NotAttempted => "not attempted",
            StageOutcome::Cancelled => "cancelled",
        }
    }
}

/// Outcome of every planned stage for one story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryReport {
    pub story_id: String,
    pub stages: Vec<(Stage, StageOutcome)>,
}

impl StoryReport {
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, outcome)| outcome)
    }

    /// First failed stage and its cause.
    pub fn failure(&self) -> Option<(Stage, &str)> {
        self.stages.iter().find_map(|(stage, outcome)| match outcome {
            StageOutcome::Failed(cause) => Some((*stage, cause.as_str())),
            _ => None,
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.stages
            .iter()
            .any(|(_, o)| matches!(o, StageOutcome::Cancelled))
    }

    /// No stage failed or was cancelled.
    pub fn succeeded(&self) -> bool {
        self.failure().is_none() && !self.is_cancelled()
    }

    /// Every stage was already complete.
    pub fn all_skipped(&self) -> bool {
        self.stages
            .iter()
            .all(|(_, o)| matches!(o, StageOutcome::Skipped))
    }
}

/// Reports of a batch run, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub stories: Vec<StoryReport>,
}

impl BatchReport {
    pub fn failed(&self) -> Vec<&StoryReport> {
        self.stories.iter().filter(|r| r.failure().is_some()).collect()
    }

    pub fn cancelled(&self) -> Vec<&StoryReport> {
        self.stories
            .iter()
            .filter(|r| r.failure().is_none() && r.is_cancelled())
            .collect()
    }

    pub fn succeeded(&self) -> bool {
        self.stories.iter().all(StoryReport::succeeded)
    }
}

/// External collaborators used by the pipeline.
pub struct Components {
    pub synthesizer: Arc<dyn Synthesizer>,
    pub images: Arc<dyn ImageGenerator>,
    pub decoder: Arc<dyn AudioDecoder>,
    pub muxer: Arc<dyn VideoMuxer>,
    pub uploader: Option<Arc<dyn Uploader>>,
    pub translator: Option<Arc<dyn Translator>>,
    pub cache: Option<Arc<FragmentCache>>,
}

/// The main orchestrator for the Fortell pipeline.
pub struct Orchestrator {
    settings: Settings,
    layout: ArtifactLayout,
    prompts: Prompts,
    splitter: ChunkSplitter,
    narrator: NarrationSynthesizer,
    images: Arc<dyn ImageGenerator>,
    decoder: Arc<dyn AudioDecoder>,
    muxer: Arc<dyn VideoMuxer>,
    uploader: Option<Arc<dyn Uploader>>,
    translator: Option<Arc<dyn Translator>>,
    cancel: Arc<AtomicBool>,
    show_progress: bool,
}

impl Orchestrator {
    /// Create an orchestrator with the production collaborators.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let synthesizer = create_synthesizer(&settings)?;
        let images = Arc::new(OpenAIImageGenerator::new(
            settings.cover.clone(),
            settings.timeouts.image(),
        )?);
        let ffmpeg = Arc::new(FfmpegTool::new(settings.timeouts.media()));

        let uploader: Option<Arc<dyn Uploader>> =
            match YoutubeUploader::from_env(&settings.upload, settings.timeouts.upload()) {
                Ok(u) => Some(Arc::new(u)),
                Err(e) => {
                    info!("Uploads unavailable: {}", e);
                    None
                }
            };
        let translator: Arc<dyn Translator> = Arc::new(OpenAITranslator::new(
            &settings.localization.model,
            prompts.clone(),
            settings.timeouts.translation(),
        )?);

        let cache = if settings.narration.cache_enabled {
            Some(Arc::new(FragmentCache::open(&settings.cache_path())?))
        } else {
            None
        };

        let components = Components {
            synthesizer,
            images,
            decoder: ffmpeg.clone(),
            muxer: ffmpeg,
            uploader,
            translator: Some(translator),
            cache,
        };
        Ok(Self::with_components(settings, prompts, components)?.with_progress(true))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        components: Components,
    ) -> Result<Self> {
        let splitter = ChunkSplitter::new(settings.narration.max_segment_chars)?;
        let permits = Arc::new(Semaphore::new(
            settings.narration.max_concurrent_requests.max(1),
        ));
        let mut narrator = NarrationSynthesizer::new(components.synthesizer, &settings, permits);
        if let Some(cache) = components.cache {
            narrator = narrator.with_cache(cache);
        }

        Ok(Self {
            layout: ArtifactLayout::from_settings(&settings),
            settings,
            prompts,
            splitter,
            narrator,
            images: components.images,
            decoder: components.decoder,
            muxer: components.muxer,
            uploader: components.uploader,
            translator: components.translator,
            cancel: Arc::new(AtomicBool::new(false)),
            show_progress: false,
        })
    }

    /// Print per-stage progress and synthesis progress bars.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self.narrator = self.narrator.with_progress(show);
        self
    }

    /// Share a cancellation flag; once set, stories stop after their current stage.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Identifiers of every story in the stories directory.
    pub fn story_ids(&self) -> Result<Vec<String>> {
        crate::story::list_stories(&self.layout.stories_dir)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Stages a run covers, in order.
    pub fn plan(&self, options: &RunOptions) -> Vec<Stage> {
        if let Some(stage) = options.only {
            return vec![stage];
        }
        Stage::ALL
            .into_iter()
            .filter(|stage| match stage {
                Stage::Subtitles => self.settings.subtitles.enabled,
                Stage::Upload => options.upload,
                Stage::Localization => options.localize,
                _ => true,
            })
            .collect()
    }

    /// Run the planned stages of one story.
    pub async fn run_story(&self, story_id: &str, options: &RunOptions) -> StoryReport {
        self.run_story_at(story_id, options, None).await
    }

    /// Run many stories, up to `batch.max_concurrent_stories` at once.
    ///
    /// One story failing does not stop the others. With scheduling enabled,
    /// each story gets its own daily publish slot in input order.
    pub async fn run_batch(&self, story_ids: &[String], options: &RunOptions) -> BatchReport {
        let now = Utc::now();
        let concurrency = self.settings.batch.max_concurrent_stories.max(1);

        let mut reports: Vec<(usize, StoryReport)> = stream::iter(story_ids.iter().enumerate())
            .map(|(slot, id)| async move {
                let report = match self.publish_time(slot as u32, now, options) {
                    Ok(publish_at) => self.run_story_at(id, options, publish_at).await,
                    Err(e) => self.failed_report(id, options, e),
                };
                (slot, report)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        reports.sort_by_key(|(slot, _)| *slot);
        BatchReport {
            stories: reports.into_iter().map(|(_, r)| r).collect(),
        }
    }

    fn publish_time(
        &self,
        slot: u32,
        now: DateTime<Utc>,
        options: &RunOptions,
    ) -> Result<Option<DateTime<Utc>>> {
        let upload = &self.settings.upload;
        let uploading = options.upload || options.only == Some(Stage::Upload);
        if !(uploading && upload.schedule) {
            return Ok(None);
        }
        publish_slot(slot, now, upload.publish_hour, upload.utc_offset_hours).map(Some)
    }

    fn failed_report(&self, story_id: &str, options: &RunOptions, err: FortellError) -> StoryReport {
        let mut stages = Vec::new();
        for (i, stage) in self.plan(options).into_iter().enumerate() {
            let outcome = if i == 0 {
                StageOutcome::Failed(err.to_string())
            } else {
                StageOutcome::NotAttempted
            };
            stages.push((stage, outcome));
        }
        StoryReport {
            story_id: story_id.to_string(),
            stages,
        }
    }

    #[instrument(skip(self, options, publish_at))]
    async fn run_story_at(
        &self,
        story_id: &str,
        options: &RunOptions,
        publish_at: Option<DateTime<Utc>>,
    ) -> StoryReport {
        let story = match StoryDocument::load(&self.layout.story_path(story_id)) {
            Ok(story) => story,
            Err(e) => {
                error!("Cannot load story {}: {}", story_id, e);
                return self.failed_report(story_id, options, e);
            }
        };

        let publish_at = match publish_at {
            Some(at) => Some(at),
            None => match self.publish_time(0, Utc::now(), options) {
                Ok(at) => at,
                Err(e) => return self.failed_report(story_id, options, e),
            },
        };

        let mut stages = Vec::new();
        let mut dirty: HashSet<Stage> = HashSet::new();
        let mut halted = false;

        for stage in self.plan(options) {
            if halted {
                stages.push((stage, StageOutcome::NotAttempted));
                continue;
            }
            if self.is_cancelled() {
                stages.push((stage, StageOutcome::Cancelled));
                continue;
            }

            // Recomputed before every decision; earlier stages may have just written.
            let status = artifacts::evaluate(&self.layout, story_id);
            let current = status.status(stage);
            if !options.force && !dirty.contains(&stage) && current == StageStatus::Complete {
                stages.push((stage, StageOutcome::Skipped));
                continue;
            }

            let missing: Vec<Stage> = stage
                .upstream()
                .iter()
                .copied()
                .filter(|up| status.status(*up) != StageStatus::Complete)
                .collect();
            if !missing.is_empty() {
                let names: Vec<_> = missing.iter().map(|s| s.name()).collect();
                let err = FortellError::MissingInput(format!(
                    "{} needs complete {} for '{}'",
                    stage,
                    names.join(", "),
                    story_id
                ));
                warn!("{}", err);
                stages.push((stage, StageOutcome::Failed(err.to_string())));
                halted = true;
                continue;
            }

            if self.show_progress {
                eprintln!("  [{}] {}...", story_id, stage);
            }
            match self.run_stage(stage, &story, publish_at).await {
                Ok(()) => {
                    info!("Stage {} complete for {}", stage, story_id);
                    dirty.extend(stage.dependents());
                    stages.push((stage, StageOutcome::Completed));
                }
                Err(e) => {
                    error!("Stage {} failed for {}: {}", stage, story_id, e);
                    stages.push((stage, StageOutcome::Failed(e.to_string())));
                    halted = true;
                }
            }
        }

        StoryReport {
            story_id: story_id.to_string(),
            stages,
        }
    }

    async fn run_stage(
        &self,
        stage: Stage,
        story: &StoryDocument,
        publish_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        match stage {
            Stage::Narration => self.narrate(story).await,
            Stage::Subtitles => self.write_subtitles(story),
            Stage::Mix => self.mix(story).await,
            Stage::Cover => self.cover(story).await,
            Stage::Video => self.render(story).await,
            Stage::Upload => self.upload(story, publish_at).await,
            Stage::Localization => self.localize(story).await,
        }
    }

    #[instrument(skip(self, story), fields(story = %story.id))]
    async fn narrate(&self, story: &StoryDocument) -> Result<()> {
        let segments = self.splitter.split(&story.body);
        if segments.is_empty() {
            return Err(FortellError::MissingInput(format!(
                "story '{}' has nothing to narrate",
                story.id
            )));
        }
        info!("Narrating {} in {} segments", story.id, segments.len());

        let fragments = self.narrator.synthesize(&story.id, &segments).await?;
        let track = audio::concatenate(fragments)?;
        let path = self.layout.artifact_path(Stage::Narration, &story.id);
        wav::write_wav_atomic(&path, &track)?;

        info!("Narration written: {:.1}s", track.duration_seconds());
        Ok(())
    }

    #[instrument(skip(self, story), fields(story = %story.id))]
    fn write_subtitles(&self, story: &StoryDocument) -> Result<()> {
        let narration = self.layout.artifact_path(Stage::Narration, &story.id);
        let total = wav::probe(&narration)?.duration_seconds();

        let cues = match self.segment_timings(story) {
            Some(timings)
                if (timings.iter().map(|t| t.duration).sum::<f64>() - total).abs()
                    <= TIMING_TOLERANCE_SECS =>
            {
                subtitles::cues_for_segments(&timings)
            }
            _ => subtitles::cues_for_text(&story.body, total),
        };

        let path = self.layout.artifact_path(Stage::Subtitles, &story.id);
        write_atomic(&path, subtitles::render_srt(&cues).as_bytes())
    }

    /// Per-segment durations, when every segment is in the fragment cache.
    fn segment_timings(&self, story: &StoryDocument) -> Option<Vec<SegmentTiming>> {
        let cache = self.narrator.cache()?;
        self.splitter
            .split(&story.body)
            .iter()
            .map(|segment| {
                let hash = self.narrator.segment_hash(segment);
                let duration = cache.duration(&story.id, segment.index, &hash).ok()??;
                Some(SegmentTiming {
                    text: segment.text.clone(),
                    duration,
                })
            })
            .collect()
    }

    #[instrument(skip(self, story), fields(story = %story.id))]
    async fn mix(&self, story: &StoryDocument) -> Result<()> {
        let narration_path = self.layout.artifact_path(Stage::Narration, &story.id);
        let mixed_path = self.layout.artifact_path(Stage::Mix, &story.id);

        let Some(background_path) = self.layout.existing_background() else {
            if let Some(configured) = &self.layout.background {
                warn!("Background music {} not found, skipping mix", configured.display());
            }
            return copy_atomic(&narration_path, &mixed_path);
        };

        let narration = wav::read_wav(&narration_path)?;
        let background = self
            .decoder
            .decode(background_path, narration.sample_rate, narration.channels)
            .await?;
        if background.is_empty() {
            warn!("Background music {} is empty, skipping mix", background_path.display());
            return copy_atomic(&narration_path, &mixed_path);
        }

        let mixed = audio::mix_background(&narration, &background, &self.settings.mix)?;
        wav::write_wav_atomic(&mixed_path, &mixed)
    }

    #[instrument(skip(self, story), fields(story = %story.id))]
    async fn cover(&self, story: &StoryDocument) -> Result<()> {
        let source = CoverSource::resolve(&self.layout.stories_dir, story, &self.prompts);
        let path = self.layout.artifact_path(Stage::Cover, &story.id);
        produce_cover(
            &source,
            self.images.as_ref(),
            &path,
            &self.settings.retry,
            self.settings.timeouts.image(),
        )
        .await
    }

    #[instrument(skip(self, story), fields(story = %story.id))]
    async fn render(&self, story: &StoryDocument) -> Result<()> {
        let audio = self.layout.artifact_path(Stage::Mix, &story.id);
        let video = &self.settings.video;
        let request = MuxRequest {
            image: self.layout.artifact_path(Stage::Cover, &story.id),
            duration_seconds: wav::probe(&audio).ok().map(|i| i.duration_seconds()),
            audio,
            output: self.layout.artifact_path(Stage::Video, &story.id),
            width: video.width,
            height: video.height,
            audio_bitrate: video.audio_bitrate.clone(),
        };
        self.muxer.mux(&request).await
    }

    fn uploader(&self) -> Result<&Arc<dyn Uploader>> {
        self.uploader.as_ref().ok_or_else(|| {
            FortellError::Config(format!(
                "uploading requires {} to hold an access token",
                self.settings.upload.access_token_env
            ))
        })
    }

    #[instrument(skip(self, story), fields(story = %story.id))]
    async fn upload(&self, story: &StoryDocument, publish_at: Option<DateTime<Utc>>) -> Result<()> {
        let uploader = self.uploader()?;
        let settings = &self.settings.upload;
        let video = self.layout.artifact_path(Stage::Video, &story.id);
        let metadata = VideoMetadata::for_story(&story.display_name(), settings, publish_at);

        // Not retried: a retry after an unseen success would publish twice.
        let video_id = with_timeout(
            self.settings.timeouts.upload(),
            "video upload",
            uploader.upload(&video, &metadata),
        )
        .await?;
        info!("Uploaded {} as {}", story.id, video_id);

        let mut playlist_id = None;
        if let Some(playlist) = &settings.playlist_id {
            match uploader.add_to_playlist(&video_id, playlist).await {
                Ok(()) => playlist_id = Some(playlist.clone()),
                Err(e) => warn!("Could not add {} to playlist {}: {}", video_id, playlist, e),
            }
        }

        let receipt = UploadReceipt {
            url: uploader.video_url(&video_id),
            video_id,
            title: metadata.title,
            privacy: metadata.privacy,
            publish_at,
            playlist_id,
            uploaded_at: Utc::now(),
        };
        write_json_atomic(&self.layout.artifact_path(Stage::Upload, &story.id), &receipt)
    }

    #[instrument(skip(self, story), fields(story = %story.id))]
    async fn localize(&self, story: &StoryDocument) -> Result<()> {
        let uploader = self.uploader()?;
        let translator = self.translator.as_ref().ok_or_else(|| {
            FortellError::Config("no translator configured".to_string())
        })?;

        let receipt_path = self.layout.artifact_path(Stage::Upload, &story.id);
        let receipt: UploadReceipt = serde_json::from_slice(&std::fs::read(&receipt_path)?)?;

        let timeout = self.settings.timeouts.translation();
        let mut localizations = BTreeMap::new();
        for locale in &self.settings.localization.locales {
            let text = with_retry(&self.settings.retry, "translation", || {
                with_timeout(timeout, "translation", translator.localize(&receipt.title, locale))
            })
            .await?;
            localizations.insert(locale.clone(), text);
        }

        with_timeout(
            self.settings.timeouts.upload(),
            "localization update",
            uploader.update_localizations(&receipt.video_id, &localizations),
        )
        .await?;

        let record = LocalizationRecord {
            video_id: receipt.video_id,
            localizations,
            localized_at: Utc::now(),
        };
        write_json_atomic(
            &self.layout.artifact_path(Stage::Localization, &story.id),
            &record,
        )
    }
}
