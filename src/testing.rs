//! In-process fakes for the external collaborators, shared by unit tests.

use crate::artifacts::write_atomic;
use crate::artwork::ImageGenerator;
use crate::audio::PcmAudio;
use crate::config::{RetrySettings, Settings};
use crate::error::{FortellError, Result};
use crate::media::{AudioDecoder, MuxRequest, VideoMuxer};
use crate::publish::{LocalizedText, Translator, Uploader, VideoMetadata};
use crate::synthesis::{Synthesizer, VoiceConfig, CHANNELS, SAMPLE_RATE};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default settings with zero backoff and no cache or background music.
pub fn instant_settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry = RetrySettings {
        max_attempts: 3,
        initial_backoff_ms: 0,
        max_backoff_ms: 0,
    };
    settings.narration.cache_enabled = false;
    settings.paths.background_music = None;
    settings
}

/// Synthesizer with scripted failures, keyed by the exact text it receives.
#[derive(Default)]
pub struct FakeSynthesizer {
    calls: AtomicUsize,
    per_text: Mutex<HashMap<String, usize>>,
    transient: Mutex<HashMap<String, usize>>,
    silent: Mutex<HashMap<String, usize>>,
    permanent: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, u64>>,
    raise_on_call: Mutex<Option<Arc<AtomicBool>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Audio the fake returns for `text`.
    pub fn audio_for(text: &str) -> PcmAudio {
        let chars = text.chars().count();
        PcmAudio::new(SAMPLE_RATE, CHANNELS, vec![chars as i16; 240 * chars.max(1)])
    }

    pub fn fail_times(&self, text: &str, times: usize) {
        self.transient.lock().unwrap().insert(text.to_string(), times);
    }

    pub fn silent_times(&self, text: &str, times: usize) {
        self.silent.lock().unwrap().insert(text.to_string(), times);
    }

    pub fn fail_permanently(&self, text: &str) {
        self.permanent.lock().unwrap().insert(text.to_string());
    }

    pub fn delay(&self, text: &str, millis: u64) {
        self.delays.lock().unwrap().insert(text.to_string(), millis);
    }

    /// Set `flag` as soon as any call starts.
    pub fn raise_on_call(&self, flag: Arc<AtomicBool>) {
        *self.raise_on_call.lock().unwrap() = Some(flag);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, text: &str) -> usize {
        self.per_text.lock().unwrap().get(text).copied().unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take(map: &Mutex<HashMap<String, usize>>, text: &str) -> bool {
        let mut map = map.lock().unwrap();
        match map.get_mut(text) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn synthesize(&self, text: &str, _voice: &VoiceConfig) -> Result<PcmAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.per_text.lock().unwrap().entry(text.to_string()).or_insert(0) += 1;
        if let Some(flag) = self.raise_on_call.lock().unwrap().as_ref() {
            flag.store(true, Ordering::SeqCst);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().get(text).copied();
        if let Some(millis) = delay {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.permanent.lock().unwrap().contains(text) {
            return Err(FortellError::ServicePermanent("policy rejection".to_string()));
        }
        if Self::take(&self.transient, text) {
            return Err(FortellError::ServiceTransient("503 from fake".to_string()));
        }
        if Self::take(&self.silent, text) {
            return Ok(PcmAudio::new(SAMPLE_RATE, CHANNELS, Vec::new()));
        }
        Ok(Self::audio_for(text))
    }
}

/// Image generator returning a fixed payload.
#[derive(Default)]
pub struct FakeImageGenerator {
    calls: AtomicUsize,
}

impl FakeImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FakeImageGenerator {
    async fn generate(&self, _prompt: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(b"\x89PNG fake cover".to_vec())
    }
}

/// Decoder returning a short constant tone in the requested format.
#[derive(Default)]
pub struct FakeDecoder {
    calls: AtomicUsize,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioDecoder for FakeDecoder {
    async fn decode(&self, path: &Path, sample_rate: u32, channels: u16) -> Result<PcmAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !path.exists() {
            return Err(FortellError::MissingInput(path.display().to_string()));
        }
        let len = (sample_rate as usize / 10) * channels as usize;
        Ok(PcmAudio::new(sample_rate, channels, vec![1000; len]))
    }
}

/// Muxer writing a small placeholder file.
#[derive(Default)]
pub struct FakeMuxer {
    calls: AtomicUsize,
}

impl FakeMuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoMuxer for FakeMuxer {
    async fn mux(&self, request: &MuxRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for input in [&request.image, &request.audio] {
            if !input.exists() {
                return Err(FortellError::MissingInput(input.display().to_string()));
            }
        }
        write_atomic(&request.output, b"fake mp4")
    }
}

/// Uploader recording what it was asked to do.
#[derive(Default)]
pub struct FakeUploader {
    uploads: Mutex<Vec<VideoMetadata>>,
    playlists: Mutex<Vec<(String, String)>>,
    localizations: Mutex<Vec<(String, BTreeMap<String, LocalizedText>)>>,
}

impl FakeUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> Vec<VideoMetadata> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn playlist_adds(&self) -> usize {
        self.playlists.lock().unwrap().len()
    }

    pub fn localization_updates(&self) -> Vec<(String, BTreeMap<String, LocalizedText>)> {
        self.localizations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> Result<String> {
        if !video.exists() {
            return Err(FortellError::MissingInput(video.display().to_string()));
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(metadata.clone());
        Ok(format!("vid-{}", uploads.len()))
    }

    async fn add_to_playlist(&self, video_id: &str, playlist_id: &str) -> Result<()> {
        self.playlists
            .lock()
            .unwrap()
            .push((video_id.to_string(), playlist_id.to_string()));
        Ok(())
    }

    async fn update_localizations(
        &self,
        video_id: &str,
        localizations: &BTreeMap<String, LocalizedText>,
    ) -> Result<()> {
        self.localizations
            .lock()
            .unwrap()
            .push((video_id.to_string(), localizations.clone()));
        Ok(())
    }

    fn video_url(&self, video_id: &str) -> String {
        format!("https://example.test/{}", video_id)
    }
}

/// Translator that tags the title with the locale.
#[derive(Default)]
pub struct FakeTranslator {
    calls: AtomicUsize,
}

impl FakeTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn localize(&self, title: &str, locale: &str) -> Result<LocalizedText> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LocalizedText {
            title: format!("[{}] {}", locale, title),
            description: format!("{} ({})", title, locale),
        })
    }
}
