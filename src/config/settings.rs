//! Configuration settings for Fortell.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub paths: PathSettings,
    pub narration: NarrationSettings,
    pub mix: MixSettings,
    pub cover: CoverSettings,
    pub video: VideoSettings,
    pub subtitles: SubtitleSettings,
    pub upload: UploadSettings,
    pub localization: LocalizationSettings,
    pub retry: RetrySettings,
    pub timeouts: TimeoutSettings,
    pub batch: BatchSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Workspace directory; relative artifact paths are resolved against it.
    pub workspace_dir: String,
    /// Log level used when no `-v` flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            workspace_dir: ".".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Locations of stories and per-stage artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub stories_dir: String,
    pub narrations_dir: String,
    pub subtitles_dir: String,
    pub mixed_dir: String,
    pub images_dir: String,
    pub videos_dir: String,
    pub uploads_dir: String,
    pub localizations_dir: String,
    /// SQLite database holding synthesized fragments.
    pub cache_path: String,
    /// Optional background music mixed under the narration.
    pub background_music: Option<String>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            stories_dir: "stories".to_string(),
            narrations_dir: "narrations".to_string(),
            subtitles_dir: "subtitles".to_string(),
            mixed_dir: "mixed".to_string(),
            images_dir: "images".to_string(),
            videos_dir: "videos".to_string(),
            uploads_dir: "uploads".to_string(),
            localizations_dir: "localizations".to_string(),
            cache_path: "~/.fortell/fragments.db".to_string(),
            background_music: Some("background/background.m4a".to_string()),
        }
    }
}

/// Voice synthesis provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoiceProvider {
    /// OpenAI speech API (default).
    #[default]
    OpenAI,
    /// ElevenLabs text-to-speech API.
    ElevenLabs,
}

impl std::str::FromStr for VoiceProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(VoiceProvider::OpenAI),
            "elevenlabs" | "eleven" => Ok(VoiceProvider::ElevenLabs),
            _ => Err(format!("Unknown voice provider: {}", s)),
        }
    }
}

impl VoiceProvider {
    /// Speech model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            VoiceProvider::OpenAI => "tts-1",
            VoiceProvider::ElevenLabs => "eleven_multilingual_v2",
        }
    }

    /// Voice used when none is configured.
    pub fn default_voice(&self) -> &'static str {
        match self {
            VoiceProvider::OpenAI => "alloy",
            VoiceProvider::ElevenLabs => "EXAVITQu4vr4xnSDxMaL",
        }
    }
}

impl std::fmt::Display for VoiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceProvider::OpenAI => write!(f, "openai"),
            VoiceProvider::ElevenLabs => write!(f, "elevenlabs"),
        }
    }
}

/// Narration (text-to-speech) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationSettings {
    /// Voice synthesis provider (openai, elevenlabs).
    pub provider: VoiceProvider,
    /// Speech model (e.g. tts-1, or an ElevenLabs model id).
    /// Defaults depend on the provider.
    pub model: Option<String>,
    /// Voice name or id. Defaults depend on the provider.
    pub voice: Option<String>,
    /// Speaking speed multiplier (OpenAI only).
    pub speed: f32,
    /// Maximum characters per synthesis request.
    pub max_segment_chars: usize,
    /// Maximum concurrent synthesis calls for one story.
    pub max_concurrent_segments: usize,
    /// Maximum concurrent synthesis calls across all stories.
    pub max_concurrent_requests: usize,
    /// Cache synthesized fragments between runs.
    pub cache_enabled: bool,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            provider: VoiceProvider::OpenAI,
            model: None,
            voice: None,
            speed: 1.0,
            max_segment_chars: 4000,
            max_concurrent_segments: 3,
            max_concurrent_requests: 4,
            cache_enabled: true,
        }
    }
}

/// Background music mix levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixSettings {
    /// Gain applied to the narration when music is present (dB).
    pub narration_gain_db: f32,
    /// Gain applied to the background music (dB).
    pub background_gain_db: f32,
}

impl NarrationSettings {
    /// Configured model, or the provider's default.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Configured voice, or the provider's default.
    pub fn voice(&self) -> &str {
        self.voice
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.provider.default_voice())
    }
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            narration_gain_db: 5.0,
            background_gain_db: -15.0,
        }
    }
}

/// Cover image generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverSettings {
    /// Image model.
    pub model: String,
    /// Image size (e.g. 1792x1024).
    pub size: String,
    /// Use the HD quality tier.
    pub hd: bool,
}

impl Default for CoverSettings {
    fn default() -> Self {
        Self {
            model: "dall-e-3".to_string(),
            size: "1792x1024".to_string(),
            hd: true,
        }
    }
}

/// Video rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    /// AAC audio bitrate passed to ffmpeg.
    pub audio_bitrate: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            audio_bitrate: "192k".to_string(),
        }
    }
}

/// Subtitle sidecar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleSettings {
    /// Write an SRT file next to each narration.
    pub enabled: bool,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Video platform upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Upload finished videos as part of the pipeline.
    pub enabled: bool,
    /// Environment variable holding the OAuth access token.
    pub access_token_env: String,
    /// Privacy status (public, unlisted, private).
    pub privacy: String,
    pub category_id: String,
    pub default_language: String,
    pub default_audio_language: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Playlist to add uploaded videos to.
    pub playlist_id: Option<String>,
    /// Schedule uploads one per day instead of publishing immediately.
    pub schedule: bool,
    /// Local hour of day for scheduled publishing.
    pub publish_hour: u32,
    /// UTC offset (hours) of the publishing time zone.
    pub utc_offset_hours: i32,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token_env: "YOUTUBE_ACCESS_TOKEN".to_string(),
            privacy: "public".to_string(),
            category_id: "1".to_string(),
            default_language: "zh".to_string(),
            default_audio_language: "zh-Hans".to_string(),
            description: String::new(),
            tags: vec![
                "story".to_string(),
                "bedtime".to_string(),
                "fairy tale".to_string(),
            ],
            playlist_id: None,
            schedule: false,
            publish_hour: 9,
            utc_offset_hours: -8,
        }
    }
}

/// Localized metadata settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizationSettings {
    /// Localize uploaded videos as part of the pipeline.
    pub enabled: bool,
    /// Chat model used for translation.
    pub model: String,
    /// Target locales (e.g. "en").
    pub locales: Vec<String>,
}

impl Default for LocalizationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "gpt-4o-mini".to_string(),
            locales: vec!["en".to_string()],
        }
    }
}

/// Retry policy for external calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per call, including the first.
    pub max_attempts: usize,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Upper bound on a single delay.
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2000,
            max_backoff_ms: 30_000,
        }
    }
}

/// Per-call timeouts (seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub synthesis_secs: u64,
    pub image_secs: u64,
    pub media_secs: u64,
    pub upload_secs: u64,
    pub translation_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            synthesis_secs: 120,
            image_secs: 180,
            media_secs: 900,
            upload_secs: 1800,
            translation_secs: 60,
        }
    }
}

impl TimeoutSettings {
    pub fn synthesis(&self) -> Duration {
        Duration::from_secs(self.synthesis_secs)
    }

    pub fn image(&self) -> Duration {
        Duration::from_secs(self.image_secs)
    }

    pub fn media(&self) -> Duration {
        Duration::from_secs(self.media_secs)
    }

    pub fn upload(&self) -> Duration {
        Duration::from_secs(self.upload_secs)
    }

    pub fn translation(&self) -> Duration {
        Duration::from_secs(self.translation_secs)
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Maximum number of stories processed at once.
    pub max_concurrent_stories: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_concurrent_stories: 2,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::FortellError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fortell")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded workspace directory path.
    pub fn workspace_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.workspace_dir)
    }

    /// Resolve a configured path; relative paths live under the workspace.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let expanded = Self::expand_path(path);
        if expanded.is_absolute() {
            expanded
        } else {
            self.workspace_dir().join(expanded)
        }
    }

    /// Get the expanded fragment cache path.
    pub fn cache_path(&self) -> PathBuf {
        self.resolve(&self.paths.cache_path)
    }

    /// Background music file, if configured.
    pub fn background_music(&self) -> Option<PathBuf> {
        self.paths
            .background_music
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| self.resolve(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let settings = Settings::default();
        let text = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed.narration.max_segment_chars, 4000);
        assert_eq!(parsed.retry.max_attempts, 3);
        assert_eq!(parsed.narration.provider, VoiceProvider::OpenAI);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let parsed: Settings = toml::from_str(
            r#"
            [narration]
            provider = "elevenlabs"
            voice = "EXAVITQu4vr4xnSDxMaL"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(parsed.narration.provider, VoiceProvider::ElevenLabs);
        assert_eq!(parsed.narration.max_segment_chars, 4000);
        assert_eq!(parsed.retry.max_attempts, 5);
        assert_eq!(parsed.retry.initial_backoff_ms, 2000);
        assert_eq!(parsed.mix.background_gain_db, -15.0);
        assert_eq!(parsed.narration.model(), "eleven_multilingual_v2");
        assert_eq!(parsed.general.log_level, "warn");
    }

    #[test]
    fn test_voice_defaults_follow_provider() {
        let parsed: Settings = toml::from_str("[narration]\nprovider = \"elevenlabs\"").unwrap();
        assert_eq!(parsed.narration.model(), "eleven_multilingual_v2");
        assert_eq!(parsed.narration.voice(), "EXAVITQu4vr4xnSDxMaL");

        let defaults = NarrationSettings::default();
        assert_eq!(defaults.model(), "tts-1");
        assert_eq!(defaults.voice(), "alloy");

        let parsed: Settings =
            toml::from_str("[narration]\nprovider = \"openai\"\nvoice = \"nova\"").unwrap();
        assert_eq!(parsed.narration.model(), "tts-1");
        assert_eq!(parsed.narration.voice(), "nova");
    }

    #[test]
    fn test_resolve_relative_to_workspace() {
        let mut settings = Settings::default();
        settings.general.workspace_dir = "/srv/stories".to_string();
        assert_eq!(
            settings.resolve("videos"),
            PathBuf::from("/srv/stories/videos")
        );
        assert_eq!(settings.resolve("/abs/x"), PathBuf::from("/abs/x"));
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("OpenAI".parse::<VoiceProvider>(), Ok(VoiceProvider::OpenAI));
        assert_eq!(
            "elevenlabs".parse::<VoiceProvider>(),
            Ok(VoiceProvider::ElevenLabs)
        );
        assert!("piper".parse::<VoiceProvider>().is_err());
    }
}
