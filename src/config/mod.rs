//! Configuration module for Fortell.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{CoverPrompts, LocalizationPrompts, Prompts};
pub use settings::{
    BatchSettings, CoverSettings, GeneralSettings, LocalizationSettings, MixSettings,
    NarrationSettings, PathSettings, PromptSettings, RetrySettings, Settings, SubtitleSettings,
    TimeoutSettings, UploadSettings, VideoSettings, VoiceProvider,
};
