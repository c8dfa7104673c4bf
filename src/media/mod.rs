//! External media tooling: decoding background music and muxing videos.

mod ffmpeg;

pub use ffmpeg::FfmpegTool;

use crate::audio::PcmAudio;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Decodes arbitrary audio files to PCM.
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    /// Decode `path`, resampled to `sample_rate` with `channels` channels.
    async fn decode(&self, path: &Path, sample_rate: u32, channels: u16) -> Result<PcmAudio>;
}

/// Parameters for rendering a still-image video.
#[derive(Debug, Clone, PartialEq)]
pub struct MuxRequest {
    pub image: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub audio_bitrate: String,
    /// Length of the audio, when known, to cap the video length.
    pub duration_seconds: Option<f64>,
}

/// Renders a video from a still image and an audio track.
#[async_trait]
pub trait VideoMuxer: Send + Sync {
    /// Write the video to `request.output`. Nothing is left at that path on failure.
    async fn mux(&self, request: &MuxRequest) -> Result<()>;
}
