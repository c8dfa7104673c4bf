//! ffmpeg-backed decoding and muxing.

use super::{AudioDecoder, MuxRequest, VideoMuxer};
use crate::audio::PcmAudio;
use crate::error::{FortellError, Result};
use crate::retry::with_timeout;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Runs the `ffmpeg` binary found on `PATH`.
pub struct FfmpegTool {
    binary: String,
    timeout: Duration,
}

impl FfmpegTool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            timeout,
        }
    }

    /// Use a specific ffmpeg binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run(&self, args: Vec<OsString>, capture_stdout: bool) -> Result<Output> {
        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(if capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = with_timeout(self.timeout, "ffmpeg", async {
            command.output().await.map_err(FortellError::Io)
        })
        .await;

        let output = match result {
            Ok(o) => o,
            Err(FortellError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FortellError::ToolNotFound(self.binary.clone()));
            }
            Err(e) => return Err(e),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FortellError::ToolFailed(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

/// Arguments decoding `path` to raw s16le PCM on stdout.
fn decode_args(path: &Path, sample_rate: u32, channels: u16) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-i"].into_iter().map(OsString::from).collect();
    args.push(path.as_os_str().to_owned());
    for arg in [
        "-vn".to_string(),
        "-f".to_string(),
        "s16le".to_string(),
        "-acodec".to_string(),
        "pcm_s16le".to_string(),
        "-ac".to_string(),
        channels.to_string(),
        "-ar".to_string(),
        sample_rate.to_string(),
        "-".to_string(),
    ] {
        args.push(arg.into());
    }
    args
}

/// Arguments rendering a looped still image over an audio track.
fn mux_args(request: &MuxRequest, output: &Path) -> Vec<OsString> {
    let (w, h) = (request.width, request.height);
    let filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2"
    );

    let mut args: Vec<OsString> = ["-y", "-v", "error", "-loop", "1", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(request.image.as_os_str().to_owned());
    args.push("-i".into());
    args.push(request.audio.as_os_str().to_owned());
    for arg in [
        "-c:v",
        "libx264",
        "-tune",
        "stillimage",
        "-c:a",
        "aac",
        "-b:a",
        request.audio_bitrate.as_str(),
        "-pix_fmt",
        "yuv420p",
        "-vf",
        filter.as_str(),
        "-shortest",
    ] {
        args.push(arg.into());
    }
    if let Some(duration) = request.duration_seconds {
        args.push("-t".into());
        args.push(format!("{:.3}", duration).into());
    }
    args.push("-f".into());
    args.push("mp4".into());
    args.push(output.as_os_str().to_owned());
    args
}

#[async_trait]
impl AudioDecoder for FfmpegTool {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn decode(&self, path: &Path, sample_rate: u32, channels: u16) -> Result<PcmAudio> {
        if !path.exists() {
            return Err(FortellError::MissingInput(format!(
                "audio file {}",
                path.display()
            )));
        }

        let output = self
            .run(decode_args(path, sample_rate, channels), true)
            .await?;
        let audio = PcmAudio::from_le_bytes(&output.stdout, sample_rate, channels)?;
        debug!("Decoded {:.1}s of audio", audio.duration_seconds());
        Ok(audio)
    }
}

#[async_trait]
impl VideoMuxer for FfmpegTool {
    #[instrument(skip(self, request), fields(output = %request.output.display()))]
    async fn mux(&self, request: &MuxRequest) -> Result<()> {
        for input in [&request.image, &request.audio] {
            if !input.exists() {
                return Err(FortellError::MissingInput(format!(
                    "mux input {}",
                    input.display()
                )));
            }
        }

        let dir = request
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        // Render next to the target; the temp path is removed on drop if we bail out.
        let tmp = tempfile::Builder::new()
            .prefix(".render-")
            .suffix(".mp4")
            .tempfile_in(dir)?
            .into_temp_path();

        info!("Rendering video {}x{}", request.width, request.height);
        self.run(mux_args(request, &tmp), false).await?;

        tmp.persist(&request.output)
            .map_err(|e| FortellError::Io(e.error))?;
        Ok(())
    }
}
