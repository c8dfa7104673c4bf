//! Fortell - Story-to-Video Pipeline
//!
//! A local-first CLI tool that turns markdown stories into narrated videos.
//!
//! The name "Fortell" comes from the Norwegian word for "tell" or "narrate."
//!
//! # Overview
//!
//! For every story Fortell:
//! - Splits the text into segments and synthesizes narration
//! - Times subtitles against the narration
//! - Mixes in optional background music
//! - Generates (or picks up) cover art
//! - Renders a still-image video with ffmpeg
//! - Optionally uploads, schedules and localizes the video on YouTube
//!
//! Every stage writes one artifact per story, and the artifacts on disk are
//! the only record of progress: re-running a story skips whatever is already
//! complete.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `story` - Story loading and markdown cleanup
//! - `chunking` - Splitting story text into synthesis segments
//! - `synthesis` - Text-to-speech providers and the fragment cache
//! - `audio` - PCM handling, WAV I/O, assembly and mixing
//! - `subtitles` - SRT cue timing
//! - `artwork` - Cover art resolution and generation
//! - `media` - ffmpeg decoding and muxing
//! - `publish` - Upload, scheduling and localization
//! - `artifacts` - Stage layout and status derived from the filesystem
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use fortell::config::Settings;
//! use fortell::orchestrator::{Orchestrator, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let report = orchestrator.run_story("07-red-hood", &RunOptions::default()).await;
//!     println!("succeeded: {}", report.succeeded());
//!
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod artwork;
pub mod audio;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod openai;
pub mod orchestrator;
pub mod publish;
pub mod retry;
pub mod story;
pub mod subtitles;
pub mod synthesis;

#[cfg(test)]
mod testing;

pub use error::{FortellError, Result};
