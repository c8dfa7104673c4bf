//! CLI module for Fortell.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::artifacts::Stage;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fortell - Story-to-Video Pipeline
///
/// Turns markdown stories into narrated videos with subtitles, background
/// music and cover art, and optionally publishes them.
/// The name "Fortell" comes from the Norwegian word for "tell."
#[derive(Parser, Debug)]
#[command(name = "fortell")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "FORTELL_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter directive; `-v` flags override the configured level.
    pub fn log_filter(&self, configured: &str) -> String {
        let level = match self.verbose {
            0 if configured.is_empty() => "warn",
            0 => configured,
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        format!("fortell={}", level)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the workspace and verify system requirements
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// List known stories
    List,

    /// Show the stage status of every story
    Status,

    /// Run the full pipeline for one story
    Run {
        /// Story identifier (file name without .md) or path to the story file
        story: String,

        /// Re-run stages even when their artifacts are complete
        #[arg(short, long)]
        force: bool,

        /// Upload the finished video
        #[arg(long)]
        upload: bool,

        /// Localize the uploaded video's title and description
        #[arg(long)]
        localize: bool,
    },

    /// Run a single stage for one story, or for all stories
    Stage {
        /// Stage to run (narration, subtitles, mix, cover, video, upload, localization)
        stage: Stage,

        /// Story identifier (all stories when omitted)
        story: Option<String>,

        /// Re-run the stage even when its artifact is complete
        #[arg(short, long)]
        force: bool,
    },

    /// Run the pipeline for every story
    All {
        /// Re-run stages even when their artifacts are complete
        #[arg(short, long)]
        force: bool,

        /// Upload the finished videos
        #[arg(long)]
        upload: bool,

        /// Localize the uploaded videos
        #[arg(long)]
        localize: bool,

        /// Maximum number of stories processed at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

/// Watch for interrupts: the first sets `cancel`, a second one returns
/// `true` so the caller can abort outright.
pub async fn watch_interrupts<F, Fut>(mut interrupt: F, cancel: Arc<AtomicBool>) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    Output::warning("Interrupted, finishing in-flight stages (Ctrl-C again to abort)...");
    cancel.store(true, Ordering::SeqCst);
    interrupt().await.is_ok()
}
