//! Fortell CLI entry point.

use anyhow::Result;
use clap::Parser;
use fortell::cli::{commands, watch_interrupts, Cli, Commands, Output};
use fortell::config::Settings;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| cli.log_filter(&settings.general.log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Stop stories after their in-flight stage on Ctrl-C
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if watch_interrupts(tokio::signal::ctrl_c, cancel).await {
                Output::error("Aborted.");
                std::process::exit(130);
            }
        });
    }

    // Execute command
    match &cli.command {
        Commands::Init => {
            commands::run_init(&settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::List => {
            commands::run_list(&settings)?;
        }

        Commands::Status => {
            commands::run_status(&settings)?;
        }

        Commands::Run {
            story,
            force,
            upload,
            localize,
        } => {
            commands::run_story(story, *force, *upload, *localize, settings, cancel).await?;
        }

        Commands::Stage {
            stage,
            story,
            force,
        } => {
            commands::run_stage(*stage, story.as_deref(), *force, settings, cancel).await?;
        }

        Commands::All {
            force,
            upload,
            localize,
            concurrency,
        } => {
            commands::run_all(*force, *upload, *localize, *concurrency, settings, cancel).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
