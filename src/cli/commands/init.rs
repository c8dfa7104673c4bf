//! Init command - interactive first-run setup.

use crate::artifacts::ArtifactLayout;
use crate::cli::Output;
use crate::config::{Settings, VoiceProvider};
use console::style;
use std::io::{self, Write};

/// Run the init command for first-time setup.
pub fn run_init(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Fortell Setup");
    println!();
    println!("Welcome to Fortell! Let's make sure everything is configured correctly.\n");

    // Step 1: Check prerequisites
    println!("{}", style("Step 1: Checking prerequisites").bold().cyan());
    println!();

    if std::process::Command::new("ffmpeg").arg("-version").output().is_err() {
        Output::warning("ffmpeg is missing. Please install it:");
        println!("    {} {}", style("→").dim(), style(install_hint_ffmpeg()).dim());
        println!();

        if !prompt_continue("Continue anyway?")? {
            println!();
            Output::info("Setup cancelled. Install ffmpeg and run 'fortell init' again.");
            return Ok(());
        }
    } else {
        Output::success("ffmpeg is installed!");
    }

    println!();

    // Step 2: Check API keys
    println!("{}", style("Step 2: Checking API configuration").bold().cyan());
    println!();

    let voice_key = match settings.narration.provider {
        VoiceProvider::OpenAI => "OPENAI_API_KEY",
        VoiceProvider::ElevenLabs => "ELEVENLABS_API_KEY",
    };
    let mut keys = vec![voice_key];
    if voice_key != "OPENAI_API_KEY" {
        keys.push("OPENAI_API_KEY");
    }

    for key in keys {
        if std::env::var(key).is_err() {
            Output::warning(&format!("{} environment variable is not set.", key));
            println!();
            println!("  Set it in your shell configuration (~/.bashrc, ~/.zshrc, etc.):");
            println!("  {}", style(format!("export {}='...'", key)).green());
            println!();

            if !prompt_continue("Continue without it?")? {
                println!();
                Output::info("Setup cancelled. Set your API key and run 'fortell init' again.");
                return Ok(());
            }
        } else {
            Output::success(&format!("{} is configured!", key));
        }
    }

    println!();

    // Step 3: Create directories
    println!("{}", style("Step 3: Setting up the workspace").bold().cyan());
    println!();

    let layout = ArtifactLayout::from_settings(settings);
    let existed = layout.stories_dir.exists();
    layout.create_dirs()?;
    if existed {
        Output::info(&format!("Workspace exists: {}", settings.workspace_dir().display()));
    } else {
        Output::success(&format!(
            "Created workspace directories under {}",
            settings.workspace_dir().display()
        ));
    }
    if let Some(background) = &layout.background {
        if !background.exists() {
            Output::info(&format!(
                "Optional: place background music at {}",
                background.display()
            ));
        }
    }

    println!();

    // Step 4: Create config file
    println!("{}", style("Step 4: Configuration file").bold().cyan());
    println!();

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::info(&format!("Config file exists: {}", config_path.display()));
    } else if prompt_continue("Create default configuration file?")? {
        settings.save_to(&config_path)?;
        Output::success(&format!("Created config file: {}", config_path.display()));
        println!();
        println!("  Edit your config with: {}", style("fortell config edit").green());
    } else {
        Output::info("Skipped config file creation. Using defaults.");
    }

    println!();

    // Summary
    println!("{}", style("Setup Complete!").bold().green());
    println!();
    println!("Next steps:");
    println!(
        "  {} Add stories as markdown files to {}",
        style("*").cyan(),
        layout.stories_dir.display()
    );
    println!("  {} Check system status", style("fortell doctor").cyan());
    println!("  {} Narrate and render one story", style("fortell run <story>").cyan());
    println!("  {} Process every story", style("fortell all").cyan());
    println!();
    println!("For more help: {}", style("fortell --help").cyan());

    Ok(())
}

/// Platform-specific install hint for ffmpeg.
pub(super) fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}

/// Prompt user for yes/no confirmation.
fn prompt_continue(message: &str) -> io::Result<bool> {
    print!("{} {} ", style("?").cyan(), message);
    print!("{} ", style("[y/N]").dim());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let answer = input.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_hint_ffmpeg() {
        assert!(install_hint_ffmpeg().contains("ffmpeg"));
    }
}
