//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and credentials are available
//! before starting runs that would otherwise fail midway.

use crate::config::{Settings, VoiceProvider};
use crate::error::{FortellError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Narration requires the voice provider's API key.
    Narrate,
    /// Rendering requires ffmpeg.
    Render,
    /// Publishing requires an upload token.
    Publish,
    /// Localization requires the OpenAI API key.
    Localize,
    /// Status and listing read only the filesystem.
    Inspect,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Narrate => match settings.narration.provider {
            VoiceProvider::OpenAI => check_env("OPENAI_API_KEY", "sk-...")?,
            VoiceProvider::ElevenLabs => check_env("ELEVENLABS_API_KEY", "...")?,
        },
        Operation::Render => {
            check_tool("ffmpeg")?;
        }
        Operation::Publish => {
            check_env(&settings.upload.access_token_env, "ya29...")?;
        }
        Operation::Localize => {
            check_env("OPENAI_API_KEY", "sk-...")?;
        }
        Operation::Inspect => {
            // Reads artifacts only
        }
    }
    Ok(())
}

/// Check that an environment variable holds a value.
fn check_env(name: &str, example: &str) -> Result<()> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(()),
        Ok(_) => Err(FortellError::Config(format!(
            "{} is empty. Set it with: export {}='{}'",
            name, name, example
        ))),
        Err(_) => Err(FortellError::Config(format!(
            "{} not set. Set it with: export {}='{}'",
            name, name, example
        ))),
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(FortellError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(FortellError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(FortellError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
