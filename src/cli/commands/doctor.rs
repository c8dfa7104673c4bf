//! Doctor command - verify system requirements and configuration.

use super::init::install_hint_ffmpeg;
use crate::artifacts::ArtifactLayout;
use crate::cli::Output;
use crate::config::{Settings, VoiceProvider};
use crate::story::list_stories;
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Fortell Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    let sections: [(&str, Vec<CheckResult>); 4] = [
        ("External Tools", vec![check_ffmpeg()]),
        ("API Configuration", check_api_keys(settings)),
        ("Workspace", check_workspace(settings)),
        ("Configuration", vec![check_config_file()]),
    ];
    for (title, results) in sections {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        checks.extend(results);
        println!();
    }

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Fortell.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Fortell is ready to use.");
    }

    Ok(())
}

/// Check that ffmpeg is available.
fn check_ffmpeg() -> CheckResult {
    match Command::new("ffmpeg").arg("-version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::ok("ffmpeg", &truncate(&version, 50))
        }
        Ok(_) => CheckResult::error("ffmpeg", "installed but not working", install_hint_ffmpeg()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error("ffmpeg", "not found", install_hint_ffmpeg())
        }
        Err(e) => CheckResult::error("ffmpeg", &format!("error: {}", e), install_hint_ffmpeg()),
    }
}

/// Check the environment variables holding API credentials.
fn check_api_keys(settings: &Settings) -> Vec<CheckResult> {
    let mut results = vec![check_env_key(
        "OPENAI_API_KEY",
        settings.narration.provider == VoiceProvider::OpenAI,
        "needed for covers and localization",
    )];

    if settings.narration.provider == VoiceProvider::ElevenLabs {
        results.push(check_env_key("ELEVENLABS_API_KEY", true, ""));
    }

    let token = &settings.upload.access_token_env;
    results.push(check_env_key(
        token,
        settings.upload.enabled,
        "needed only for uploads",
    ));

    results
}

fn check_env_key(name: &str, required: bool, optional_note: &str) -> CheckResult {
    match std::env::var(name) {
        Ok(key) if !key.is_empty() => {
            CheckResult::ok(name, &format!("configured ({})", mask(&key)))
        }
        _ if required => CheckResult::error(
            name,
            "not set",
            &format!("Set with: export {}='...'", name),
        ),
        _ => CheckResult::warning(name, "not set", optional_note),
    }
}

/// Check the workspace directories and inputs.
fn check_workspace(settings: &Settings) -> Vec<CheckResult> {
    let layout = ArtifactLayout::from_settings(settings);
    let mut results = Vec::new();

    match list_stories(&layout.stories_dir) {
        Ok(ids) if !ids.is_empty() => results.push(CheckResult::ok(
            "Stories",
            &format!("{} ({} stories)", layout.stories_dir.display(), ids.len()),
        )),
        Ok(_) => results.push(CheckResult::warning(
            "Stories",
            &format!("{} (no stories)", layout.stories_dir.display()),
            "Add markdown files, or run: fortell init",
        )),
        Err(e) => results.push(CheckResult::error(
            "Stories",
            &format!("{}: {}", layout.stories_dir.display(), e),
            "Check the paths.stories_dir setting",
        )),
    }

    match (&layout.background, layout.existing_background()) {
        (_, Some(path)) => results.push(CheckResult::ok(
            "Background music",
            &path.display().to_string(),
        )),
        (Some(path), None) => results.push(CheckResult::warning(
            "Background music",
            &format!("{} (not found)", path.display()),
            "Narration will be used unmixed",
        )),
        (None, None) => results.push(CheckResult::ok("Background music", "disabled")),
    }

    let cache = settings.cache_path();
    if !settings.narration.cache_enabled {
        results.push(CheckResult::ok("Fragment cache", "disabled"));
    } else if cache.exists() {
        let size = std::fs::metadata(&cache)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok(
            "Fragment cache",
            &format!("{} ({})", cache.display(), size),
        ));
    } else {
        results.push(CheckResult::warning(
            "Fragment cache",
            &format!("{} (not created yet)", cache.display()),
            "Cache will be created on first narration",
        ));
    }

    results
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        match Settings::load_from(Some(&config_path)) {
            Ok(_) => CheckResult::ok("Config file", &format!("{}", config_path.display())),
            Err(e) => CheckResult::error(
                "Config file",
                &format!("{} does not parse", config_path.display()),
                &e.to_string(),
            ),
        }
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: fortell init (or fortell config edit)",
        )
    }
}

fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
