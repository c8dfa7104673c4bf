//! CLI output formatting utilities.

use crate::artifacts::{StageStatus, StoryStatus};
use crate::orchestrator::{BatchReport, StageOutcome, StoryReport};
use console::{style, StyledObject};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a story line for `list`.
    pub fn story_info(
        id: &str,
        title: &str,
        words: usize,
        narration_seconds: Option<f64>,
        complete: usize,
        stages: usize,
    ) {
        let narration = narration_seconds
            .map(|s| format!(", {} narrated", format_duration(s)))
            .unwrap_or_default();
        println!(
            "  {} {} ({}, {} words{}, {}/{} stages)",
            style("*").cyan(),
            style(title).bold(),
            style(id).dim(),
            words,
            narration,
            complete,
            stages
        );
    }

    /// Print a table of stage statuses, one row per story.
    pub fn status_table(statuses: &[StoryStatus]) {
        let Some(first) = statuses.first() else {
            return;
        };
        let id_width = statuses
            .iter()
            .map(|s| s.story_id.len())
            .max()
            .unwrap_or(0)
            .max(5);

        let mut header = format!("  {:<width$}", "story", width = id_width);
        for record in &first.records {
            header.push_str(&format!("  {:<12}", record.stage.name()));
        }
        println!("{}", style(header).bold());

        for status in statuses {
            print!("  {:<width$}", status.story_id, width = id_width);
            for record in &status.records {
                print!("  {}", status_cell(record.status));
            }
            println!();
        }
    }

    /// Print what happened to each stage of one story.
    pub fn story_report(report: &StoryReport) {
        println!("  {}", style(&report.story_id).bold());
        for (stage, outcome) in &report.stages {
            let cause = match outcome {
                StageOutcome::Failed(cause) => format!(" - {}", cause),
                _ => String::new(),
            };
            println!(
                "    {:<14}{}{}",
                stage.name(),
                outcome_label(outcome),
                style(cause).dim()
            );
        }
    }

    /// Print the end-of-batch summary.
    pub fn batch_summary(report: &BatchReport) {
        Output::header("Summary");
        println!();

        let mut completed = 0;
        let mut skipped = 0;
        for story in &report.stories {
            if !story.succeeded() {
                continue;
            }
            if story.all_skipped() {
                skipped += 1;
            } else {
                completed += 1;
            }
        }
        let failed = report.failed();
        let cancelled = report.cancelled();

        Output::kv("Completed", &completed.to_string());
        Output::kv("Already complete", &skipped.to_string());
        Output::kv("Failed", &failed.len().to_string());
        Output::kv("Cancelled", &cancelled.len().to_string());

        if !failed.is_empty() {
            println!();
            for story in failed {
                if let Some((stage, cause)) = story.failure() {
                    println!(
                        "  {} {} at {}: {}",
                        style("✗").red(),
                        style(&story.story_id).bold(),
                        stage,
                        cause
                    );
                }
            }
        }
        if !cancelled.is_empty() {
            println!();
            for story in cancelled {
                println!("  {} {}", style("!").yellow(), style(&story.story_id).bold());
            }
        }
    }
}

fn status_cell(status: StageStatus) -> StyledObject<String> {
    let cell = format!("{:<12}", status.to_string());
    match status {
        StageStatus::Complete => style(cell).green(),
        StageStatus::Stale => style(cell).yellow(),
        StageStatus::Absent => style(cell).dim(),
    }
}

fn outcome_label(outcome: &StageOutcome) -> StyledObject<&'static str> {
    let label = outcome.label();
    match outcome {
        StageOutcome::Completed => style(label).green(),
        StageOutcome::Skipped => style(label).dim(),
        StageOutcome::Failed(_) => style(label).red(),
        StageOutcome::NotAttempted | StageOutcome::Cancelled => style(label).yellow(),
    }
}

/// Format duration in seconds to a human-readable string.
fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
