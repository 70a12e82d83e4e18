use crate::core::models::{OutcomeStatus, ScanOutcome};
use crate::utils::time::format_duration;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while a stage's tool runs. The message doubles as the
/// reminder of the operator controls.
pub fn stage_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .expect("static spinner template"),
    );
    pb.set_message(format!("{} ('s'+Enter skips, 'q'+Enter quits)", label));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub fn print_stage_result(label: &str, outcome: &ScanOutcome) {
    let elapsed = format_duration(outcome.duration());
    let line = match outcome.status {
        OutcomeStatus::Succeeded => {
            format!("✅ {} - Completed ({})", label, elapsed).green().to_string()
        }
        OutcomeStatus::Failed => format!(
            "❌ {} - Failed with exit code {} ({})",
            label,
            outcome
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "?".to_string()),
            elapsed
        )
        .red()
        .to_string(),
        OutcomeStatus::TimedOut => format!("⏰ {} - Timed out ({})", label, elapsed)
            .yellow()
            .to_string(),
        OutcomeStatus::Skipped => format!("⏭️  {} - Skipped", label).yellow().to_string(),
        OutcomeStatus::Quit => format!("🛑 {} - Quit by operator", label)
            .yellow()
            .to_string(),
        OutcomeStatus::ToolNotFound => format!("🔍 {} - Tool not found", label)
            .red()
            .to_string(),
        OutcomeStatus::Error => format!("💥 {} - Error", label).red().to_string(),
    };
    println!("{}", line);
}
