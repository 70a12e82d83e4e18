use crate::core::models::{OutcomeStatus, RunDirs};
use crate::core::state::RunState;
use colored::*;

pub fn print_run_header(target: &str, total_stages: usize) {
    println!(
        "\n{} {}",
        "🚀 Starting reconnaissance on".green().bold(),
        target.green().bold()
    );
    println!("{}", format!("📋 {} scan(s) selected", total_stages).cyan());
    println!(
        "{}\n",
        "⏸️  During scans: press 's' + Enter to skip the current scan, 'q' + Enter to quit all"
            .magenta()
    );
}

pub fn print_stage_header(index: usize, total: usize, label: &str) {
    println!(
        "\n{}",
        format!("📊 Scan {}/{}: {}", index, total, label).blue().bold()
    );
    println!("{}", "-".repeat(60));
}

pub fn print_hosts_update(target: &str, added: usize) {
    println!(
        "{}",
        format!("🔧 Added {} domain binding(s) for {} to the hosts file", added, target).cyan()
    );
}

pub fn print_summary(state: &RunState, dirs: &RunDirs) {
    println!("\n{}", "═══════════════════════════════════════".green().bold());
    println!("{}", "ipscout Run Complete".green().bold());
    println!("{}", "═══════════════════════════════════════".green().bold());

    println!("\n{}: {}", "Target".cyan().bold(), state.target);
    println!("{}: {}", "Run ID".cyan().bold(), state.run_id);

    let succeeded = state.count_with(OutcomeStatus::Succeeded);
    let skipped = state.count_with(OutcomeStatus::Skipped);
    let quit = state.count_with(OutcomeStatus::Quit);
    let failed = state.outcomes.len() - succeeded - skipped - quit;

    println!("\n{}", "Scan Summary:".yellow().bold());
    if succeeded > 0 {
        println!("  {}", format!("✅ Successful: {}", succeeded).green());
    }
    if skipped > 0 {
        println!("  {}", format!("⏭️  Skipped: {}", skipped).yellow());
    }
    if failed > 0 {
        println!("  {}", format!("❌ Failed: {}", failed).red());
    }

    if !state.inventory.open.is_empty() {
        println!("\n{}", "Open Ports:".yellow().bold());
        let open: Vec<String> = state.inventory.open.iter().map(u16::to_string).collect();
        println!("  {}", open.join(", "));
        if state.inventory.has_web() {
            let web: Vec<String> = state.inventory.web.iter().map(u16::to_string).collect();
            println!("  {} {}", "Web-capable:".cyan(), web.join(", "));
        }
    }

    if !state.domains.is_empty() {
        println!("\n{}", "Discovered Domains:".yellow().bold());
        for domain in &state.domains {
            println!("  • {}", domain.cyan());
        }
    }

    if state.quit_requested() {
        println!("\n{}", "⏹️  Scan session terminated by operator".yellow().bold());
    } else {
        println!("\n{}", "🎉 All selected scans processed".green().bold());
    }

    println!(
        "{}",
        format!("📁 Results saved in: {}", dirs.root.display()).cyan()
    );
    println!(
        "{}",
        "📋 Check report/summary.md for an overview".cyan().dimmed()
    );
}
