use crate::{
    config::ConfigLoader,
    core::{controller::Controller, interrupt::InterruptListener, models::Target, state::RunState},
    organizers::layout,
    reporters::writer,
    scanners::{catalog, toolchain},
    ui::printer,
    utils::{logging, time},
};
use anyhow::Result;
use colored::*;

pub async fn run(cli: crate::cli::args::Cli) -> Result<()> {
    let start_time = std::time::Instant::now();

    let level = logging::level_from_cli(&cli);
    logging::init(level)?;

    tracing::info!("Starting ipscout for target: {}", cli.target);

    let config = ConfigLoader::load_with_custom_path(cli.config.as_deref())?;
    let stages = catalog::select(&cli.scans)?;

    let run_id = time::new_run_id(&cli.target);
    tracing::info!("Run ID: {}", run_id);
    let dirs = layout::prepare_run_dirs(&cli.output, &run_id)?;
    let target = Target::new(&cli.target, &run_id, &dirs)?;

    let missing = toolchain::report_missing(&stages);
    if !missing.is_empty() {
        println!(
            "{}",
            format!("⚠️  Missing tools: {}", missing.join(", ")).yellow()
        );
        println!(
            "{}",
            "💡 Affected stages will be recorded as 'tool not found'".cyan()
        );
    }

    printer::print_run_header(&target.ip, stages.len());

    // The listener outlives every stage; its queue dies with the controller
    // and discards whatever the operator typed after the last scan.
    let (_listener, signals) = InterruptListener::spawn();

    let mut state = RunState::new(&target, &dirs);
    let controller = Controller::new(
        &config,
        stages,
        signals,
        cli.ports.clone(),
        cli.timeout,
        cli.no_hosts,
    );
    controller.run(&mut state).await?;

    writer::write_all(&state, &config, start_time)?;
    printer::print_summary(&state, &dirs);

    Ok(())
}
