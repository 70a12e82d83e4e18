use crate::config::GlobalConfig;
use crate::core::events::Event;
use crate::core::interrupt::SignalQueue;
use crate::core::models::{OutcomeStatus, RunDirs, ScanInvocation, ScanOutcome};
use crate::core::runner;
use crate::core::state::RunState;
use crate::discovery::hosts;
use crate::discovery::ports::{self, PortReport};
use crate::discovery::{domains, probe};
use crate::scanners::catalog::{Precondition, ScanStage, StageFamily};
use crate::scanners::invoker::{self, InvocationContext};
use crate::ui::{printer, progress};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

type CommandBuilder = fn(&ScanStage, &InvocationContext) -> Vec<String>;

/// Top-level sequencer. Stages run strictly one at a time on this task; the
/// only other live thread is the interrupt listener feeding the signal
/// queue. All discovery state mutation funnels through `RunState::on_event`.
pub struct Controller<'a> {
    config: &'a GlobalConfig,
    stages: Vec<&'static ScanStage>,
    signals: SignalQueue,
    port_range: Option<String>,
    timeout_override: Option<u64>,
    no_hosts: bool,
    web_probe_attempted: bool,
    command_builder: CommandBuilder,
}

impl<'a> Controller<'a> {
    pub fn new(
        config: &'a GlobalConfig,
        stages: Vec<&'static ScanStage>,
        signals: SignalQueue,
        port_range: Option<String>,
        timeout_override: Option<u64>,
        no_hosts: bool,
    ) -> Self {
        Self {
            config,
            stages,
            signals,
            port_range,
            timeout_override,
            no_hosts,
            web_probe_attempted: false,
            command_builder: invoker::build_command,
        }
    }

    #[cfg(test)]
    fn with_builder(mut self, builder: CommandBuilder) -> Self {
        self.command_builder = builder;
        self
    }

    /// Drive every selected stage to a terminal outcome. Returns once all
    /// stages finished or a quit outcome halted the pipeline; the caller
    /// owns the single reporting handoff that follows.
    pub async fn run(mut self, state: &mut RunState) -> Result<()> {
        let dirs = state
            .dirs
            .clone()
            .context("run state carries no directories")?;
        let total = self.stages.len();

        for (index, stage) in self.stages.clone().into_iter().enumerate() {
            if state.quit_requested() {
                tracing::info!("Pipeline halted; {} stage(s) not dispatched", total - index);
                break;
            }

            printer::print_stage_header(index + 1, total, stage.label);

            if let Some(reason) = self.unmet_precondition(stage, state).await {
                tracing::info!("Skipping {}: {}", stage.label, reason);
                let outcome = ScanOutcome::precondition_skip(reason);
                progress::print_stage_result(stage.label, &outcome);
                state.on_event(Event::StageFinished(stage.kind, outcome));
                self.discovery_safety_check(state).await;
                continue;
            }

            let invocation = self.invocation_for(stage, state, &dirs);
            state.on_event(Event::StageStarted(stage.kind));

            let spinner = progress::stage_spinner(stage.label);
            let outcome =
                runner::execute(stage, invocation, &dirs, &mut self.signals, self.config).await;
            spinner.finish_and_clear();
            progress::print_stage_result(stage.label, &outcome);

            let succeeded = outcome.status == OutcomeStatus::Succeeded;
            let artifact = outcome.artifact.clone();
            state.on_event(Event::StageFinished(stage.kind, outcome));

            if succeeded && stage.family == StageFamily::PortScan {
                if let Some(path) = artifact.as_deref() {
                    self.refresh_inventory(path, state);
                }
            }

            // Trailing safety check: any stage may have surfaced web ports,
            // not just the port-scan family.
            self.discovery_safety_check(state).await;
        }

        Ok(())
    }

    /// Evaluate a stage's declared precondition, running its remedy once
    /// before giving up. Returns the skip reason when the gate stays shut.
    async fn unmet_precondition(
        &mut self,
        stage: &ScanStage,
        state: &mut RunState,
    ) -> Option<String> {
        match stage.requires {
            Precondition::None => None,
            Precondition::RootPrivileges => {
                if is_root() {
                    None
                } else {
                    Some("requires root privileges (re-run with sudo)".to_string())
                }
            }
            Precondition::WebPorts => {
                if state.inventory.has_web() {
                    return None;
                }
                self.web_port_remedy(state).await;
                if state.inventory.has_web() {
                    None
                } else {
                    Some("no web-capable ports discovered".to_string())
                }
            }
            Precondition::Domain => {
                if domains::select_primary(&state.domains, &self.config.domains).is_some() {
                    return None;
                }
                // Remedy: a discovery attempt, if one hasn't fired yet and
                // there is anything to inspect.
                if state.inventory.has_web() && !state.discovery_fired {
                    self.run_domain_discovery(state).await;
                }
                if domains::select_primary(&state.domains, &self.config.domains).is_some() {
                    None
                } else {
                    Some("no target domain discovered".to_string())
                }
            }
        }
    }

    /// Probe open ports for HTTP speakers when scanner output classified
    /// none as web. One sweep per run; a failed sweep stays failed.
    async fn web_port_remedy(&mut self, state: &mut RunState) {
        if self.web_probe_attempted {
            return;
        }
        self.web_probe_attempted = true;

        if state.inventory.open.is_empty() {
            tracing::debug!("no open ports to probe for web services");
            return;
        }

        tracing::info!("no web ports known; probing open ports directly");
        let responsive =
            probe::sweep(&state.target, &state.inventory.open, &self.config.web).await;
        if responsive.is_empty() {
            return;
        }

        let report = PortReport {
            open: responsive.clone(),
            web: responsive,
        };
        state.on_event(Event::PortsDiscovered(report));
    }

    /// Fire domain discovery the first time web ports exist, wherever they
    /// came from. The latch keeps this to exactly one firing per run.
    async fn discovery_safety_check(&mut self, state: &mut RunState) {
        if state.inventory.has_web() && !state.discovery_fired {
            self.run_domain_discovery(state).await;
        }
    }

    async fn run_domain_discovery(&mut self, state: &mut RunState) {
        state.discovery_fired = true;
        state.discovery_runs += 1;

        let found = domains::discover(
            &state.target,
            &state.inventory.web,
            &self.config.domains,
            &self.config.web,
        )
        .await;
        for domain in found {
            state.on_event(Event::DomainDiscovered(domain));
        }

        if state.domains.is_empty() {
            return;
        }

        if self.no_hosts {
            state.on_event(Event::HostsFallback("disabled by --no-hosts".to_string()));
            return;
        }

        let target_ip = state.target.clone();
        match hosts::apply(&self.config.domains.hosts_path, &target_ip, &state.domains) {
            Ok(added) => {
                if added > 0 {
                    printer::print_hosts_update(&target_ip, added);
                }
                if self.config.domains.verify_resolution {
                    domains::verify_resolution(&state.domains, &target_ip).await;
                }
            }
            Err(e) => {
                // Recoverable: only the mutation is abandoned, never the run.
                state.on_event(Event::HostsFallback(e.to_string()));
            }
        }
    }

    /// Re-read a finished port scan's artifact and fold what it found into
    /// the inventory. A parse miss contributes nothing and is not an error.
    fn refresh_inventory(&self, artifact: &Path, state: &mut RunState) {
        let content = match std::fs::read_to_string(artifact) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("could not re-read artifact {:?}: {}", artifact, e);
                return;
            }
        };

        let report = ports::extract(&content);
        if report.is_empty() {
            tracing::debug!("no ports parsed from {:?}", artifact);
            return;
        }
        state.on_event(Event::PortsDiscovered(report));
    }

    fn invocation_for(
        &self,
        stage: &ScanStage,
        state: &RunState,
        dirs: &RunDirs,
    ) -> ScanInvocation {
        let primary =
            domains::select_primary(&state.domains, &self.config.domains).map(str::to_string);
        let web_host = if state.hosts_fallback {
            state.target.clone()
        } else {
            primary.clone().unwrap_or_else(|| state.target.clone())
        };

        let ctx = InvocationContext {
            target_ip: &state.target,
            web_host: &web_host,
            domain: primary.as_deref(),
            web_ports: state.inventory.web.iter().copied().collect(),
            port_range: self.port_range.as_deref(),
            enhanced: is_root(),
            config: self.config,
        };

        let command = (self.command_builder)(stage, &ctx);
        let timeout = self
            .timeout_override
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.stage_timeout(stage.kind));

        ScanInvocation::new(command, dirs.scans.clone(), timeout)
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}
