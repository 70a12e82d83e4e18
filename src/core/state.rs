use super::events::Event;
use super::models::{OutcomeStatus, PortInventory, RunDirs, ScanOutcome, Target};
use crate::scanners::catalog::StageKind;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RunState {
    pub target: String,
    pub run_id: String,
    pub inventory: PortInventory,
    /// Insertion-ordered; the first entry is the default primary domain.
    pub domains: Vec<String>,
    /// One entry per dispatched or gated stage, in pipeline order.
    pub outcomes: Vec<(StageKind, ScanOutcome)>,
    /// Guard latch: domain discovery fires at most once per run.
    pub discovery_fired: bool,
    /// Hosts mutation failed; domain-capable stages target the IP instead.
    pub hosts_fallback: bool,

    #[serde(skip)]
    pub discovery_runs: u32,
    #[serde(skip)]
    pub dirs: Option<RunDirs>,
}

impl RunState {
    pub fn new(target: &Target, dirs: &RunDirs) -> Self {
        Self {
            target: target.ip.clone(),
            run_id: target.run_id.clone(),
            inventory: PortInventory::default(),
            domains: Vec::new(),
            outcomes: Vec::new(),
            discovery_fired: false,
            hosts_fallback: false,
            discovery_runs: 0,
            dirs: Some(dirs.clone()),
        }
    }

    pub fn on_event(&mut self, ev: Event) {
        match ev {
            Event::StageStarted(kind) => {
                tracing::info!("Stage started: {}", kind.cli_name());
            }
            Event::StageFinished(kind, outcome) => {
                tracing::info!(
                    "Stage finished: {} ({}, {:.1}s)",
                    kind.cli_name(),
                    outcome.status,
                    outcome.duration().as_secs_f64()
                );
                self.outcomes.push((kind, outcome));
            }
            Event::PortsDiscovered(report) => {
                if !report.is_empty() {
                    tracing::info!(
                        "Ports discovered: {:?} (web-capable: {:?})",
                        report.open,
                        report.web
                    );
                }
                self.inventory.absorb(&report);
            }
            Event::DomainDiscovered(domain) => {
                if !self.domains.iter().any(|d| d == &domain) {
                    tracing::info!("Domain discovered: {}", domain);
                    self.domains.push(domain);
                }
            }
            Event::HostsFallback(reason) => {
                tracing::warn!(
                    "Hosts mutation abandoned ({}); domain stages fall back to IP targeting",
                    reason
                );
                self.hosts_fallback = true;
            }
        }
    }

    #[allow(dead_code)]
    pub fn outcome_of(&self, kind: StageKind) -> Option<&ScanOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, o)| o)
    }

    pub fn quit_requested(&self) -> bool {
        self.outcomes
            .iter()
            .any(|(_, o)| o.status == OutcomeStatus::Quit)
    }

    pub fn count_with(&self, status: OutcomeStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.status == status)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ports::PortReport;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn test_state() -> RunState {
        let dirs = RunDirs {
            root: PathBuf::from("/tmp/run"),
            scans: PathBuf::from("/tmp/run/scans"),
            report: PathBuf::from("/tmp/run/report"),
            logs: PathBuf::from("/tmp/run/logs"),
        };
        let target = Target::new("10.10.11.5", "scan_test", &dirs).unwrap();
        RunState::new(&target, &dirs)
    }

    #[test]
    fn ports_events_accumulate_monotonically() {
        let mut state = test_state();

        let mut a = PortReport::default();
        a.open.extend([22, 80]);
        a.web.insert(80);
        state.on_event(Event::PortsDiscovered(a));

        let mut b = PortReport::default();
        b.open.insert(8080);
        b.web.insert(8080);
        state.on_event(Event::PortsDiscovered(b));

        assert_eq!(state.inventory.open, BTreeSet::from([22, 80, 8080]));
        assert_eq!(state.inventory.web, BTreeSet::from([80, 8080]));
    }

    #[test]
    fn domains_deduplicate_preserving_order() {
        let mut state = test_state();
        state.on_event(Event::DomainDiscovered("machine.htb".into()));
        state.on_event(Event::DomainDiscovered("www.machine.htb".into()));
        state.on_event(Event::DomainDiscovered("machine.htb".into()));
        assert_eq!(state.domains, vec!["machine.htb", "www.machine.htb"]);
    }

    #[test]
    fn hosts_fallback_flag_sticks() {
        let mut state = test_state();
        assert!(!state.hosts_fallback);
        state.on_event(Event::HostsFallback("permission denied".into()));
        assert!(state.hosts_fallback);
    }
}
