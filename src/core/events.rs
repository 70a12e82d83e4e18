use crate::core::models::ScanOutcome;
use crate::discovery::ports::PortReport;
use crate::scanners::catalog::StageKind;

/// Everything that mutates run state flows through one of these, applied on
/// the orchestrator task only.
#[derive(Debug)]
pub enum Event {
    StageStarted(StageKind),
    StageFinished(StageKind, ScanOutcome),
    PortsDiscovered(PortReport),
    DomainDiscovered(String),
    HostsFallback(String),
}
