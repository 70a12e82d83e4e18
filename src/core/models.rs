use crate::core::errors::IpscoutError;
use crate::discovery::ports::PortReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct RunDirs {
    pub root: PathBuf, // <base>/runs/<id>
    pub scans: PathBuf,
    pub report: PathBuf,
    pub logs: PathBuf,
}

#[derive(Clone, Debug)]
pub struct Target {
    pub ip: String,
    pub run_id: String,
    pub dirs: RunDirs,
}

impl Target {
    pub fn new(ip: &str, run_id: &str, dirs: &RunDirs) -> Result<Self, IpscoutError> {
        if ip.parse::<Ipv4Addr>().is_err() {
            return Err(IpscoutError::InvalidTarget(format!(
                "'{}' is not an IPv4 address",
                ip
            )));
        }
        Ok(Self {
            ip: ip.to_string(),
            run_id: run_id.to_string(),
            dirs: dirs.clone(),
        })
    }
}

/// One attempt at running a stage's external tool. Built by the controller,
/// owned by the process runner until a ScanOutcome exists.
#[derive(Clone, Debug)]
pub struct ScanInvocation {
    pub command: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl ScanInvocation {
    pub fn new(command: Vec<String>, cwd: PathBuf, timeout: Duration) -> Self {
        Self {
            command,
            cwd,
            timeout,
        }
    }

    pub fn echo(&self) -> String {
        shell_words::join(&self.command)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    TimedOut,
    Skipped,
    Quit,
    ToolNotFound,
    Error,
}

impl OutcomeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Succeeded => "completed",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::TimedOut => "timed out",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::Quit => "quit",
            OutcomeStatus::ToolNotFound => "tool not found",
            OutcomeStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal record of one stage attempt. Immutable once constructed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub status: OutcomeStatus,
    pub duration_ms: u128,
    pub artifact: Option<PathBuf>,
    pub bytes: u64,
    pub exit_code: Option<i32>,
    pub detail: Option<String>,
}

impl ScanOutcome {
    pub fn finished(
        status: OutcomeStatus,
        duration: Duration,
        artifact: Option<PathBuf>,
        bytes: u64,
        exit_code: Option<i32>,
    ) -> Self {
        Self {
            status,
            duration_ms: duration.as_millis(),
            artifact,
            bytes,
            exit_code,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn tool_missing(tool: &str) -> Self {
        Self {
            status: OutcomeStatus::ToolNotFound,
            duration_ms: 0,
            artifact: None,
            bytes: 0,
            exit_code: None,
            detail: Some(format!("'{}' is not installed or not on PATH", tool)),
        }
    }

    pub fn internal(duration: Duration, err: impl std::fmt::Display) -> Self {
        Self {
            status: OutcomeStatus::Error,
            duration_ms: duration.as_millis(),
            artifact: None,
            bytes: 0,
            exit_code: None,
            detail: Some(err.to_string()),
        }
    }

    pub fn precondition_skip(reason: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Skipped,
            duration_ms: 0,
            artifact: None,
            bytes: 0,
            exit_code: None,
            detail: Some(format!("PreconditionUnmet: {}", reason.into())),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms as u64)
    }
}

/// Accumulated open/web-capable ports for the run. Grows monotonically;
/// BTreeSet keeps the views deduplicated and sorted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PortInventory {
    pub open: BTreeSet<u16>,
    pub web: BTreeSet<u16>,
}

impl PortInventory {
    pub fn absorb(&mut self, report: &PortReport) {
        self.open.extend(report.open.iter().copied());
        self.web.extend(report.web.iter().copied());
    }

    pub fn has_web(&self) -> bool {
        !self.web.is_empty()
    }
}
