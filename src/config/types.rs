use crate::scanners::catalog::StageKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub nmap: NmapConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub domains: DomainsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl GlobalConfig {
    /// Effective timeout budget for one stage.
    pub fn stage_timeout(&self, kind: StageKind) -> Duration {
        let secs = self
            .timeouts
            .for_stage(kind)
            .unwrap_or(self.general.default_timeout_secs);
        Duration::from_secs(secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.general.grace_period_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.general.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub default_timeout_secs: u64,
    pub grace_period_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 900,
            grace_period_secs: 5,
            poll_interval_ms: 100,
        }
    }
}

/// Per-stage timeout overrides; anything unset falls back to the default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TimeoutsConfig {
    pub nmap_quick: Option<u64>,
    pub nmap_full: Option<u64>,
    pub nmap_udp: Option<u64>,
    pub whatweb: Option<u64>,
    pub feroxbuster: Option<u64>,
    pub ffuf: Option<u64>,
    pub nikto: Option<u64>,
    pub gobuster_vhost: Option<u64>,
    pub dnsrecon: Option<u64>,
}

impl TimeoutsConfig {
    pub fn for_stage(&self, kind: StageKind) -> Option<u64> {
        match kind {
            StageKind::NmapQuick => self.nmap_quick,
            StageKind::NmapFull => self.nmap_full,
            StageKind::NmapUdp => self.nmap_udp,
            StageKind::WhatWeb => self.whatweb,
            StageKind::Feroxbuster => self.feroxbuster,
            StageKind::Ffuf => self.ffuf,
            StageKind::Nikto => self.nikto,
            StageKind::GobusterVhost => self.gobuster_vhost,
            StageKind::DnsRecon => self.dnsrecon,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NmapConfig {
    pub timing: String,
    pub quick_top_ports: u16,
    pub udp_top_ports: u16,
    pub min_rate: u32,
    pub version_detection: bool,
    pub version_intensity: u8,
}

impl Default for NmapConfig {
    fn default() -> Self {
        Self {
            timing: "T4".to_string(),
            quick_top_ports: 1000,
            udp_top_ports: 200,
            min_rate: 1000,
            version_detection: true,
            version_intensity: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    pub wordlist_common: String,
    pub wordlist_vhost: String,
    pub threads: u32,
    pub probe_connect_timeout_secs: u64,
    pub probe_max_time_secs: u64,
    pub user_agent: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            wordlist_common: "/usr/share/seclists/Discovery/Web-Content/common.txt".to_string(),
            wordlist_vhost: "/usr/share/seclists/Discovery/DNS/subdomains-top1million-5000.txt"
                .to_string(),
            threads: 10,
            probe_connect_timeout_secs: 3,
            probe_max_time_secs: 5,
            user_agent: "ipscout/0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DomainsConfig {
    /// Lab-domain suffixes accepted without further scrutiny.
    pub suffixes: Vec<String>,
    /// Ordered primary-promotion rules; first rule with a match wins.
    pub promotion: Vec<String>,
    pub hosts_path: PathBuf,
    pub verify_resolution: bool,
}

impl Default for DomainsConfig {
    fn default() -> Self {
        Self {
            suffixes: vec![
                "htb".to_string(),
                "local".to_string(),
                "thm".to_string(),
                "box".to_string(),
            ],
            promotion: vec![
                "suffix-match".to_string(),
                "non-www".to_string(),
                "fewest-labels".to_string(),
            ],
            hosts_path: PathBuf::from("/etc/hosts"),
            verify_resolution: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub highlight_important: bool,
    pub truncate_long_lines: bool,
    pub max_line_length: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            highlight_important: true,
            truncate_long_lines: true,
            max_line_length: 500,
        }
    }
}
