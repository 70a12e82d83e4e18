use anyhow::{bail, Result};
use serde::Serialize;

/// Fixed set of orchestrated tool invocations. The catalog never changes at
/// runtime; selection picks a subset of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    NmapQuick,
    NmapFull,
    NmapUdp,
    WhatWeb,
    Feroxbuster,
    Ffuf,
    Nikto,
    GobusterVhost,
    DnsRecon,
}

impl StageKind {
    pub fn cli_name(&self) -> &'static str {
        match self {
            StageKind::NmapQuick => "nmap-quick",
            StageKind::NmapFull => "nmap-full",
            StageKind::NmapUdp => "nmap-udp",
            StageKind::WhatWeb => "whatweb",
            StageKind::Feroxbuster => "feroxbuster",
            StageKind::Ffuf => "ffuf",
            StageKind::Nikto => "nikto",
            StageKind::GobusterVhost => "gobuster-vhost",
            StageKind::DnsRecon => "dnsrecon",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageFamily {
    PortScan,
    Web,
    Dns,
}

/// Declared gate a stage needs satisfied before it may dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    WebPorts,
    Domain,
    RootPrivileges,
}

#[derive(Debug)]
pub struct ScanStage {
    pub kind: StageKind,
    pub label: &'static str,
    pub tool: &'static str,
    pub family: StageFamily,
    pub requires: Precondition,
    pub artifact: &'static str,
}

pub const CATALOG: &[ScanStage] = &[
    ScanStage {
        kind: StageKind::NmapQuick,
        label: "Nmap Quick Scan",
        tool: "nmap",
        family: StageFamily::PortScan,
        requires: Precondition::None,
        artifact: "nmap_quick.txt",
    },
    ScanStage {
        kind: StageKind::NmapFull,
        label: "Nmap Full Scan",
        tool: "nmap",
        family: StageFamily::PortScan,
        requires: Precondition::None,
        artifact: "nmap_full.txt",
    },
    ScanStage {
        kind: StageKind::NmapUdp,
        label: "Nmap UDP Scan",
        tool: "nmap",
        family: StageFamily::PortScan,
        requires: Precondition::RootPrivileges,
        artifact: "nmap_udp.txt",
    },
    ScanStage {
        kind: StageKind::WhatWeb,
        label: "WhatWeb Fingerprint",
        tool: "whatweb",
        family: StageFamily::Web,
        requires: Precondition::WebPorts,
        artifact: "whatweb.txt",
    },
    ScanStage {
        kind: StageKind::Feroxbuster,
        label: "Feroxbuster Directory Scan",
        tool: "feroxbuster",
        family: StageFamily::Web,
        requires: Precondition::WebPorts,
        artifact: "feroxbuster.txt",
    },
    ScanStage {
        kind: StageKind::Ffuf,
        label: "Ffuf Directory Fuzz",
        tool: "ffuf",
        family: StageFamily::Web,
        requires: Precondition::WebPorts,
        artifact: "ffuf.txt",
    },
    ScanStage {
        kind: StageKind::Nikto,
        label: "Nikto Web Scan",
        tool: "nikto",
        family: StageFamily::Web,
        requires: Precondition::WebPorts,
        artifact: "nikto.txt",
    },
    ScanStage {
        kind: StageKind::GobusterVhost,
        label: "Gobuster Vhost Enumeration",
        tool: "gobuster",
        family: StageFamily::Web,
        requires: Precondition::Domain,
        artifact: "gobuster_vhost.txt",
    },
    ScanStage {
        kind: StageKind::DnsRecon,
        label: "DnsRecon Zone Enumeration",
        tool: "dnsrecon",
        family: StageFamily::Dns,
        requires: Precondition::Domain,
        artifact: "dnsrecon.txt",
    },
];

pub fn stage(kind: StageKind) -> &'static ScanStage {
    CATALOG
        .iter()
        .find(|s| s.kind == kind)
        .expect("every StageKind has a catalog entry")
}

/// Resolve a `--scans` argument into an ordered stage selection. Catalog
/// order is preserved regardless of how the list was typed.
pub fn select(arg: &str) -> Result<Vec<&'static ScanStage>> {
    let arg = arg.trim();
    if arg.is_empty() || arg.eq_ignore_ascii_case("all") {
        return Ok(CATALOG.iter().collect());
    }

    let mut wanted = Vec::new();
    for name in arg.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        match CATALOG.iter().find(|s| s.kind.cli_name() == name) {
            Some(stage) => {
                if !wanted.iter().any(|k: &StageKind| *k == stage.kind) {
                    wanted.push(stage.kind);
                }
            }
            None => bail!(
                "unknown scan '{}'; available: {}",
                name,
                CATALOG
                    .iter()
                    .map(|s| s.kind.cli_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    Ok(CATALOG
        .iter()
        .filter(|s| wanted.contains(&s.kind))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_all_returns_full_catalog() {
        let stages = select("all").unwrap();
        assert_eq!(stages.len(), CATALOG.len());
    }

    #[test]
    fn select_preserves_catalog_order() {
        let stages = select("nikto,nmap-quick").unwrap();
        let kinds: Vec<_> = stages.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StageKind::NmapQuick, StageKind::Nikto]);
    }

    #[test]
    fn select_rejects_unknown_names() {
        let err = select("nmap-quick,masscan").unwrap_err();
        assert!(err.to_string().contains("unknown scan 'masscan'"));
    }

    #[test]
    fn duplicate_names_collapse() {
        let stages = select("ffuf,ffuf").unwrap();
        assert_eq!(stages.len(), 1);
    }
}
