use crate::config::GlobalConfig;
use crate::scanners::catalog::{ScanStage, StageKind};

/// Everything a command builder may look at. The orchestration core hands
/// this over and treats the result as an opaque command vector.
pub struct InvocationContext<'a> {
    pub target_ip: &'a str,
    /// Host web tools should aim at: the primary domain once hosts mutation
    /// succeeded, the bare IP otherwise.
    pub web_host: &'a str,
    /// Primary discovered domain, for stages that enumerate around a name.
    pub domain: Option<&'a str>,
    /// Sorted web-capable ports; empty means "assume 80".
    pub web_ports: Vec<u16>,
    pub port_range: Option<&'a str>,
    /// Effective-root runs get the faster privileged scan types.
    pub enhanced: bool,
    pub config: &'a GlobalConfig,
}

impl<'a> InvocationContext<'a> {
    fn web_url(&self) -> String {
        let port = self.web_ports.first().copied().unwrap_or(80);
        let scheme = if port == 443 || port == 8443 { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.web_host, port)
    }

    fn domain_or_host(&self) -> &str {
        self.domain.unwrap_or(self.web_host)
    }
}

pub fn build_command(stage: &ScanStage, ctx: &InvocationContext) -> Vec<String> {
    match stage.kind {
        StageKind::NmapQuick => nmap_quick(ctx),
        StageKind::NmapFull => nmap_full(ctx),
        StageKind::NmapUdp => nmap_udp(ctx),
        StageKind::WhatWeb => vec![
            "whatweb".into(),
            "-a".into(),
            "3".into(),
            "--color=never".into(),
            ctx.web_url(),
        ],
        StageKind::Feroxbuster => vec![
            "feroxbuster".into(),
            "-u".into(),
            ctx.web_url(),
            "-w".into(),
            ctx.config.web.wordlist_common.clone(),
            "-t".into(),
            ctx.config.web.threads.to_string(),
            "--no-state".into(),
            "-q".into(),
        ],
        StageKind::Ffuf => vec![
            "ffuf".into(),
            "-u".into(),
            format!("{}/FUZZ", ctx.web_url()),
            "-w".into(),
            ctx.config.web.wordlist_common.clone(),
            "-t".into(),
            ctx.config.web.threads.to_string(),
            "-ac".into(),
        ],
        StageKind::Nikto => vec![
            "nikto".into(),
            "-h".into(),
            ctx.web_url(),
            "-ask".into(),
            "no".into(),
        ],
        StageKind::GobusterVhost => vec![
            "gobuster".into(),
            "vhost".into(),
            "-u".into(),
            format!("http://{}", ctx.domain_or_host()),
            "-w".into(),
            ctx.config.web.wordlist_vhost.clone(),
            "-t".into(),
            ctx.config.web.threads.to_string(),
            "--append-domain".into(),
        ],
        StageKind::DnsRecon => vec![
            "dnsrecon".into(),
            "-d".into(),
            ctx.domain_or_host().to_string(),
            "-n".into(),
            ctx.target_ip.to_string(),
        ],
    }
}

fn scan_type(ctx: &InvocationContext) -> &'static str {
    if ctx.enhanced {
        "-sS"
    } else {
        "-sT"
    }
}

fn nmap_base(ctx: &InvocationContext) -> Vec<String> {
    let mut cmd = vec!["nmap".to_string(), scan_type(ctx).to_string()];
    if ctx.config.nmap.version_detection {
        cmd.push("-sV".into());
        cmd.push("--version-intensity".into());
        cmd.push(ctx.config.nmap.version_intensity.to_string());
    }
    cmd
}

fn nmap_quick(ctx: &InvocationContext) -> Vec<String> {
    let mut cmd = nmap_base(ctx);
    match ctx.port_range {
        Some(range) => {
            cmd.push("-p".into());
            cmd.push(range.to_string());
        }
        None => {
            cmd.push("--top-ports".into());
            cmd.push(ctx.config.nmap.quick_top_ports.to_string());
        }
    }
    cmd.push(format!("-{}", ctx.config.nmap.timing));
    cmd.push(ctx.target_ip.to_string());
    cmd
}

fn nmap_full(ctx: &InvocationContext) -> Vec<String> {
    let mut cmd = nmap_base(ctx);
    cmd.push("--min-rate".into());
    cmd.push(ctx.config.nmap.min_rate.to_string());
    match ctx.port_range {
        Some(range) => {
            cmd.push("-p".into());
            cmd.push(range.to_string());
        }
        None => cmd.push("-p-".into()),
    }
    cmd.push(format!("-{}", ctx.config.nmap.timing));
    cmd.push(ctx.target_ip.to_string());
    cmd
}

fn nmap_udp(ctx: &InvocationContext) -> Vec<String> {
    let mut cmd = vec!["nmap".to_string(), "-sU".to_string()];
    cmd.push("--min-rate".into());
    cmd.push(ctx.config.nmap.min_rate.to_string());
    match ctx.port_range {
        Some(range) => {
            cmd.push("-p".into());
            cmd.push(range.to_string());
        }
        None => {
            cmd.push("--top-ports".into());
            cmd.push(ctx.config.nmap.udp_top_ports.to_string());
        }
    }
    cmd.push(format!("-{}", ctx.config.nmap.timing));
    cmd.push(ctx.target_ip.to_string());
    cmd
}
