use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "ipscout", version, about = "Sequential recon orchestrator for a single target")]
pub struct Cli {
    /// Target IPv4 address to scan (required)
    #[arg(short = 't', long = "target")]
    pub target: String,

    /// Comma-separated stage list (e.g. nmap-quick,feroxbuster) or "all"
    #[arg(short = 's', long = "scans", default_value = "all")]
    pub scans: String,

    /// Custom nmap port selection (e.g. "1-1000" or "22,80,443")
    #[arg(short = 'p', long = "ports")]
    pub ports: Option<String>,

    /// Base directory for run artifacts
    #[arg(short = 'o', long = "output", default_value = "artifacts")]
    pub output: PathBuf,

    /// Configuration file path (overrides the default search)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Per-stage timeout override in seconds (applies to every stage)
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Never touch the hosts file, even when domains are discovered
    #[arg(long = "no-hosts", action = ArgAction::SetTrue)]
    pub no_hosts: bool,

    /// Verbose human output
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Debug logs (implies verbose)
    #[arg(short = 'd', long = "debug", action = ArgAction::SetTrue)]
    pub debug: bool,
}
