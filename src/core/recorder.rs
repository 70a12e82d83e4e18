use crate::config::OutputConfig;
use crate::core::models::RunDirs;
use crate::scanners::catalog::{ScanStage, StageFamily};
use crate::utils::fs::atomic_write;
use anyhow::Result;
use colored::*;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

const SEPARATOR: &str =
    "#==============================================================================";

/// Turns raw process output into the normalized artifact every stage leaves
/// behind: identification header, command echo, status, duration, separator,
/// then the tool's own output with cosmetic adjustments only.
pub struct Recorder<'a> {
    output: &'a OutputConfig,
}

impl<'a> Recorder<'a> {
    pub fn new(output: &'a OutputConfig) -> Self {
        Self { output }
    }

    pub fn write_artifact(
        &self,
        dirs: &RunDirs,
        stage: &ScanStage,
        command_echo: &str,
        success: bool,
        duration: Duration,
        stdout: &str,
        stderr: &str,
    ) -> Result<(PathBuf, u64)> {
        let mut content = String::new();
        content.push_str(&format!("# {}\n", stage.label));
        content.push_str(&format!("# Command: {}\n", command_echo));
        content.push_str(&format!(
            "# Status: {}\n",
            if success { "SUCCESS" } else { "FAILED" }
        ));
        content.push_str(&format!("# Duration: {:.1}s\n", duration.as_secs_f64()));
        content.push_str(SEPARATOR);
        content.push_str("\n\n");

        let body = self.clean(stdout);
        if body.trim().is_empty() {
            content.push_str("# No results found\n");
        } else {
            content.push_str(&body);
            if !body.ends_with('\n') {
                content.push('\n');
            }
        }

        // Stderr only earns a section when it carries actual errors, not the
        // progress chatter most scanners emit there.
        let err_body = self.clean(stderr);
        let lowered = err_body.to_lowercase();
        if !err_body.trim().is_empty() && (lowered.contains("error") || lowered.contains("failed"))
        {
            content.push_str(&format!("\n# ERRORS:\n{}\n", err_body));
        }

        self.persist(dirs, stage.artifact, content)
    }

    pub fn write_skip_artifact(
        &self,
        dirs: &RunDirs,
        stage: &ScanStage,
        elapsed: Duration,
    ) -> Result<(PathBuf, u64)> {
        let mut content = String::new();
        content.push_str(&format!("# {} (SKIPPED BY OPERATOR)\n", stage.label));
        content.push_str("# Status: SKIPPED\n");
        content.push_str(&format!(
            "# Partial Duration: {:.1}s\n",
            elapsed.as_secs_f64()
        ));
        content.push_str(SEPARATOR);
        content.push_str("\n\nThis scan was skipped at operator request. No results were generated.\n");

        self.persist(dirs, stage.artifact, content)
    }

    pub fn write_timeout_artifact(
        &self,
        dirs: &RunDirs,
        stage: &ScanStage,
        timeout: Duration,
    ) -> Result<(PathBuf, u64)> {
        let secs = timeout.as_secs();
        let mut content = String::new();
        content.push_str(&format!("# {} (TIMEOUT)\n", stage.label));
        content.push_str("# Status: TIMEOUT\n");
        content.push_str(&format!("# Duration: {}s (limit reached)\n", secs));
        content.push_str(SEPARATOR);
        content.push_str("\n\n");
        content.push_str(&format!(
            "The scan was terminated after {} seconds.\n{}\n",
            secs,
            timeout_hints()
        ));

        self.persist(dirs, stage.artifact, content)
    }

    fn persist(
        &self,
        dirs: &RunDirs,
        artifact: &str,
        content: String,
    ) -> Result<(PathBuf, u64)> {
        let path = dirs.scans.join(artifact);
        let bytes = content.len() as u64;
        atomic_write(&path, content.as_bytes())?;
        Ok((path, bytes))
    }

    /// Strip ANSI color and optionally truncate long lines. Nothing here may
    /// change what the output says, only how much of it lands on disk.
    fn clean(&self, raw: &str) -> String {
        let ansi = Regex::new(r"\x1b\[[0-9;]*m").expect("static ansi pattern");
        let stripped = ansi.replace_all(raw, "");

        if !self.output.truncate_long_lines {
            return stripped.into_owned();
        }

        let max = self.output.max_line_length;
        stripped
            .lines()
            .map(|line| {
                if line.len() > max {
                    let cut: String = line.chars().take(max).collect();
                    format!("{}... [truncated]", cut)
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Echo the handful of lines worth a human's attention while the run
    /// scrolls by. Presentation only.
    pub fn print_highlights(&self, stdout: &str, family: StageFamily) {
        if !self.output.highlight_important {
            return;
        }

        let pattern = match family {
            StageFamily::PortScan => r"(?i)^\s*\d{1,5}/(tcp|udp)\s+open",
            StageFamily::Web => r"(?i)(Status:\s*\d{3}|\b(200|301|302)\b.*\b/\S*)",
            StageFamily::Dns => r"(?i)\b(A|CNAME|MX|NS|TXT)\b\s+\S+",
        };
        let re = Regex::new(pattern).expect("static highlight pattern");

        for line in stdout.lines().filter(|l| re.is_match(l)).take(5) {
            println!("   {}", line.trim().green());
        }
    }
}

pub fn timeout_hints() -> String {
    [
        "Consider:",
        "- Raising this stage's timeout in ipscout.toml",
        "- Using a smaller wordlist",
        "- Reducing the scan scope (fewer ports, fewer extensions)",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanners::catalog::{stage, StageKind};
    use tempfile::TempDir;

    fn test_dirs(tmp: &TempDir) -> RunDirs {
        RunDirs {
            root: tmp.path().to_path_buf(),
            scans: tmp.path().join("scans"),
            report: tmp.path().join("report"),
            logs: tmp.path().join("logs"),
        }
    }

    #[test]
    fn artifact_carries_the_full_header_contract() {
        let tmp = TempDir::new().unwrap();
        let dirs = test_dirs(&tmp);
        let output = OutputConfig::default();
        let recorder = Recorder::new(&output);

        let (path, bytes) = recorder
            .write_artifact(
                &dirs,
                stage(StageKind::NmapQuick),
                "nmap -sT --top-ports 1000 10.10.11.5",
                true,
                Duration::from_secs_f64(12.3),
                "80/tcp open http\n",
                "",
            )
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Nmap Quick Scan\n"));
        assert!(content.contains("# Command: nmap -sT --top-ports 1000 10.10.11.5"));
        assert!(content.contains("# Status: SUCCESS"));
        assert!(content.contains("# Duration: 12.3s"));
        assert!(content.contains(SEPARATOR));
        assert!(content.contains("80/tcp open http"));
        assert_eq!(bytes, content.len() as u64);
    }

    #[test]
    fn ansi_codes_are_stripped_and_long_lines_truncated() {
        let tmp = TempDir::new().unwrap();
        let dirs = test_dirs(&tmp);
        let output = OutputConfig {
            highlight_important: false,
            truncate_long_lines: true,
            max_line_length: 20,
        };
        let recorder = Recorder::new(&output);

        let long = format!("\x1b[32m{}\x1b[0m", "x".repeat(50));
        let (path, _) = recorder
            .write_artifact(
                &dirs,
                stage(StageKind::Ffuf),
                "ffuf",
                true,
                Duration::from_secs(1),
                &long,
                "",
            )
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains('\x1b'));
        assert!(content.contains(&format!("{}... [truncated]", "x".repeat(20))));
    }

    #[test]
    fn stderr_chatter_is_dropped_but_errors_kept() {
        let tmp = TempDir::new().unwrap();
        let dirs = test_dirs(&tmp);
        let output = OutputConfig::default();
        let recorder = Recorder::new(&output);

        let (path, _) = recorder
            .write_artifact(
                &dirs,
                stage(StageKind::Nikto),
                "nikto",
                false,
                Duration::from_secs(1),
                "",
                "progress: 50%\n",
            )
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("# ERRORS:"));

        let (path, _) = recorder
            .write_artifact(
                &dirs,
                stage(StageKind::Nikto),
                "nikto",
                false,
                Duration::from_secs(1),
                "",
                "error: connection refused\n",
            )
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# ERRORS:"));
        assert!(content.contains("connection refused"));
    }

    #[test]
    fn skip_and_timeout_artifacts_are_minimal_but_named() {
        let tmp = TempDir::new().unwrap();
        let dirs = test_dirs(&tmp);
        let output = OutputConfig::default();
        let recorder = Recorder::new(&output);

        let (path, _) = recorder
            .write_skip_artifact(&dirs, stage(StageKind::NmapFull), Duration::from_secs(7))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("SKIPPED BY OPERATOR"));
        assert!(content.contains("7.0s"));

        let (path, _) = recorder
            .write_timeout_artifact(&dirs, stage(StageKind::NmapFull), Duration::from_secs(600))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("TIMEOUT"));
        assert!(content.contains("smaller wordlist"));
    }
}
