use crate::config::WebConfig;
use crate::discovery::ports;
use std::collections::BTreeSet;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Cap on fallback probing; beyond this the signal-to-wait ratio is poor.
const MAX_PROBED_PORTS: usize = 10;

/// One-shot HTTP-then-HTTPS header probe of a single port. True when either
/// scheme answers with a well-formed status line.
pub async fn probe_port(target: &str, port: u16, web: &WebConfig) -> bool {
    for scheme in ["http", "https"] {
        let url = format!("{}://{}:{}", scheme, target, port);

        let mut cmd = Command::new("curl");
        cmd.arg("-s")
            .arg("-I")
            .arg("--connect-timeout")
            .arg(web.probe_connect_timeout_secs.to_string())
            .arg("--max-time")
            .arg(web.probe_max_time_secs.to_string())
            .arg("-A")
            .arg(&web.user_agent);
        if scheme == "https" {
            cmd.arg("-k");
        }
        cmd.arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let budget = Duration::from_secs(web.probe_max_time_secs + 2);
        match tokio::time::timeout(budget, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                let headers = String::from_utf8_lossy(&output.stdout);
                if ports::classify_probe(&headers) {
                    tracing::info!("{} answers on {}", target, url);
                    return true;
                }
            }
            Ok(Ok(_)) | Ok(Err(_)) => {}
            Err(_) => {
                tracing::debug!("probe of {} exceeded its budget", url);
            }
        }
    }
    false
}

/// Probe every open port (bounded) and return those that spoke HTTP. Used as
/// the remedy when nothing classified as web from scanner output alone.
pub async fn sweep(target: &str, open_ports: &BTreeSet<u16>, web: &WebConfig) -> BTreeSet<u16> {
    let mut responsive = BTreeSet::new();

    for port in open_ports.iter().take(MAX_PROBED_PORTS) {
        if probe_port(target, *port, web).await {
            responsive.insert(*port);
        }
    }

    if open_ports.len() > MAX_PROBED_PORTS {
        tracing::warn!(
            "probed only the first {} of {} open ports",
            MAX_PROBED_PORTS,
            open_ports.len()
        );
    }

    responsive
}
