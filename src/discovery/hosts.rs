use crate::core::errors::IpscoutError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub const MARKER_PREFIX: &str = "# ipscout entries -";

/// Append target-IP-to-domain bindings under the marker block, diffing
/// against existing content first. Safe to call repeatedly with overlapping
/// lists: a (ip, domain) pair already present anywhere in the file is never
/// written again. Returns how many bindings were appended.
pub fn apply(hosts_path: &Path, ip: &str, domains: &[String]) -> Result<usize, IpscoutError> {
    if domains.is_empty() {
        return Ok(0);
    }

    let current = match std::fs::read_to_string(hosts_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(classify(e)),
    };

    let to_add: Vec<&String> = domains
        .iter()
        .filter(|domain| !binding_present(&current, ip, domain))
        .collect();

    if to_add.is_empty() {
        tracing::debug!("all domain bindings already present in {:?}", hosts_path);
        return Ok(0);
    }

    let marker = format!("{} {}", MARKER_PREFIX, ip);
    let mut block = String::new();
    if !current.lines().any(|line| line.trim() == marker) {
        block.push('\n');
        block.push_str(&marker);
        block.push('\n');
    }
    for domain in &to_add {
        block.push_str(&format!("{}\t{}\n", ip, domain));
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(hosts_path)
        .map_err(classify)?;
    file.write_all(block.as_bytes()).map_err(classify)?;

    tracing::info!(
        "added {} binding(s) to {:?}: {:?}",
        to_add.len(),
        hosts_path,
        to_add
    );
    Ok(to_add.len())
}

/// A binding counts as present when any non-comment line maps the ip to the
/// domain, whether we wrote it or the operator did.
fn binding_present(content: &str, ip: &str, domain: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| {
            let mut tokens = line.split_whitespace();
            tokens.next() == Some(ip) && tokens.any(|t| t == domain)
        })
}

fn classify(e: std::io::Error) -> IpscoutError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        IpscoutError::HostsPermission(e.to_string())
    } else {
        IpscoutError::Io(e)
    }
}
