use crate::config::{DomainsConfig, WebConfig};
use regex::Regex;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Registrar TLDs that mark a hostname as unrelated to a lab target.
const PUBLIC_TLDS: &[&str] = &["com", "org", "net", "gov", "edu", "io"];

/// Inspect every known web port for hostname-shaped tokens that look like
/// lab domains. One body fetch and one header fetch per port; anything that
/// fails to fetch contributes nothing.
pub async fn discover(
    target: &str,
    web_ports: &BTreeSet<u16>,
    domains: &DomainsConfig,
    web: &WebConfig,
) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for port in web_ports {
        let scheme = if *port == 443 || *port == 8443 { "https" } else { "http" };
        let url = format!("{}://{}:{}", scheme, target, port);
        tracing::debug!("inspecting {} for domain names", url);

        if let Some(body) = fetch(&url, true, web).await {
            merge(&mut found, extract_candidates(&body, domains));
        }
        if let Some(headers) = fetch(&url, false, web).await {
            merge(&mut found, extract_header_candidates(&headers, domains));
        }
    }

    if found.is_empty() {
        tracing::info!("no domain names surfaced from web responses");
    } else {
        tracing::info!("discovered domains: {:?}", found);
    }

    found
}

async fn fetch(url: &str, body: bool, web: &WebConfig) -> Option<String> {
    let mut cmd = Command::new("curl");
    cmd.arg("-s");
    if body {
        cmd.arg("-L");
    } else {
        cmd.arg("-I");
    }
    cmd.arg("-k")
        .arg("--connect-timeout")
        .arg(web.probe_connect_timeout_secs.to_string())
        .arg("--max-time")
        .arg(web.probe_max_time_secs.to_string())
        .arg("-A")
        .arg(&web.user_agent)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let budget = Duration::from_secs(web.probe_max_time_secs + 2);
    match tokio::time::timeout(budget, cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        _ => None,
    }
}

fn merge(into: &mut Vec<String>, candidates: Vec<String>) {
    for candidate in candidates {
        if !into.iter().any(|d| d == &candidate) {
            into.push(candidate);
        }
    }
}

/// Hostname-shaped tokens in a page body: configured lab suffixes anywhere,
/// plus hosts referenced by href/src/action URLs.
pub fn extract_candidates(content: &str, config: &DomainsConfig) -> Vec<String> {
    let mut found = Vec::new();

    for suffix in &config.suffixes {
        let pattern = format!(
            r"(?i)\b([a-z0-9][a-z0-9.-]*\.{})\b",
            regex::escape(suffix)
        );
        let re = Regex::new(&pattern).expect("suffix pattern from escaped input");
        for cap in re.captures_iter(content) {
            push_valid(&mut found, &cap[1], config);
        }
    }

    let attr_re = Regex::new(r#"(?i)(?:href|src|action)=["']https?://([a-zA-Z0-9.-]+)"#)
        .expect("static attribute pattern");
    for cap in attr_re.captures_iter(content) {
        push_valid(&mut found, &cap[1], config);
    }

    found
}

/// Hostnames in response headers: redirect targets first, then any Host
/// echo a proxy left behind.
pub fn extract_header_candidates(headers: &str, config: &DomainsConfig) -> Vec<String> {
    let mut found = Vec::new();

    let location_re = Regex::new(r"(?im)^Location:\s*https?://([a-zA-Z0-9.-]+)")
        .expect("static location pattern");
    for cap in location_re.captures_iter(headers) {
        push_valid(&mut found, &cap[1], config);
    }

    let host_re =
        Regex::new(r"(?im)^Host:\s*([a-zA-Z0-9.-]+)").expect("static host pattern");
    for cap in host_re.captures_iter(headers) {
        push_valid(&mut found, &cap[1], config);
    }

    found
}

fn push_valid(into: &mut Vec<String>, raw: &str, config: &DomainsConfig) {
    let candidate = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if is_lab_domain(&candidate, config) && !into.iter().any(|d| d == &candidate) {
        into.push(candidate);
    }
}

/// A usable lab domain: hostname-shaped, never an IP literal, never a public
/// registrar name. A configured suffix is accepted outright; anything else
/// passes only when its TLD is not a public one.
pub fn is_lab_domain(candidate: &str, config: &DomainsConfig) -> bool {
    if candidate.len() < 4 || candidate.len() > 253 {
        return false;
    }
    if !candidate.contains('.') || candidate.starts_with('.') || candidate.ends_with('.') {
        return false;
    }
    if candidate.parse::<IpAddr>().is_ok() {
        return false;
    }
    if !candidate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return false;
    }

    let tld = candidate.rsplit('.').next().unwrap_or_default();
    if config.suffixes.iter().any(|s| s == tld) {
        return true;
    }
    !PUBLIC_TLDS.contains(&tld)
}

/// Pick the primary domain. Insertion order is the default; the configured
/// promotion rules run in order and the first one that matches anything
/// promotes that match.
pub fn select_primary<'a>(domains: &'a [String], config: &DomainsConfig) -> Option<&'a str> {
    let first = domains.first()?;

    for rule in &config.promotion {
        let promoted = match rule.as_str() {
            "suffix-match" => domains.iter().find(|d| {
                d.rsplit('.')
                    .next()
                    .is_some_and(|tld| config.suffixes.iter().any(|s| s == tld))
            }),
            "non-www" => domains.iter().find(|d| !d.starts_with("www.")),
            "fewest-labels" => domains.iter().find(|d| d.split('.').count() == 2),
            unknown => {
                tracing::warn!("ignoring unknown promotion rule '{}'", unknown);
                None
            }
        };
        if let Some(domain) = promoted {
            return Some(domain.as_str());
        }
    }

    Some(first.as_str())
}

/// Soft post-mutation check that each domain now resolves to the target.
/// Unclear answers are logged and tolerated; resolution often depends on the
/// very hosts entry we just wrote.
pub async fn verify_resolution(domains: &[String], target: &str) {
    for domain in domains {
        let mut cmd = Command::new("nslookup");
        cmd.arg(domain)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(Duration::from_secs(5), cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if stdout.contains(target) {
                    tracing::info!("{} resolves to {}", domain, target);
                } else {
                    tracing::warn!("{} resolution unclear, keeping it anyway", domain);
                }
            }
            _ => tracing::warn!("could not verify resolution of {}", domain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_domain_validation() {
        let config = DomainsConfig::default();
        assert!(is_lab_domain("machine.htb", &config));
        assert!(is_lab_domain("dev.machine.htb", &config));
        assert!(is_lab_domain("intranet.local", &config));
        assert!(is_lab_domain("files.internal", &config));

        assert!(!is_lab_domain("10.10.11.5", &config));
        assert!(!is_lab_domain("example.com", &config));
        assert!(!is_lab_domain("cdn.w3.org", &config));
        assert!(!is_lab_domain("nodots", &config));
        assert!(!is_lab_domain(".htb", &config));
        assert!(!is_lab_domain("bad_host.htb", &config));
    }

    #[test]
    fn body_extraction_finds_suffixes_and_links() {
        let config = DomainsConfig::default();
        let body = r#"
            <html><head><title>Welcome to machine.htb</title></head>
            <body>
              <a href="http://dev.machine.htb/login">dev</a>
              <script src="https://cdn.jsdelivr.com/x.js"></script>
              <form action="http://10.10.11.5/post"></form>
            </body></html>
        "#;
        let found = extract_candidates(body, &config);
        assert!(found.contains(&"machine.htb".to_string()));
        assert!(found.contains(&"dev.machine.htb".to_string()));
        // public CDN and the raw IP never qualify
        assert!(!found.iter().any(|d| d.contains("jsdelivr")));
        assert!(!found.iter().any(|d| d == "10.10.11.5"));
    }

    #[test]
    fn header_extraction_reads_redirect_targets() {
        let config = DomainsConfig::default();
        let headers =
            "HTTP/1.1 302 Found\r\nLocation: http://portal.machine.htb/\r\nServer: nginx\r\n";
        let found = extract_header_candidates(headers, &config);
        assert_eq!(found, vec!["portal.machine.htb"]);
    }

    #[test]
    fn primary_promotion_follows_configured_rules() {
        let config = DomainsConfig::default();
        let domains = vec![
            "www.machine.htb".to_string(),
            "machine.htb".to_string(),
        ];
        // suffix-match hits www.machine.htb first; its tld matches, so it
        // stays primary under the default rule order
        assert_eq!(select_primary(&domains, &config), Some("www.machine.htb"));

        let mut non_www_first = config.clone();
        non_www_first.promotion = vec!["non-www".to_string()];
        assert_eq!(
            select_primary(&domains, &non_www_first),
            Some("machine.htb")
        );
    }

    #[test]
    fn empty_promotion_list_means_insertion_order() {
        let mut config = DomainsConfig::default();
        config.promotion.clear();
        let domains = vec!["www.box.local".to_string(), "box.local".to_string()];
        assert_eq!(select_primary(&domains, &config), Some("www.box.local"));
        assert_eq!(select_primary(&[], &config), None);
    }

    #[test]
    fn unknown_rules_are_skipped_not_fatal() {
        let mut config = DomainsConfig::default();
        config.promotion = vec!["coin-flip".to_string(), "non-www".to_string()];
        let domains = vec!["www.machine.htb".to_string(), "machine.htb".to_string()];
        assert_eq!(select_primary(&domains, &config), Some("machine.htb"));
    }
}
