use regex::Regex;
use std::collections::BTreeSet;

/// Ports parsed out of one port-scan artifact.
#[derive(Debug, Clone, Default)]
pub struct PortReport {
    pub open: BTreeSet<u16>,
    pub web: BTreeSet<u16>,
}

impl PortReport {
    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.web.is_empty()
    }
}

/// Ports assumed web-capable regardless of what the scanner called them.
pub const CONVENTIONAL_WEB_PORTS: &[u16] = &[
    80, 443, 8080, 8443, 8000, 8888, 9000, 3000, 5000, 8008, 8181, 9090,
];

/// Secondary table: ports where an unresolved service is still worth treating
/// as web (alt-http conventions, admin panels, proxies).
const SUSPECT_WEB_PORTS: &[u16] = &[
    81, 591, 2082, 2087, 4243, 7000, 7396, 8001, 8014, 8042, 8069, 8081, 8090, 8118, 8123, 8500,
    9080, 9091, 9200, 9443, 10000, 16080,
];

const WEB_SERVICE_KEYWORDS: &[&str] = &[
    "http",
    "https",
    "ssl",
    "tls",
    "nginx",
    "apache",
    "lighttpd",
    "tomcat",
    "jetty",
    "websphere",
    "weblogic",
    "iis",
    "httpd",
    "www",
    "web",
    "proxy",
];

/// Pull open ports and web-capable ports out of scanner output. Tool output
/// formats drift across versions, so a line that matches no layout is simply
/// no data — never an error.
pub fn extract(artifact: &str) -> PortReport {
    let layouts = [
        // "80/tcp   open  http Apache httpd 2.4.52"
        r"(?m)^\s*(\d{1,5})/(?:tcp|udp)\s+open\s+(\S+)",
        // "8000/tcp open" with no service column at all
        r"(?m)^\s*(\d{1,5})/(?:tcp|udp)\s+open\s*$",
        // "Discovered open port 8080/tcp on 10.10.11.5"
        r"(?mi)\bDiscovered open port (\d{1,5})/(?:tcp|udp)",
    ];

    let mut report = PortReport::default();
    let mut services: Vec<(u16, Option<String>)> = Vec::new();

    for layout in layouts {
        let re = Regex::new(layout).expect("static port layout pattern");
        for cap in re.captures_iter(artifact) {
            let Ok(port) = cap[1].parse::<u16>() else {
                continue;
            };
            if port == 0 {
                continue;
            }
            let service = cap.get(2).map(|m| m.as_str().to_ascii_lowercase());
            if !services.iter().any(|(p, _)| *p == port) {
                services.push((port, service));
            }
        }
    }

    for (port, service) in &services {
        report.open.insert(*port);
        if classify_web(*port, service.as_deref()) {
            report.web.insert(*port);
        }
    }

    if !report.open.is_empty() {
        tracing::debug!(
            "extracted {} open port(s), {} classified web",
            report.open.len(),
            report.web.len()
        );
    }

    report
}

/// Over-inclusive by design: a false positive costs one fast tool failure,
/// a false negative silently loses findings.
fn classify_web(port: u16, service: Option<&str>) -> bool {
    if CONVENTIONAL_WEB_PORTS.contains(&port) {
        return true;
    }

    match service {
        Some(name) if !is_unresolved(name) => WEB_SERVICE_KEYWORDS
            .iter()
            .any(|keyword| name.contains(keyword)),
        _ => SUSPECT_WEB_PORTS.contains(&port),
    }
}

fn is_unresolved(service: &str) -> bool {
    service.is_empty() || service == "unknown" || service == "tcpwrapped"
}

/// True when a probe response opens with a well-formed HTTP status line.
pub fn classify_probe(response: &str) -> bool {
    let re = Regex::new(r"^HTTP/\d(?:\.\d)?\s+\d{3}").expect("static status-line pattern");
    response
        .lines()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| re.is_match(l.trim()))
}
