use crate::config::GlobalConfig;
use crate::core::state::RunState;
use crate::discovery::domains;
use crate::scanners::catalog;
use crate::utils::fs::atomic_write;
use crate::utils::time::format_duration;
use anyhow::Result;
use minijinja::{context, Environment};
use serde::Serialize;

const SUMMARY_TEMPLATE: &str = r#"# ipscout Summary Report

**Target:** {{ target }}
**Run ID:** {{ run_id }}
**Date:** {{ scan_date }}
**Total Duration:** {{ duration }}

## Stage Outcomes

| Stage | Status | Duration | Artifact |
|-------|--------|----------|----------|
{% for row in rows -%}
| {{ row.label }} | {{ row.status }} | {{ row.duration }} | {{ row.artifact }} |
{% endfor %}
## Port Inventory

{% if open_ports -%}
Open ports: {{ open_ports }}

Web-capable: {% if web_ports %}{{ web_ports }}{% else %}none{% endif %}
{%- else -%}
No open ports discovered.
{%- endif %}

## Discovered Domains

{% if domains -%}
{% for domain in domains -%}
- {{ domain }}{% if domain == primary %} (primary){% endif %}
{% endfor -%}
{%- else -%}
None.
{%- endif %}
{% if notes %}
## Notes

{% for note in notes -%}
- **{{ note.label }}**: {{ note.detail }}
{% endfor %}
{%- endif %}"#;

#[derive(Serialize)]
struct ReportRow {
    label: &'static str,
    status: String,
    duration: String,
    artifact: String,
}

#[derive(Serialize)]
struct ReportNote {
    label: &'static str,
    detail: String,
}

/// The one reporting handoff, run exactly once after the pipeline finishes
/// or halts: a markdown overview plus a machine-readable snapshot.
pub fn write_all(
    state: &RunState,
    config: &GlobalConfig,
    start_time: std::time::Instant,
) -> Result<()> {
    let dirs = state
        .dirs
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("run state carries no directories"))?;

    write_markdown_summary(state, config, start_time)?;

    let json = serde_json::to_string_pretty(state)?;
    atomic_write(dirs.report.join("summary.json"), json.as_bytes())?;

    Ok(())
}

fn write_markdown_summary(
    state: &RunState,
    config: &GlobalConfig,
    start_time: std::time::Instant,
) -> Result<()> {
    let dirs = state.dirs.as_ref().expect("checked by write_all");
    let env = Environment::new();
    let template = env.template_from_str(SUMMARY_TEMPLATE)?;

    let rows: Vec<ReportRow> = state
        .outcomes
        .iter()
        .map(|(kind, outcome)| ReportRow {
            label: catalog::stage(*kind).label,
            status: outcome.status.label().to_string(),
            duration: format_duration(outcome.duration()),
            artifact: outcome
                .artifact
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    // Skip reasons and remediation hints, one line per affected stage
    let notes: Vec<ReportNote> = state
        .outcomes
        .iter()
        .filter_map(|(kind, outcome)| {
            outcome.detail.as_ref().map(|detail| ReportNote {
                label: catalog::stage(*kind).label,
                detail: detail.replace('\n', "; "),
            })
        })
        .collect();

    let join_ports = |ports: &std::collections::BTreeSet<u16>| {
        ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let primary = domains::select_primary(&state.domains, &config.domains).unwrap_or_default();

    let rendered = template.render(context! {
        target => &state.target,
        run_id => &state.run_id,
        scan_date => chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        duration => format_duration(start_time.elapsed()),
        rows => rows,
        open_ports => join_ports(&state.inventory.open),
        web_ports => join_ports(&state.inventory.web),
        domains => &state.domains,
        primary => primary,
        notes => notes,
        version => env!("CARGO_PKG_VERSION"),
    })?;

    atomic_write(dirs.report.join("summary.md"), rendered.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::Event;
    use crate::core::models::{OutcomeStatus, RunDirs, ScanOutcome, Target};
    use crate::discovery::ports::PortReport;
    use crate::scanners::catalog::StageKind;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn reported_state(tmp: &TempDir) -> RunState {
        let dirs = RunDirs {
            root: tmp.path().to_path_buf(),
            scans: tmp.path().join("scans"),
            report: tmp.path().join("report"),
            logs: tmp.path().join("logs"),
        };
        let target = Target::new("10.10.11.5", "scan_test", &dirs).unwrap();
        let mut state = RunState::new(&target, &dirs);

        let mut report = PortReport::default();
        report.open.extend([22, 80]);
        report.web.insert(80);
        state.on_event(Event::PortsDiscovered(report));
        state.on_event(Event::DomainDiscovered("machine.htb".to_string()));

        state.on_event(Event::StageFinished(
            StageKind::NmapQuick,
            ScanOutcome::finished(
                OutcomeStatus::Succeeded,
                Duration::from_secs(12),
                Some(dirs.scans.join("nmap_quick.txt")),
                1024,
                Some(0),
            ),
        ));
        state.on_event(Event::StageFinished(
            StageKind::Nikto,
            ScanOutcome::precondition_skip("no web-capable ports discovered"),
        ));
        state
    }

    #[test]
    fn summary_files_cover_every_stage_once() {
        let tmp = TempDir::new().unwrap();
        let config = GlobalConfig::default();
        let state = reported_state(&tmp);

        write_all(&state, &config, Instant::now()).unwrap();

        let md = std::fs::read_to_string(tmp.path().join("report/summary.md")).unwrap();
        assert!(md.contains("| Nmap Quick Scan | completed |"));
        assert!(md.contains("| Nikto Web Scan | skipped |"));
        assert!(md.contains("Open ports: 22, 80"));
        assert!(md.contains("machine.htb (primary)"));
        assert!(md.contains("PreconditionUnmet"));

        let json = std::fs::read_to_string(tmp.path().join("report/summary.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["target"], "10.10.11.5");
        assert_eq!(value["outcomes"].as_array().unwrap().len(), 2);
    }
}
