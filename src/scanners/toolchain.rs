use crate::scanners::catalog::ScanStage;
use which::which;

/// Helpers the pipeline shells out to besides the stage tools themselves.
const HELPER_TOOLS: &[&str] = &["curl", "nslookup"];

/// Preflight check over the selected stages' tools. Missing tools are only a
/// warning: the affected stage records its own terminal outcome later.
pub fn report_missing(stages: &[&'static ScanStage]) -> Vec<&'static str> {
    let mut tools: Vec<&'static str> = Vec::new();
    for stage in stages {
        if !tools.contains(&stage.tool) {
            tools.push(stage.tool);
        }
    }
    for helper in HELPER_TOOLS {
        if !tools.contains(helper) {
            tools.push(helper);
        }
    }

    let mut missing = Vec::new();
    for tool in tools {
        match which(tool) {
            Ok(path) => tracing::debug!("Found {}: {:?}", tool, path),
            Err(_) => {
                tracing::warn!("{} not found; its stage will be recorded as such", tool);
                missing.push(tool);
            }
        }
    }

    missing
}
