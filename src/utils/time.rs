use regex::Regex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn new_run_id(target: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs();

    format!("scan_{}_{}", sanitize_target(target), timestamp)
}

fn sanitize_target(target: &str) -> String {
    // Replace characters that aren't safe for filenames
    let re = Regex::new(r"[^a-zA-Z0-9\-_\.]").unwrap();
    re.replace_all(target, "_").to_string()
}

/// Human-readable duration for summaries: "42s", "3m 07s", "1h 02m".
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_embed_sanitized_target() {
        let id = new_run_id("10.10.11.5");
        assert!(id.starts_with("scan_10.10.11.5_"));

        let id = new_run_id("weird host!");
        assert!(id.starts_with("scan_weird_host__"));
    }

    #[test]
    fn durations_format_by_magnitude() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(187)), "3m 07s");
        assert_eq!(format_duration(Duration::from_secs(3720)), "1h 02m");
    }
}
