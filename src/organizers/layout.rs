use crate::core::models::RunDirs;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub fn prepare_run_dirs(base: &Path, run_id: &str) -> Result<RunDirs> {
    let root = base.join("runs").join(run_id);

    let dirs = RunDirs {
        root: root.clone(),
        scans: root.join("scans"),
        report: root.join("report"),
        logs: base.join("logs"),
    };

    for dir in [&dirs.root, &dirs.scans, &dirs.report, &dirs.logs] {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {:?}", dir))?;
    }

    verify_writable(&dirs.scans)?;

    Ok(dirs)
}

fn verify_writable(path: &Path) -> Result<()> {
    let test_file = path.join(".write_test");
    fs::write(&test_file, b"test")
        .with_context(|| format!("Directory not writable: {:?}", path))?;
    fs::remove_file(&test_file)
        .with_context(|| format!("Failed to remove test file: {:?}", test_file))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn run_dirs_are_created_and_writable() {
        let tmp = TempDir::new().unwrap();
        let dirs = prepare_run_dirs(tmp.path(), "scan_test_1").unwrap();

        assert!(dirs.scans.is_dir());
        assert!(dirs.report.is_dir());
        assert!(dirs.logs.is_dir());
        assert!(dirs.root.ends_with("runs/scan_test_1"));
    }
}
