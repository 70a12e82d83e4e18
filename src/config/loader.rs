use super::types::GlobalConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./ipscout.toml",
    "~/.config/ipscout/config.toml",
    "/etc/ipscout/config.toml",
];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the default search path with fallbacks.
    #[allow(dead_code)]
    pub fn load() -> Result<GlobalConfig> {
        Self::load_with_custom_path(None)
    }

    /// Load configuration, preferring an explicit path when given.
    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<GlobalConfig> {
        if let Some(path) = custom_path {
            if path.exists() {
                return Self::load_from_file(path)
                    .with_context(|| format!("Failed to load config from custom path: {:?}", path));
            }
            tracing::warn!(
                "Custom config path does not exist: {:?}, falling back to defaults",
                path
            );
        }

        for default_path in DEFAULT_CONFIG_PATHS {
            let path = Self::expand_path(default_path);
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from: {:?}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                        continue;
                    }
                }
            }
        }

        tracing::info!("No configuration file found, using default settings");
        Ok(GlobalConfig::default())
    }

    fn load_from_file(path: &Path) -> Result<GlobalConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: GlobalConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {:?}", path))?;

        Self::validate_config(&config)?;

        Ok(config)
    }

    fn validate_config(config: &GlobalConfig) -> Result<()> {
        if config.general.default_timeout_secs == 0 {
            anyhow::bail!("general.default_timeout_secs must be greater than 0");
        }

        if config.general.poll_interval_ms == 0 {
            anyhow::bail!("general.poll_interval_ms must be greater than 0");
        }

        if config.domains.suffixes.is_empty() {
            anyhow::bail!("domains.suffixes cannot be empty");
        }

        if config.web.probe_max_time_secs == 0 {
            anyhow::bail!("web.probe_max_time_secs must be greater than 0");
        }

        Ok(())
    }

    /// Expand paths with a leading tilde.
    fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(rest);
            }
        }
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_when_no_file_present() {
        let config = GlobalConfig::default();
        assert_eq!(config.general.default_timeout_secs, 900);
        assert_eq!(config.general.poll_interval_ms, 100);
        assert_eq!(config.domains.suffixes, vec!["htb", "local", "thm", "box"]);
    }

    #[test]
    fn custom_file_overrides_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
[general]
default_timeout_secs = 120
grace_period_secs = 2
poll_interval_ms = 50

[timeouts]
nmap_full = 2400

[domains]
suffixes = ["htb"]
promotion = ["non-www"]
hosts_path = "/tmp/hosts"
verify_resolution = false
"#;
        fs::write(&temp_file, config_content).unwrap();

        let config = ConfigLoader::load_with_custom_path(Some(temp_file.path())).unwrap();
        assert_eq!(config.general.default_timeout_secs, 120);
        assert_eq!(config.timeouts.nmap_full, Some(2400));
        assert_eq!(config.domains.suffixes, vec!["htb"]);
        assert_eq!(config.domains.hosts_path.to_str(), Some("/tmp/hosts"));
        // Untouched sections keep their defaults
        assert_eq!(config.nmap.quick_top_ports, 1000);
    }

    #[test]
    fn stage_timeout_falls_back_to_default() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(&temp_file, "[timeouts]\nnmap_full = 2400\n").unwrap();

        let config = ConfigLoader::load_with_custom_path(Some(temp_file.path())).unwrap();
        use crate::scanners::catalog::StageKind;
        assert_eq!(
            config.stage_timeout(StageKind::NmapFull).as_secs(),
            2400
        );
        assert_eq!(config.stage_timeout(StageKind::Nikto).as_secs(), 900);
    }

    #[test]
    fn validation_rejects_zero_timeout() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(&temp_file, "[general]\ndefault_timeout_secs = 0\ngrace_period_secs = 5\npoll_interval_ms = 100\n").unwrap();

        let result = ConfigLoader::load_with_custom_path(Some(temp_file.path()));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("default_timeout_secs must be greater than 0"));
    }
}
