use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/v6watch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Maximum number of capability checks running at once (admission pool
    /// capacity).
    pub max_concurrent_checks: usize,
    /// Upper bound in seconds on one probe request, connect through body.
    pub probe_timeout_secs: u64,
    /// Window in days for the certificate-expiry report.
    pub expiry_warning_days: i64,
    /// Row limit for listing/search output.
    pub list_limit: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checks: 10,
            probe_timeout_secs: 15,
            expiry_warning_days: 30,
            list_limit: 20,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("v6watch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<WatchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = WatchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: WatchConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = WatchConfig::default();
        assert_eq!(cfg.max_concurrent_checks, 10);
        assert_eq!(cfg.probe_timeout_secs, 15);
        assert_eq!(cfg.expiry_warning_days, 30);
        assert_eq!(cfg.list_limit, 20);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = WatchConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: WatchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_concurrent_checks, cfg.max_concurrent_checks);
        assert_eq!(parsed.probe_timeout_secs, cfg.probe_timeout_secs);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_concurrent_checks = 4
            probe_timeout_secs = 5
            expiry_warning_days = 14
            list_limit = 50
        "#;
        let cfg: WatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent_checks, 4);
        assert_eq!(cfg.probe_timeout_secs, 5);
        assert_eq!(cfg.expiry_warning_days, 14);
        assert_eq!(cfg.list_limit, 50);
    }
}
