//! TOML configuration (§10.4), layered under CLI flags: CLI always wins.
//! Config covers the Art-Net network identity and the daemon's default
//! merge policy; everything else (logging, signals) is CLI/runtime-only.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use dmxd_core::MergeMode;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub bind_address: Option<Ipv4Addr>,
    pub always_broadcast: Option<bool>,
    pub use_limited_broadcast_address: Option<bool>,
    pub broadcast_threshold: Option<usize>,
    pub preferences_dir: Option<PathBuf>,
    pub default_merge_mode: Option<String>,
}

/// Fully resolved configuration: file values with built-in defaults where
/// the file is absent or silent on a key. CLI flags are applied by the
/// caller on top of this (§10.4's "CLI flags always win").
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: Ipv4Addr,
    pub always_broadcast: bool,
    pub use_limited_broadcast_address: bool,
    pub broadcast_threshold: usize,
    pub preferences_dir: PathBuf,
    pub default_merge_mode: MergeMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            always_broadcast: false,
            use_limited_broadcast_address: true,
            broadcast_threshold: dmxd_artnet::NodeConfig::default().broadcast_threshold,
            preferences_dir: dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("dmxd"),
            default_merge_mode: MergeMode::Htp,
        }
    }
}

impl Config {
    /// Loads `path` if it exists, falling back silently to defaults
    /// otherwise — an absent config file is not an error (§10.4 describes
    /// it as optional).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if !path.exists() {
            return Ok(config);
        }
        let contents = std::fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&contents)?;
        if let Some(v) = file.bind_address {
            config.bind_address = v;
        }
        if let Some(v) = file.always_broadcast {
            config.always_broadcast = v;
        }
        if let Some(v) = file.use_limited_broadcast_address {
            config.use_limited_broadcast_address = v;
        }
        if let Some(v) = file.broadcast_threshold {
            config.broadcast_threshold = v;
        }
        if let Some(v) = file.preferences_dir {
            config.preferences_dir = v;
        }
        if let Some(v) = file.default_merge_mode {
            config.default_merge_mode = match v.to_ascii_lowercase().as_str() {
                "ltp" => MergeMode::Ltp,
                _ => MergeMode::Htp,
            };
        }
        Ok(config)
    }

    /// Default config file location: `$XDG_CONFIG_HOME/dmxd/config.toml`
    /// (or platform equivalent via `dirs`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dmxd")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/dmxd.toml")).unwrap();
        assert_eq!(config.bind_address, Ipv4Addr::UNSPECIFIED);
        assert_eq!(config.default_merge_mode, MergeMode::Htp);
    }

    #[test]
    fn partial_file_only_overrides_present_keys() {
        let dir = std::env::temp_dir().join("dmxd-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "always_broadcast = true\ndefault_merge_mode = \"ltp\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert!(config.always_broadcast);
        assert_eq!(config.default_merge_mode, MergeMode::Ltp);
        assert!(config.use_limited_broadcast_address);
        std::fs::remove_file(&path).ok();
    }
}
