//! Provisioner configuration.
//!
//! Settings come from an optional TOML file; command-line flags given to
//! `fileprov start` override it and missing keys fall back to defaults.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use fileprov_engine::EngineConfig;
use fileprov_protocol::constants::{DEFAULT_DISK_PATH, DEFAULT_PORT, HTTP_TIMEOUT};
use fileprov_server::ServerConfig;
use serde::{Deserialize, Serialize};

use crate::cli::StartArgs;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Status API listen address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Disk root holding the identity file and the work directory.
    #[serde(default = "default_disk_path")]
    pub disk_path: PathBuf,

    /// A pull with no data for this long fails.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// How long to keep serving after success when no close arrives.
    #[serde(default = "default_linger_secs")]
    pub linger_secs: u64,

    /// Upload progress sampling interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_listen() -> SocketAddr {
    ([0, 0, 0, 0], DEFAULT_PORT).into()
}

fn default_disk_path() -> PathBuf {
    PathBuf::from(DEFAULT_DISK_PATH)
}

fn default_idle_timeout_secs() -> u64 {
    HTTP_TIMEOUT.as_secs()
}

fn default_linger_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            disk_path: default_disk_path(),
            idle_timeout_secs: default_idle_timeout_secs(),
            linger_secs: default_linger_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Config {
    /// Reads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn apply_overrides(&mut self, args: &StartArgs) {
        if let Some(listen) = args.listen {
            self.listen = listen;
        }
        if let Some(disk_path) = &args.disk_path {
            self.disk_path = disk_path.clone();
        }
        if let Some(secs) = args.idle_timeout_secs {
            self.idle_timeout_secs = secs;
        }
        if let Some(secs) = args.linger_secs {
            self.linger_secs = secs;
        }
    }

    pub fn linger(&self) -> Duration {
        Duration::from_secs(self.linger_secs)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            disk_path: self.disk_path.clone(),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..EngineConfig::default()
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            listen: self.listen,
        }
    }
}

/// Turns `KEY=VALUE` entries into a map. The split is at the first `=`,
/// so values may contain `=` themselves.
pub fn parse_parameters(entries: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut parameters = HashMap::with_capacity(entries.len());
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            anyhow::bail!("invalid parameter {entry:?}: expected KEY=VALUE");
        };
        if key.is_empty() {
            anyhow::bail!("invalid parameter {entry:?}: empty key");
        }
        parameters.insert(key.to_string(), value.to_string());
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileprov_protocol::SourceType;

    fn start_args() -> StartArgs {
        StartArgs {
            listen: None,
            file_name: "f.img".into(),
            source_type: SourceType::Upload,
            parameters: Vec::new(),
            disk_path: None,
            idle_timeout_secs: None,
            linger_secs: None,
            config: None,
        }
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.listen, "0.0.0.0:8001".parse().unwrap());
        assert_eq!(config.disk_path, PathBuf::from("/data/"));
        assert_eq!(config.idle_timeout_secs, 60);
        assert_eq!(config.linger_secs, 30);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn load_without_path_is_default() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fileprov.toml");
        std::fs::write(&path, "disk_path = \"/mnt/disk1\"\npoll_interval_ms = 250\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.disk_path, PathBuf::from("/mnt/disk1"));
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.listen, default_listen());
        assert_eq!(config.linger_secs, 30);
    }

    #[test]
    fn load_reports_bad_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "listen = 42").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));

        let err = Config::load(Some(&tmp.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = Config {
            listen: "127.0.0.1:9000".parse().unwrap(),
            disk_path: PathBuf::from("/var/lib/disk"),
            idle_timeout_secs: 5,
            linger_secs: 0,
            poll_interval_ms: 100,
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn flags_override_file() {
        let mut config = Config {
            linger_secs: 99,
            ..Config::default()
        };
        let args = StartArgs {
            listen: Some("127.0.0.1:1234".parse().unwrap()),
            idle_timeout_secs: Some(7),
            ..start_args()
        };
        config.apply_overrides(&args);

        assert_eq!(config.listen, "127.0.0.1:1234".parse().unwrap());
        assert_eq!(config.idle_timeout_secs, 7);
        assert_eq!(config.linger_secs, 99);
        assert_eq!(config.disk_path, default_disk_path());
    }

    #[test]
    fn engine_config_carries_tunables() {
        let config = Config {
            idle_timeout_secs: 3,
            poll_interval_ms: 50,
            ..Config::default()
        };
        let engine = config.engine_config();
        assert_eq!(engine.idle_timeout, Duration::from_secs(3));
        assert_eq!(engine.poll_interval, Duration::from_millis(50));
        assert_eq!(engine.disk_path, config.disk_path);
        assert_eq!(config.server_config().listen, config.listen);
    }

    #[test]
    fn parameters_split_at_first_equals() {
        let params = parse_parameters(&[
            "url=http://h/f?a=1&b=2".to_string(),
            "empty=".to_string(),
        ])
        .unwrap();
        assert_eq!(params["url"], "http://h/f?a=1&b=2");
        assert_eq!(params["empty"], "");
    }

    #[test]
    fn parameters_reject_malformed_entries() {
        assert!(parse_parameters(&["novalue".to_string()]).is_err());
        assert!(parse_parameters(&["=value".to_string()]).is_err());
        assert!(parse_parameters(&[]).unwrap().is_empty());
    }
}
