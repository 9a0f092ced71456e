//! Daemon configuration.
//!
//! Values come from a TOML file and can be overridden by `VITALS_*`
//! environment variables. Thresholds and every other value are fixed for the
//! lifetime of the process.

use crate::error::ConfigError;
use crate::evaluator::Thresholds;
use crate::history::DEFAULT_MAX_ENTRIES;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/vitals/vitals.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub thresholds: Thresholds,
    pub api: ApiConfig,
    pub chat: ChatConfig,
    pub sinks: Vec<SinkConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_seconds: u64,
    pub max_entries: usize,
    pub history_path: PathBuf,
    /// CPU usage is averaged over this window on every tick.
    pub cpu_sample_ms: u64,
    pub disk_mount: PathBuf,
    pub sink_timeout_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            max_entries: DEFAULT_MAX_ENTRIES,
            history_path: PathBuf::from("server_health_log.json"),
            cpu_sample_ms: 1000,
            disk_mount: PathBuf::from("/"),
            sink_timeout_ms: 10_000,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn cpu_sample(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_ms)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen_addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Role a chat user must hold to run privileged commands.
    pub admin_role: String,
    /// `host:port` probed by the ping command.
    pub ping_target: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            admin_role: "Administrator".to_string(),
            ping_target: "1.1.1.1:53".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    Webhook {
        url: String,
        #[serde(default = "default_sink_timeout_ms")]
        timeout_ms: u64,
    },
    Chat {
        url: String,
        #[serde(default = "default_sink_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        username: Option<String>,
    },
    Console,
}

fn default_sink_timeout_ms() -> u64 {
    5_000
}

impl Config {
    /// Load from `path`, or from the default location when `None`. A missing
    /// file is only an error when the path was given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(err) if !explicit && err.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "[config] {} not found; using built-in defaults",
                    path.display()
                );
                Self::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `VITALS_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("VITALS_INTERVAL_SECONDS") {
            self.monitor.interval_seconds = parse_env("VITALS_INTERVAL_SECONDS", &v)?;
        }
        if let Some(v) = lookup("VITALS_MAX_ENTRIES") {
            self.monitor.max_entries = parse_env("VITALS_MAX_ENTRIES", &v)?;
        }
        if let Some(v) = lookup("VITALS_HISTORY_PATH") {
            self.monitor.history_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("VITALS_CPU_WARN") {
            self.thresholds.cpu_warn = parse_env("VITALS_CPU_WARN", &v)?;
        }
        if let Some(v) = lookup("VITALS_MEM_WARN") {
            self.thresholds.mem_warn = parse_env("VITALS_MEM_WARN", &v)?;
        }
        if let Some(v) = lookup("VITALS_DISK_WARN") {
            self.thresholds.disk_warn = parse_env("VITALS_DISK_WARN", &v)?;
        }
        if let Some(v) = lookup("VITALS_LISTEN_ADDR") {
            self.api.listen_addr = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.interval_seconds == 0 {
            return Err(ConfigError::invalid(
                "monitor.interval_seconds",
                "must be at least 1",
            ));
        }
        if self.monitor.max_entries == 0 {
            return Err(ConfigError::invalid(
                "monitor.max_entries",
                "must be at least 1",
            ));
        }
        if self.monitor.history_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("monitor.history_path", "must not be empty"));
        }

        let t = &self.thresholds;
        for (key, value) in [
            ("thresholds.cpu_warn", t.cpu_warn),
            ("thresholds.mem_warn", t.mem_warn),
            ("thresholds.disk_warn", t.disk_warn),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::invalid(
                    key,
                    format!("{value} is not a percentage"),
                ));
            }
        }

        for sink in &self.sinks {
            match sink {
                SinkConfig::Webhook { url, .. } | SinkConfig::Chat { url, .. }
                    if url.trim().is_empty() =>
                {
                    return Err(ConfigError::invalid("sinks.url", "must not be empty"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, format!("cannot parse {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_the_reference_setup() {
        let cfg = Config::default();
        assert_eq!(cfg.monitor.interval_seconds, 300);
        assert_eq!(cfg.monitor.max_entries, 100);
        assert_eq!(cfg.monitor.history_path, PathBuf::from("server_health_log.json"));
        assert_eq!(cfg.thresholds, Thresholds::default());
        assert_eq!(cfg.api.listen_addr, "127.0.0.1:3000");
        assert!(cfg.sinks.is_empty());
        cfg.validate().unwrap();
    }

    #[test]
    fn parses_full_file() {
        let cfg = Config::from_toml(
            r#"
            [monitor]
            interval_seconds = 60
            max_entries = 500
            history_path = "/var/lib/vitals/history.json"

            [thresholds]
            cpu_warn = 75.0

            [chat]
            admin_role = "ops"

            [[sinks]]
            kind = "webhook"
            url = "http://localhost:9000/hook"

            [[sinks]]
            kind = "chat"
            url = "https://chat.example/api/webhooks/1/abc"
            username = "vitals"
            timeout_ms = 2000

            [[sinks]]
            kind = "console"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.monitor.interval(), Duration::from_secs(60));
        assert_eq!(cfg.monitor.max_entries, 500);
        assert_eq!(cfg.monitor.cpu_sample_ms, 1000);
        assert_eq!(cfg.thresholds.cpu_warn, 75.0);
        assert_eq!(cfg.thresholds.mem_warn, 90.0);
        assert_eq!(cfg.chat.admin_role, "ops");
        assert_eq!(
            cfg.sinks,
            vec![
                SinkConfig::Webhook {
                    url: "http://localhost:9000/hook".into(),
                    timeout_ms: 5_000,
                },
                SinkConfig::Chat {
                    url: "https://chat.example/api/webhooks/1/abc".into(),
                    timeout_ms: 2_000,
                    username: Some("vitals".into()),
                },
                SinkConfig::Console,
            ]
        );
        cfg.validate().unwrap();
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("VITALS_INTERVAL_SECONDS", "15"),
            ("VITALS_CPU_WARN", "50"),
            ("VITALS_HISTORY_PATH", "/tmp/h.json"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.monitor.interval_seconds, 15);
        assert_eq!(cfg.thresholds.cpu_warn, 50.0);
        assert_eq!(cfg.monitor.history_path, PathBuf::from("/tmp/h.json"));
    }

    #[test]
    fn bad_env_value_is_reported() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_overrides(|k| (k == "VITALS_MAX_ENTRIES").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("VITALS_MAX_ENTRIES"));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = Config::default();
        cfg.thresholds.disk_warn = 120.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.monitor.interval_seconds = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.monitor.max_entries = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.sinks.push(SinkConfig::Webhook {
            url: " ".into(),
            timeout_ms: 1,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/vitals.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn loads_from_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[monitor]\nmax_entries = 7\n").unwrap();
        let cfg = Config::load(Some(file.path())).unwrap();
        assert_eq!(cfg.monitor.max_entries, 7);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[monitor\n").unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
