//! Configuration for tailgate
//!
//! A TOML file (path in `TAILGATE_CONFIG`) describes the fleet and the
//! normalization rules; `TAILGATE_*` environment variables override the
//! scalars and can stand in for the file entirely via the compact
//! `host[?key]:file` spec syntax. Loaded once at startup, immutable
//! thereafter.

use crate::error::{Result, TailgateError};
use crate::worker::RestartPolicy;
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration for tailgate
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listen address for the poll endpoint
    pub listen_addr: SocketAddr,

    /// Retention window for buffered hits, in seconds
    pub retention_window_secs: f64,

    /// Lookback applied when a poll carries no usable `since`, in seconds
    pub default_lookback_secs: f64,

    /// Reconnect delay for dead line sources; absent means never reconnect
    pub reconnect_delay_secs: Option<u64>,

    /// Log level
    pub log_level: String,

    /// Log format (json or pretty)
    pub log_format: LogFormat,

    /// Global normalization rules, overridable per host
    pub normalize: NormalizeConfig,

    /// The fleet to tail
    pub hosts: Vec<HostConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Normalization toggles in their configuration form; compiled into
/// [`crate::normalize::NormalizeRules`] at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub trim_query_strings: bool,
    pub ips_as_subnets: bool,
    pub url_renames: Vec<RenameRule>,
    pub keep_status_and_size: bool,
}

/// One URL substitution rule, applied in listed order
#[derive(Debug, Clone, Deserialize)]
pub struct RenameRule {
    pub pattern: String,
    pub replacement: String,
}

/// One remote host to tail
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// ssh target
    pub host: String,
    /// Remote file path to follow
    pub file: String,
    /// Optional ssh identity file
    #[serde(default)]
    pub key: Option<String>,
    /// Per-host normalization override; falls back to the global rules
    #[serde(default)]
    pub normalize: Option<NormalizeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8040)),
            retention_window_secs: 30.0,
            default_lookback_secs: 10.0,
            reconnect_delay_secs: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            normalize: NormalizeConfig::default(),
            hosts: Vec::new(),
        }
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            trim_query_strings: true,
            ips_as_subnets: true,
            url_renames: Vec::new(),
            keep_status_and_size: true,
        }
    }
}

impl HostConfig {
    /// Parse the compact `host[?key]:file` spec used by `TAILGATE_HOSTS`.
    pub fn parse_spec(spec: &str) -> Result<Self> {
        let (target, file) = spec.split_once(':').ok_or_else(|| {
            TailgateError::Config(format!("invalid host spec '{spec}': expected host[?key]:file"))
        })?;

        let (host, key) = match target.split_once('?') {
            Some((host, key)) => (host, Some(key.to_string())),
            None => (target, None),
        };

        if host.is_empty() || file.is_empty() {
            return Err(TailgateError::Config(format!(
                "invalid host spec '{spec}': empty host or file"
            )));
        }

        Ok(Self {
            host: host.to_string(),
            file: file.to_string(),
            key,
            normalize: None,
        })
    }
}

impl Config {
    /// Load configuration: TOML file when `TAILGATE_CONFIG` is set,
    /// defaults otherwise, environment overrides on top in both cases.
    pub fn load() -> Result<Self> {
        let mut config = match env::var("TAILGATE_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a TOML configuration file.
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| TailgateError::Config(format!("cannot read {path}: {e}")))?;
        toml::from_str(&raw)
            .map_err(|e| TailgateError::Config(format!("cannot parse {path}: {e}")))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = env::var("TAILGATE_LISTEN_ADDR") {
            self.listen_addr = addr
                .parse()
                .map_err(|e| TailgateError::Config(format!("invalid TAILGATE_LISTEN_ADDR: {e}")))?;
        }

        if let Ok(secs) = env::var("TAILGATE_RETENTION_SECS") {
            self.retention_window_secs = secs.parse().map_err(|e| {
                TailgateError::Config(format!("invalid TAILGATE_RETENTION_SECS: {e}"))
            })?;
        }

        if let Ok(secs) = env::var("TAILGATE_LOOKBACK_SECS") {
            self.default_lookback_secs = secs.parse().map_err(|e| {
                TailgateError::Config(format!("invalid TAILGATE_LOOKBACK_SECS: {e}"))
            })?;
        }

        if let Ok(secs) = env::var("TAILGATE_RECONNECT_SECS") {
            self.reconnect_delay_secs = Some(secs.parse().map_err(|e| {
                TailgateError::Config(format!("invalid TAILGATE_RECONNECT_SECS: {e}"))
            })?);
        }

        if let Ok(level) = env::var("TAILGATE_LOG_LEVEL") {
            self.log_level = level;
        }

        if let Ok(format) = env::var("TAILGATE_LOG_FORMAT") {
            self.log_format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(TailgateError::Config(format!(
                        "invalid TAILGATE_LOG_FORMAT: {other} (expected 'json' or 'pretty')"
                    )));
                }
            };
        }

        if let Ok(specs) = env::var("TAILGATE_HOSTS") {
            self.hosts = specs
                .split(',')
                .filter(|spec| !spec.trim().is_empty())
                .map(|spec| HostConfig::parse_spec(spec.trim()))
                .collect::<Result<Vec<_>>>()?;
        }

        Ok(())
    }

    /// Retention window as a Duration
    pub fn retention_window(&self) -> Duration {
        Duration::from_secs_f64(self.retention_window_secs)
    }

    /// Worker restart policy derived from `reconnect_delay_secs`
    pub fn restart_policy(&self) -> RestartPolicy {
        match self.reconnect_delay_secs {
            Some(secs) => RestartPolicy::FixedDelay(Duration::from_secs(secs)),
            None => RestartPolicy::Never,
        }
    }

    /// Normalization config for one host: its override, or the global set
    pub fn normalize_for<'a>(&'a self, host: &'a HostConfig) -> &'a NormalizeConfig {
        host.normalize.as_ref().unwrap_or(&self.normalize)
    }
}
