//! Runtime configuration.
//!
//! Layers, lowest precedence first: built-in defaults, the optional YAML file
//! named by `FWSYNC_CONFIG` (default `fwsync.yaml`), then environment
//! variables and command-line flags.
//!
//! Loading never fails: an unusable value is reported as a [`ConfigError`] and
//! the layer below it (ultimately the built-in default) is kept.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DEVICE_PREFIX: &str = "network_device_";
pub const DEFAULT_UNRESOLVED_IP: &str = "-";
pub const DEFAULT_HA_URL: &str = "http://supervisor/core";
pub const DEFAULT_FIREWALLA_URL: &str = "http://192.168.1.1:8833";

pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config {path}: {reason}")]
    InvalidFile { path: String, reason: String },
    #[error("{setting} is not a number of seconds: {value:?}")]
    InvalidNumber { setting: &'static str, value: String },
    #[error("{0} must be at least 1 second")]
    ZeroDuration(&'static str),
    #[error("device prefix must not be empty")]
    EmptyPrefix,
}

/// How the allocation type attribute is written to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AllocationEncoding {
    /// `dynamic` / `static`
    #[default]
    Full,
    /// `d` / `s`
    Compact,
}

/// Zone used to render `YYYY-MM-DDTHH:mm:ss` timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeZoneMode {
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub interval_secs: u64,
    pub dry_run: bool,
    pub debug: bool,
    pub device_prefix: String,
    pub unresolved_ip: String,
    pub allocation_encoding: AllocationEncoding,
    pub timezone: TimeZoneMode,
    pub request_timeout_secs: u64,
    pub firewalla_url: String,
    pub firewalla_token: Option<String>,
    pub snapshot: Option<PathBuf>,
    pub ha_url: String,
    /// Set when HA_URL was given explicitly; drives the delete endpoint resolution.
    #[serde(skip)]
    pub ha_url_explicit: bool,
    pub supervisor_token: Option<String>,
    pub ha_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            dry_run: false,
            debug: false,
            device_prefix: DEFAULT_DEVICE_PREFIX.into(),
            unresolved_ip: DEFAULT_UNRESOLVED_IP.into(),
            allocation_encoding: AllocationEncoding::Full,
            timezone: TimeZoneMode::Local,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            firewalla_url: DEFAULT_FIREWALLA_URL.into(),
            firewalla_token: None,
            snapshot: None,
            ha_url: DEFAULT_HA_URL.into(),
            ha_url_explicit: false,
            supervisor_token: None,
            ha_token: None,
        }
    }
}

/// Command line, every option also readable from the environment.
#[derive(Debug, Default, Parser)]
#[command(name = "fwsync", version, about = "Mirror Firewalla hosts into Home Assistant sensors")]
pub struct CliArgs {
    /// YAML configuration file
    #[arg(long, env = "FWSYNC_CONFIG", default_value = "fwsync.yaml")]
    pub config: PathBuf,

    /// Poll interval in seconds
    #[arg(long, env = "FIREWALLA_INTERVAL")]
    pub interval: Option<String>,

    /// Plan one cycle, print the sensors that would be written and exit
    #[arg(long, env = "FIREWALLA_DRY_RUN")]
    pub dry_run: bool,

    #[arg(long, env = "FIREWALLA_DEBUG")]
    pub debug: bool,

    #[arg(long, env = "FIREWALLA_DEVICE_PREFIX")]
    pub device_prefix: Option<String>,

    /// Written in place of an IP that could not be resolved
    #[arg(long, env = "FIREWALLA_UNRESOLVED_IP")]
    pub unresolved_ip: Option<String>,

    #[arg(long, env = "FIREWALLA_ALLOCATION_ENCODING", value_enum)]
    pub allocation_encoding: Option<AllocationEncoding>,

    #[arg(long, env = "FIREWALLA_TIMEZONE", value_enum)]
    pub timezone: Option<TimeZoneMode>,

    /// Per-request timeout in seconds
    #[arg(long, env = "FIREWALLA_REQUEST_TIMEOUT")]
    pub request_timeout: Option<String>,

    #[arg(long, env = "FIREWALLA_URL")]
    pub firewalla_url: Option<String>,

    #[arg(long, env = "FIREWALLA_TOKEN", hide_env_values = true)]
    pub firewalla_token: Option<String>,

    /// Read hosts and speed tests from a JSON snapshot instead of the box
    #[arg(long, env = "FIREWALLA_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    #[arg(long, env = "HA_URL")]
    pub ha_url: Option<String>,

    #[arg(long, env = "SUPERVISOR_TOKEN", hide_env_values = true)]
    pub supervisor_token: Option<String>,

    #[arg(long, env = "HA_TOKEN", hide_env_values = true)]
    pub ha_token: Option<String>,
}

fn parse_secs(setting: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::ZeroDuration(setting)),
        Ok(secs) => Ok(secs),
        Err(_) => Err(ConfigError::InvalidNumber { setting, value: raw.to_string() }),
    }
}

impl Settings {
    /// Defaults, then the YAML file, then flags/environment.
    ///
    /// Returns the settings together with every value that had to be ignored,
    /// for the caller to report once logging is up.
    pub fn load(args: &CliArgs) -> (Self, Vec<ConfigError>) {
        let mut issues = Vec::new();
        let mut settings = Self::from_file(&args.config).unwrap_or_else(|e| {
            issues.push(e);
            Self::default()
        });
        settings.apply_args(args, &mut issues);
        if settings.ha_token.is_none() {
            settings.ha_token = std::env::var("FIREWALLA_HA_TOKEN").ok();
        }
        settings.sanitize(&mut issues);
        (settings, issues)
    }

    /// A missing or empty file yields defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let Ok(txt) = std::fs::read_to_string(path) else {
            return Ok(Self::default());
        };
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut settings = serde_yaml::from_str::<Settings>(&txt).map_err(|e| ConfigError::InvalidFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        settings.ha_url_explicit = settings.ha_url != DEFAULT_HA_URL;
        Ok(settings)
    }

    fn apply_args(&mut self, args: &CliArgs, issues: &mut Vec<ConfigError>) {
        if let Some(raw) = &args.interval {
            match parse_secs("interval", raw) {
                Ok(v) => self.interval_secs = v,
                Err(e) => issues.push(e),
            }
        }
        self.dry_run |= args.dry_run;
        self.debug |= args.debug;
        if let Some(v) = &args.device_prefix {
            self.device_prefix = v.clone();
        }
        if let Some(v) = &args.unresolved_ip {
            self.unresolved_ip = v.clone();
        }
        if let Some(v) = args.allocation_encoding {
            self.allocation_encoding = v;
        }
        if let Some(v) = args.timezone {
            self.timezone = v;
        }
        if let Some(raw) = &args.request_timeout {
            match parse_secs("request timeout", raw) {
                Ok(v) => self.request_timeout_secs = v,
                Err(e) => issues.push(e),
            }
        }
        if let Some(v) = &args.firewalla_url {
            self.firewalla_url = v.clone();
        }
        if args.firewalla_token.is_some() {
            self.firewalla_token = args.firewalla_token.clone();
        }
        if args.snapshot.is_some() {
            self.snapshot = args.snapshot.clone();
        }
        if let Some(v) = &args.ha_url {
            self.ha_url = v.clone();
            self.ha_url_explicit = true;
        }
        if args.supervisor_token.is_some() {
            self.supervisor_token = args.supervisor_token.clone();
        }
        if args.ha_token.is_some() {
            self.ha_token = args.ha_token.clone();
        }
    }

    /// Puts unusable values back to their defaults.
    fn sanitize(&mut self, issues: &mut Vec<ConfigError>) {
        if self.interval_secs == 0 {
            issues.push(ConfigError::ZeroDuration("interval"));
            self.interval_secs = DEFAULT_INTERVAL_SECS;
        }
        if self.request_timeout_secs == 0 {
            issues.push(ConfigError::ZeroDuration("request timeout"));
            self.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
        // An empty prefix would make the orphan cleanup match every sensor.
        if self.device_prefix.is_empty() {
            issues.push(ConfigError::EmptyPrefix);
            self.device_prefix = DEFAULT_DEVICE_PREFIX.into();
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
