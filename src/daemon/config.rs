//! Configuration management for daemon mode
//!
//! Handles TOML configuration parsing, defaults and validation

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::compliance::EmptyRunPolicy;
use crate::constants::{
    APP_NAME, CONFIG_FILE_NAME, DEFAULT_CHECKER, DEFAULT_CONVERTER, DEFAULT_DRIFT_INTERVAL,
    DEFAULT_FORCED_POLL_INTERVAL, DEFAULT_FULL_SWEEP_INTERVAL, DEFAULT_TOOL_TIMEOUT_SECS,
    DRIFT_INTERVAL_MAX, DRIFT_INTERVAL_MIN, FORCED_POLL_INTERVAL_MAX, FORCED_POLL_INTERVAL_MIN,
    FULL_SWEEP_INTERVAL_MAX, FULL_SWEEP_INTERVAL_MIN,
};
use crate::tooling::ToolSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Note: bounds must match the *_MIN/*_MAX constants in constants.rs
    #[error("Invalid {name}: {value}. Must be between {min} and {max} seconds")]
    InvalidInterval {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid log level '{0}'. Expected one of: error, warn, info, debug, trace")]
    InvalidLogLevel(String),

    #[error("{0} command must not be empty")]
    EmptyCommand(String),

    #[error("Tool timeout must be at least 1 second")]
    InvalidTimeout,

    #[error("Resource type '{0}' is configured more than once")]
    DuplicateResourceType(String),

    #[error("Cannot determine the user's {0} directory")]
    NoHomeDirectory(&'static str),

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Main daemon configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfiguration {
    pub daemon: DaemonSettings,
    pub storage: StorageSettings,
    pub objects: ObjectSettings,
    pub tools: ToolConfig,
    pub compliance: ComplianceSettings,
    pub notifications: NotificationSettings,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceSource>,
}

/// Core daemon runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Default filter when RUST_LOG is unset
    pub log_level: String,
    /// Seconds between full sweeps over every tracked state
    pub full_sweep_interval: f64,
    /// Seconds between ticks that only process forced rechecks
    pub forced_poll_interval: f64,
    /// Seconds between resource drift passes
    pub drift_interval: f64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            full_sweep_interval: DEFAULT_FULL_SWEEP_INTERVAL,
            forced_poll_interval: DEFAULT_FORCED_POLL_INTERVAL,
            drift_interval: DEFAULT_DRIFT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Record directory; defaults to `<data dir>/stateguard`
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectSettings {
    /// Root of the filesystem object store; buckets are its subdirectories
    pub root: PathBuf,
}

impl Default for ObjectSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub converter: Vec<String>,
    pub checker: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            converter: DEFAULT_CONVERTER.iter().map(|s| s.to_string()).collect(),
            checker: DEFAULT_CHECKER.iter().map(|s| s.to_string()).collect(),
            timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceSettings {
    /// Treat checker output with no recognizable features as a failure
    pub reject_empty_runs: bool,
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            reject_empty_runs: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub slack_webhook_url: Option<String>,
    /// Base URL of the web panel linked from notifications
    pub panel_url: String,
}

/// A resource type and the command that lists its instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub command: Vec<String>,
}

impl DaemonConfiguration {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file at `path` if given, else the default path if it exists,
    /// else built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }
        match Self::default_config_path() {
            Ok(default_path) if default_path.exists() => Self::load_from_file(&default_path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// `<config dir>/stateguard/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoHomeDirectory("config"))?;
        Ok(base.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_interval(
            "full_sweep_interval",
            self.daemon.full_sweep_interval,
            FULL_SWEEP_INTERVAL_MIN,
            FULL_SWEEP_INTERVAL_MAX,
        )?;
        check_interval(
            "forced_poll_interval",
            self.daemon.forced_poll_interval,
            FORCED_POLL_INTERVAL_MIN,
            FORCED_POLL_INTERVAL_MAX,
        )?;
        check_interval(
            "drift_interval",
            self.daemon.drift_interval,
            DRIFT_INTERVAL_MIN,
            DRIFT_INTERVAL_MAX,
        )?;

        if !matches!(
            self.daemon.log_level.to_ascii_lowercase().as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        if self.tools.converter.is_empty() {
            return Err(ConfigError::EmptyCommand("Converter".to_string()));
        }
        if self.tools.checker.is_empty() {
            return Err(ConfigError::EmptyCommand("Checker".to_string()));
        }
        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let mut seen = HashSet::new();
        for source in &self.resources {
            if source.command.is_empty() {
                return Err(ConfigError::EmptyCommand(format!("Resource '{}'", source.resource_type)));
            }
            if !seen.insert(source.resource_type.as_str()) {
                return Err(ConfigError::DuplicateResourceType(source.resource_type.clone()));
            }
        }

        Ok(())
    }

    /// Record directory, falling back to the platform data directory
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|base| base.join(APP_NAME))
                .ok_or(ConfigError::NoHomeDirectory("data")),
        }
    }

    /// Create the record directory if it does not exist yet
    pub fn ensure_directories(&self) -> Result<PathBuf, ConfigError> {
        let dir = self.data_dir()?;
        std::fs::create_dir_all(&dir).map_err(|source| ConfigError::CreateDirectory {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(dir)
    }

    pub fn full_sweep_duration(&self) -> Duration {
        Duration::from_secs_f64(self.daemon.full_sweep_interval)
    }

    pub fn forced_poll_duration(&self) -> Duration {
        Duration::from_secs_f64(self.daemon.forced_poll_interval)
    }

    pub fn drift_duration(&self) -> Duration {
        Duration::from_secs_f64(self.daemon.drift_interval)
    }

    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            converter: self.tools.converter.clone(),
            checker: self.tools.checker.clone(),
            timeout: Duration::from_secs(self.tools.timeout_secs),
        }
    }

    pub fn empty_run_policy(&self) -> EmptyRunPolicy {
        EmptyRunPolicy::from_reject_flag(self.compliance.reject_empty_runs)
    }
}

fn check_interval(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::InvalidInterval { name, value, min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = DaemonConfiguration::from_toml("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.daemon.full_sweep_interval, 300.0);
        assert_eq!(config.daemon.forced_poll_interval, 1.0);
        assert_eq!(config.tools.converter, vec!["terraform", "show", "-json"]);
        assert!(config.compliance.reject_empty_runs);
        assert_eq!(config.empty_run_policy(), EmptyRunPolicy::Reject);
        assert!(config.resources.is_empty());
    }

    #[test]
    fn test_full_file() {
        let config = DaemonConfiguration::from_toml(
            r#"
            [daemon]
            log_level = "debug"
            full_sweep_interval = 60.0
            forced_poll_interval = 0.5
            drift_interval = 120.0

            [storage]
            data_dir = "/var/lib/stateguard"

            [objects]
            root = "/srv/states"

            [tools]
            converter = ["tfconv"]
            checker = ["checker", "--no-ansi"]
            timeout_secs = 30

            [compliance]
            reject_empty_runs = false

            [notifications]
            slack_webhook_url = "https://hooks.slack.test/x"
            panel_url = "https://panel.test"

            [[resources]]
            type = "EC2Instance"
            command = ["list-ec2"]

            [[resources]]
            type = "S3Bucket"
            command = ["list-s3", "--all"]
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.forced_poll_duration(), Duration::from_millis(500));
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/var/lib/stateguard"));
        assert_eq!(config.tool_settings().timeout, Duration::from_secs(30));
        assert_eq!(config.empty_run_policy(), EmptyRunPolicy::Accept);
        assert_eq!(config.resources[1].resource_type, "S3Bucket");
        assert_eq!(config.resources[1].command, vec!["list-s3", "--all"]);
    }

    #[test]
    fn test_interval_bounds() {
        let mut config = DaemonConfiguration::default();
        config.daemon.forced_poll_interval = 0.05;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidInterval { name: "forced_poll_interval", .. })
        ));

        let mut config = DaemonConfiguration::default();
        config.daemon.drift_interval = 5.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidInterval { name: "drift_interval", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_commands_and_duplicates() {
        let mut config = DaemonConfiguration::default();
        config.tools.checker.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyCommand(_))));

        let mut config = DaemonConfiguration::default();
        let source = ResourceSource {
            resource_type: "EC2Instance".to_string(),
            command: vec!["list".to_string()],
        };
        config.resources = vec![source.clone(), source];
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateResourceType(_))));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut config = DaemonConfiguration::default();
        config.daemon.log_level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLogLevel(_))));
    }

    #[test]
    fn test_load_from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[daemon\nlog_level = ").unwrap();

        assert!(matches!(
            DaemonConfiguration::load_from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            DaemonConfiguration::load_from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_ensure_directories_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DaemonConfiguration::default();
        config.storage.data_dir = Some(dir.path().join("nested").join("data"));

        let created = config.ensure_directories().unwrap();
        assert!(created.is_dir());
    }
}
