//! Global constants for stateguard
//!
//! Centralized location for application-wide constants

/// Application identifier used for config/data directories and log targets
pub const APP_NAME: &str = "stateguard";

/// Default configuration file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default seconds between full sweeps over every tracked state
pub const DEFAULT_FULL_SWEEP_INTERVAL: f64 = 300.0;

/// Default seconds between forced-only ticks
pub const DEFAULT_FORCED_POLL_INTERVAL: f64 = 1.0;

/// Default seconds between resource drift passes
pub const DEFAULT_DRIFT_INTERVAL: f64 = 300.0;

/// Note: bounds must match the messages in `ConfigError::InvalidInterval`
pub const FULL_SWEEP_INTERVAL_MIN: f64 = 1.0;
pub const FULL_SWEEP_INTERVAL_MAX: f64 = 86_400.0;
pub const FORCED_POLL_INTERVAL_MIN: f64 = 0.1;
pub const FORCED_POLL_INTERVAL_MAX: f64 = 60.0;
pub const DRIFT_INTERVAL_MIN: f64 = 10.0;
pub const DRIFT_INTERVAL_MAX: f64 = 86_400.0;

/// Default bound on a single external tool invocation
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;

/// Default converter command; the state file path is appended
pub const DEFAULT_CONVERTER: &[&str] = &["terraform", "show", "-json"];

/// Default compliance checker command
pub const DEFAULT_CHECKER: &[&str] = &["terraform-compliance"];

/// Extension of the feature files handed to the checker
pub const FEATURE_FILE_EXTENSION: &str = "feature";

/// Line budget for diffs printed by `log show`
pub const DIFF_SUMMARY_LINE_LIMIT: usize = 200;

/// Event type identifiers for structured daemon logs
pub const EVENT_DAEMON_STARTUP: &str = "daemon_startup";
pub const EVENT_DAEMON_SHUTDOWN: &str = "daemon_shutdown";
pub const EVENT_STATE_CHECKED: &str = "state_checked";
pub const EVENT_STATE_CHECK_FAILED: &str = "state_check_failed";
pub const EVENT_FOREIGN_REGISTERED: &str = "foreign_resource_registered";
pub const EVENT_FOREIGN_ADOPTED: &str = "foreign_resource_adopted";
pub const EVENT_ERROR: &str = "error";
