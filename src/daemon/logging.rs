//! Structured daemon logging
//!
//! Events are emitted through the `log` facade as `message | {json}` lines.
//! `init_logging` installs a tracing-subscriber fmt backend that receives
//! those records through its `log` bridge.

use anyhow::Result;
use log::{error, info, warn};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::constants::{
    EVENT_DAEMON_SHUTDOWN, EVENT_DAEMON_STARTUP, EVENT_ERROR, EVENT_FOREIGN_ADOPTED,
    EVENT_FOREIGN_REGISTERED, EVENT_STATE_CHECKED, EVENT_STATE_CHECK_FAILED,
};
use crate::models::{ForeignResource, TrackedState, ValidationLogEntry};

/// Install the global log backend.
///
/// `RUST_LOG` wins over `default_level`. Calling this more than once keeps
/// the first backend.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Structured logger for daemon events
#[derive(Debug, Clone)]
pub struct DaemonLogger {
    /// Current logging level
    level: LogLevel,
}

/// Log levels for daemon operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
}

impl Default for DaemonLogger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl DaemonLogger {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }

    /// Log daemon startup event
    pub fn log_startup(&self, config_path: Option<&std::path::Path>, data_dir: &std::path::Path) {
        let message = json!({
            "event": EVENT_DAEMON_STARTUP,
            "pid": std::process::id(),
            "config_path": config_path.map(|p| p.display().to_string()),
            "data_dir": data_dir.display().to_string(),
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(LogLevel::Info, "Daemon started", &message)
    }

    /// Log daemon shutdown event
    pub fn log_shutdown(&self, reason: &str) {
        let message = json!({
            "event": EVENT_DAEMON_SHUTDOWN,
            "reason": reason,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(LogLevel::Info, "Daemon shutting down", &message)
    }

    /// A state was reconciled and a log entry recorded
    pub fn log_state_checked(&self, state: &TrackedState, entry: &ValidationLogEntry, changed: bool) {
        let message = json!({
            "event": EVENT_STATE_CHECKED,
            "state_id": state.id,
            "location": state.location(),
            "log_id": entry.id,
            "changed": changed,
            "tests": entry.result.test_count(),
            "errors": entry.result.error_count(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let summary = if changed {
            format!("State {} changed. Registered in log {}", state.location(), entry.id)
        } else {
            format!("State {} rechecked without changes", state.location())
        };
        self.log_structured(LogLevel::Info, &summary, &message)
    }

    /// Conversion or checking failed; the state now carries the failure
    pub fn log_state_check_failed(&self, state: &TrackedState, reason: &str) {
        let message = json!({
            "event": EVENT_STATE_CHECK_FAILED,
            "state_id": state.id,
            "location": state.location(),
            "reason": reason,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            LogLevel::Warn,
            &format!("Can't check state {}", state.location()),
            &message,
        )
    }

    pub fn log_foreign_registered(&self, resource: &ForeignResource) {
        let message = json!({
            "event": EVENT_FOREIGN_REGISTERED,
            "resource_type": resource.resource_type,
            "resource_id": resource.resource_id,
            "record_id": resource.id,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            LogLevel::Info,
            &format!("Found foreign {}: {}", resource.resource_type, resource.resource_id),
            &message,
        )
    }

    /// A previously foreign resource now appears in `owner` (`bucket:path`)
    pub fn log_foreign_adopted(&self, resource: &ForeignResource, owner: &str) {
        let message = json!({
            "event": EVENT_FOREIGN_ADOPTED,
            "resource_type": resource.resource_type,
            "resource_id": resource.resource_id,
            "record_id": resource.id,
            "owner": owner,
            "is_exception": resource.is_exception,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            LogLevel::Info,
            &format!("Foreign resource {} was adopted by {}", resource.resource_id, owner),
            &message,
        )
    }

    /// Log error events
    pub fn log_error(&self, error_message: &str, context: Option<&str>) {
        let message = json!({
            "event": EVENT_ERROR,
            "message": error_message,
            "context": context,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(LogLevel::Error, error_message, &message)
    }

    fn log_structured(&self, level: LogLevel, message: &str, data: &serde_json::Value) {
        if !self.should_log(level) {
            return;
        }

        let full_message = format_event(message, data);
        match level {
            LogLevel::Error => error!("{}", full_message),
            LogLevel::Warn => warn!("{}", full_message),
            LogLevel::Info => info!("{}", full_message),
        }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        match (self.level, level) {
            (_, LogLevel::Error) => true,
            (LogLevel::Warn | LogLevel::Info, LogLevel::Warn) => true,
            (LogLevel::Info, LogLevel::Info) => true,
            _ => false,
        }
    }
}

/// `message | {json}`
pub fn format_event(message: &str, data: &serde_json::Value) -> String {
    format!("{} | {}", message, data)
}

/// Split a `message | {json}` line back into its parts
pub fn parse_event(line: &str) -> Option<(&str, serde_json::Value)> {
    let (message, data) = line.split_once(" | ")?;
    let value = serde_json::from_str(data).ok()?;
    Some((message, value))
}

pub fn level_from_str(level: &str) -> Result<LogLevel> {
    match level.to_ascii_lowercase().as_str() {
        "error" => Ok(LogLevel::Error),
        "warn" => Ok(LogLevel::Warn),
        "info" | "debug" | "trace" => Ok(LogLevel::Info),
        other => anyhow::bail!("Unknown log level '{}'", other),
    }
}
