//! External tool invocation module
//!
//! Handles:
//! - Converting binary state files to JSON through the converter tool
//! - Running the compliance checker against a JSON payload and feature set
//! - Private temporary artifacts, removed on every exit path
//! - Execution timeouts for both tools

use serde::Serialize;
use std::ffi::OsString;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    DEFAULT_CHECKER, DEFAULT_CONVERTER, DEFAULT_TOOL_TIMEOUT_SECS, FEATURE_FILE_EXTENSION,
};
use crate::models::ComplianceFeature;

pub mod process;

pub use process::strip_ansi;

#[derive(Debug, Error)]
pub enum ToolingError {
    #[error("Tool command is empty")]
    EmptyCommand,

    #[error("Empty state content")]
    EmptyInput,

    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u64 },

    #[error("State conversion failed ({status}). Output: {output}")]
    ConversionFailed { status: String, output: String },

    #[error("{program} produced no output ({status})")]
    EmptyOutput { program: String, status: String },

    #[error("Tool produced invalid output: {message}")]
    InvalidOutput { message: String },

    #[error("Failed to prepare temporary {what}: {source}")]
    TempArtifact {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Commands and limits for the external tools
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Converter program and fixed arguments; the state file path is appended
    pub converter: Vec<String>,
    /// Checker program and fixed arguments; `-p <json> -f <dir>` is appended
    pub checker: Vec<String>,
    /// Upper bound on a single invocation
    pub timeout: Duration,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            converter: DEFAULT_CONVERTER.iter().map(|s| s.to_string()).collect(),
            checker: DEFAULT_CHECKER.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
        }
    }
}

/// Output of one compliance checker run
#[derive(Debug, Clone)]
pub struct CheckRun {
    /// The JSON the checker was run against
    pub input: String,
    /// Combined checker output with ANSI sequences stripped
    pub output: String,
}

/// Runs the converter and checker as bounded subprocesses
#[derive(Debug, Clone, Default)]
pub struct ToolInvoker {
    settings: ToolSettings,
}

impl ToolInvoker {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// Convert a binary state to pretty-printed JSON.
    ///
    /// Content already starting with `{` is returned unchanged.
    pub async fn convert_to_json(&self, content: &[u8]) -> Result<String, ToolingError> {
        if content.is_empty() {
            return Err(ToolingError::EmptyInput);
        }

        if content[0] == b'{' {
            return String::from_utf8(content.to_vec()).map_err(|e| ToolingError::InvalidOutput {
                message: format!("state is not valid UTF-8: {}", e),
            });
        }

        let mut state_file = tempfile::Builder::new()
            .prefix("stateguard-state-")
            .suffix(".bin")
            .tempfile()
            .map_err(|source| ToolingError::TempArtifact { what: "state file", source })?;
        state_file
            .write_all(content)
            .and_then(|_| state_file.flush())
            .map_err(|source| ToolingError::TempArtifact { what: "state file", source })?;

        let output = process::run_command(
            &self.settings.converter,
            &[state_file.path().as_os_str().to_owned()],
            self.settings.timeout,
        )
        .await?;

        if !output.status.success() || output.combined.trim().is_empty() {
            return Err(ToolingError::ConversionFailed {
                status: output.status.to_string(),
                output: output.combined,
            });
        }

        prettify_json(&output.stdout).map_err(|e| ToolingError::ConversionFailed {
            status: format!("unparseable JSON: {}", e),
            output: output.combined,
        })
    }

    /// Run the checker against `json` with one `<id>.feature` file per feature.
    ///
    /// The checker exits non-zero whenever a check fails, so only failing to
    /// run at all is an error.
    pub async fn run_compliance_check(
        &self,
        json: &[u8],
        features: &[&ComplianceFeature],
    ) -> Result<CheckRun, ToolingError> {
        if json.is_empty() {
            return Err(ToolingError::EmptyInput);
        }

        let work_dir = tempfile::Builder::new()
            .prefix("stateguard-check-")
            .tempdir()
            .map_err(|source| ToolingError::TempArtifact { what: "directory", source })?;

        let input_path = work_dir.path().join("compliance_input.json");
        std::fs::write(&input_path, json)
            .map_err(|source| ToolingError::TempArtifact { what: "input file", source })?;

        let features_dir = work_dir.path().join("features");
        std::fs::create_dir(&features_dir)
            .map_err(|source| ToolingError::TempArtifact { what: "features directory", source })?;
        for feature in features {
            let file_name = format!("{}.{}", feature.id, FEATURE_FILE_EXTENSION);
            std::fs::write(features_dir.join(file_name), &feature.source)
                .map_err(|source| ToolingError::TempArtifact { what: "feature file", source })?;
        }

        let args = [
            OsString::from("-p"),
            input_path.into_os_string(),
            OsString::from("-f"),
            features_dir.into_os_string(),
        ];
        let output = process::run_command(&self.settings.checker, &args, self.settings.timeout).await?;
        if output.combined.trim().is_empty() {
            return Err(ToolingError::EmptyOutput {
                program: self.settings.checker.join(" "),
                status: output.status.to_string(),
            });
        }

        Ok(CheckRun {
            input: String::from_utf8_lossy(json).into_owned(),
            output: strip_ansi(&output.combined),
        })
    }
}

/// Re-indent JSON with tabs so indentation depth tracks nesting depth
fn prettify_json(raw: &[u8]) -> Result<String, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_slice(raw)?;
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
