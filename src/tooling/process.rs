//! Bounded external process execution
//!
//! Every external tool runs with piped output, a null stdin and a hard
//! timeout. A timed-out child is killed when its wait future is dropped.

use regex::Regex;
use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command;

use super::ToolingError;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07]*\x07|\x1b[@-_]")
        .expect("ANSI escape pattern is valid")
});

/// Captured result of a finished process
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    /// stdout followed by stderr, lossily decoded
    pub combined: String,
}

/// Remove ANSI color and control sequences
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Run `command` (program followed by fixed arguments) with `extra_args`
/// appended, waiting at most `timeout` for it to exit.
///
/// A non-zero exit status is not an error here; callers decide.
pub async fn run_command(
    command: &[String],
    extra_args: &[OsString],
    timeout: Duration,
) -> Result<ProcessOutput, ToolingError> {
    let (program, args) = command.split_first().ok_or(ToolingError::EmptyCommand)?;

    let child = Command::new(program)
        .args(args)
        .args(extra_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolingError::Spawn {
            program: program.clone(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ToolingError::Wait {
            program: program.clone(),
            source,
        })?,
        Err(_) => {
            return Err(ToolingError::Timeout {
                program: program.clone(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(ProcessOutput {
        status: output.status,
        stdout: output.stdout,
        combined,
    })
}
