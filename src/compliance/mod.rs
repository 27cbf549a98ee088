//! Compliance output parsing module
//!
//! Handles:
//! - Turning the checker's semi-structured text output into a `ComplianceResult`
//! - Rejecting malformed feature headers
//! - The caller-side policy for runs in which no feature was recognized
//! - Feature selection by tags (see `tag_matcher`)

use std::path::Path;
use thiserror::Error;

use crate::constants::FEATURE_FILE_EXTENSION;
use crate::models::ComplianceResult;

pub mod tag_matcher;

pub use tag_matcher::select_features;

const FEATURE_PREFIX: &str = "Feature:";
const FAILURE_PREFIX: &str = "Failure:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed feature header on line {line_number}: expected exactly one '#' in '{line}'")]
    MalformedFeatureHeader { line_number: usize, line: String },
}

/// Parse the checker output into a structured result.
///
/// Lines starting with `Feature:` open a feature keyed by the file name
/// after the `#`. While a feature is open, trimmed lines of the form
/// `Failure: <message>` mark it failed and record the message. Every
/// other line is ignored.
pub fn parse_compliance_output(output: &str) -> Result<ComplianceResult, ParseError> {
    let mut result = ComplianceResult::default();
    let mut current_feature: Option<String> = None;

    for (index, line) in output.lines().enumerate() {
        if line.starts_with(FEATURE_PREFIX) {
            let fields: Vec<&str> = line.split('#').collect();
            if fields.len() != 2 {
                return Err(ParseError::MalformedFeatureHeader {
                    line_number: index + 1,
                    line: line.to_string(),
                });
            }

            let name = feature_name_from_path(fields[1].trim());
            result.feature_passed.insert(name.clone(), true);
            result.fail_messages.insert(name.clone(), Vec::new());
            current_feature = Some(name);
            continue;
        }

        let Some(feature) = current_feature.as_ref() else {
            continue;
        };

        let trimmed = line.trim();
        if trimmed.starts_with(FAILURE_PREFIX) && trimmed.matches(':').count() == 1 {
            let message = trimmed[FAILURE_PREFIX.len()..].trim().to_string();
            result.feature_passed.insert(feature.clone(), false);
            result
                .fail_messages
                .entry(feature.clone())
                .or_default()
                .push(message);
        }
    }

    Ok(result)
}

/// `/a/b/credentials.feature` -> `credentials`
pub fn feature_name_from_path(path: &str) -> String {
    let file_name = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let suffix = format!(".{}", FEATURE_FILE_EXTENSION);
    file_name
        .strip_suffix(&suffix)
        .map(str::to_string)
        .unwrap_or(file_name)
}

/// What to do with a run in which no feature was recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyRunPolicy {
    /// An empty result is a valid (vacuously passing) result
    Accept,
    /// An empty result means the checker did not really run
    Reject,
}

impl EmptyRunPolicy {
    pub fn from_reject_flag(reject: bool) -> Self {
        if reject {
            EmptyRunPolicy::Reject
        } else {
            EmptyRunPolicy::Accept
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("No features parsed from compliance output.\nOutput:\n{output}")]
pub struct EmptyRunError {
    pub output: String,
}

/// Apply `policy` to a parsed result; `output` is kept for diagnostics
pub fn enforce_empty_run_policy(
    result: ComplianceResult,
    output: &str,
    policy: EmptyRunPolicy,
) -> Result<ComplianceResult, EmptyRunError> {
    if policy == EmptyRunPolicy::Reject && result.test_count() == 0 {
        return Err(EmptyRunError {
            output: output.to_string(),
        });
    }
    Ok(result)
}
