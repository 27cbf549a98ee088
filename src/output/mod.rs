//! Output formatting module
//!
//! Handles:
//! - One-line listings and detailed views for every record kind
//! - Log summaries (line churn, previous -> current compliance)
//! - JSON output for `--json`

use anyhow::Result;
use serde::Serialize;
use std::fmt::Write as _;

use crate::constants::DIFF_SUMMARY_LINE_LIMIT;
use crate::diff::{diff_lines, render_unified, summarize_diff};
use crate::models::{
    CheckStatus, ComplianceFeature, ComplianceResult, ForeignResource, LogKind, TrackedState,
    ValidationLogEntry,
};

const UNIFIED_CONTEXT_LINES: usize = 3;

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `PASSED n/n` or `FAILED errors/n`
pub fn result_summary(result: &ComplianceResult) -> String {
    if result.error_count() > 0 {
        format!("FAILED {}/{}", result.error_count(), result.test_count())
    } else {
        format!("PASSED {}/{}", result.test_count(), result.test_count())
    }
}

pub fn status_summary(status: &CheckStatus) -> String {
    match status {
        CheckStatus::NotChecked => "not checked yet".to_string(),
        CheckStatus::Checked { result } if result.error_count() > 0 => format!(
            "not compliant ({} of {} failing)",
            result.error_count(),
            result.test_count()
        ),
        CheckStatus::Checked { result } => {
            format!("compliant ({} features passing)", result.test_count())
        }
        CheckStatus::Failed { message } => format!("error: {}", first_line(message)),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// Per-feature PASSED/FAILED lines with failure messages
pub fn format_result(result: &ComplianceResult) -> String {
    if result.test_count() == 0 {
        return "No features checked.\n".to_string();
    }

    let mut out = String::new();
    for (feature, passed) in &result.feature_passed {
        let _ = writeln!(out, "  {} {}", if *passed { "PASSED" } else { "FAILED" }, feature);
        if let Some(messages) = result.fail_messages.get(feature) {
            for message in messages {
                let _ = writeln!(out, "      - {}", message);
            }
        }
    }
    let _ = writeln!(out, "\n{}", result_summary(result));
    out
}

pub fn format_state_line(state: &TrackedState) -> String {
    let last_checked = state
        .last_checked
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    let forced = if state.force_recheck { " | recheck pending" } else { "" };
    format!(
        "#{} | {} | last checked: {} | {}{}",
        state.id,
        state.location(),
        last_checked,
        status_summary(&state.status),
        forced
    )
}

pub fn format_state_details(state: &TrackedState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "State #{}", state.id);
    let _ = writeln!(out, "  Account:   {}", state.account);
    let _ = writeln!(out, "  Location:  {}", state.location());
    let _ = writeln!(out, "  Tags:      {}", state.tags.join(", "));
    let _ = writeln!(
        out,
        "  Checked:   {}",
        state.last_checked.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string())
    );
    let _ = writeln!(out, "  Token:     {}", state.last_modification);
    let _ = writeln!(out, "  Recheck:   {}", state.force_recheck);
    let _ = writeln!(out, "  Status:    {}", status_summary(&state.status));

    match &state.status {
        CheckStatus::Checked { result } => {
            out.push('\n');
            out.push_str(&format_result(result));
        }
        CheckStatus::Failed { message } => {
            let _ = writeln!(out, "\n{}", message);
        }
        CheckStatus::NotChecked => {}
    }
    out
}

/// Flattened view of a log entry for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    pub id: String,
    pub kind: LogKind,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub compliance_tests: usize,
    pub compliance_errors: usize,
    /// Result held by the state before this check, if it had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_result: Option<String>,
    pub result: String,
}

impl LogSummary {
    pub fn from_entry(entry: &ValidationLogEntry) -> Self {
        let (lines_added, lines_removed) = match &entry.previous {
            Some(previous) => {
                let diff = diff_lines(&previous.state_json, &entry.state_json);
                (diff.added.len(), diff.removed.len())
            }
            None => (0, 0),
        };

        Self {
            id: entry.id.clone(),
            kind: entry.kind,
            created_at: entry.created_at.to_rfc3339(),
            location: entry.previous.as_ref().map(|p| p.location.clone()),
            lines_added,
            lines_removed,
            compliance_tests: entry.result.test_count(),
            compliance_errors: entry.result.error_count(),
            previous_result: entry
                .previous
                .as_ref()
                .and_then(|p| p.status.result())
                .map(result_summary),
            result: result_summary(&entry.result),
        }
    }
}

pub fn format_log_line(entry: &ValidationLogEntry) -> String {
    let summary = LogSummary::from_entry(entry);
    let mut line = format!("#{} | {} | {} | ", summary.id, summary.created_at, summary.kind);

    if entry.kind == LogKind::StateCheck {
        let _ = write!(
            line,
            "{} | +{}, -{} lines | ",
            summary.location.as_deref().unwrap_or("?"),
            summary.lines_added,
            summary.lines_removed
        );
        if let Some(previous) = &summary.previous_result {
            let _ = write!(line, "{} -> ", previous);
        }
    }
    line.push_str(&summary.result);
    line
}

/// Header, state differences (state checks only) and per-feature results
pub fn format_log_details(entry: &ValidationLogEntry) -> String {
    let mut out = String::new();
    let subject = match &entry.previous {
        Some(previous) => previous.location.clone(),
        None => entry.kind.to_string(),
    };
    let _ = writeln!(out, "\n    {} (at {})\n", subject, entry.created_at.to_rfc3339());

    if let Some(previous) = &entry.previous {
        out.push_str("Differences:\n");
        out.push_str(&format_differences(&previous.state_json, &entry.state_json));
        out.push('\n');
    }

    out.push_str(&format_result(&entry.result));
    out
}

/// Unified diff if it fits the line budget, else summarized added/removed lines
pub fn format_differences(old: &str, new: &str) -> String {
    let unified = render_unified(old, new, UNIFIED_CONTEXT_LINES);
    if unified.is_empty() {
        return "  (no changes)\n".to_string();
    }
    if unified.lines().count() <= DIFF_SUMMARY_LINE_LIMIT {
        return unified;
    }

    let diff = diff_lines(old, new);
    let mut out = String::new();
    for (title, lines) in [("Added", &diff.added), ("Removed", &diff.removed)] {
        let _ = writeln!(out, "{} ({} lines):", title, lines.len());
        for line in summarize_diff(lines, DIFF_SUMMARY_LINE_LIMIT / 2) {
            let _ = writeln!(out, "{}", line);
        }
    }
    out
}

pub fn format_foreign_line(resource: &ForeignResource) -> String {
    format!(
        "#{} | {} | type: {} | id: {} | is exception: {}",
        resource.id,
        resource.discovered_at.to_rfc3339(),
        resource.resource_type,
        resource.resource_id,
        resource.is_exception
    )
}

pub fn format_foreign_details(resource: &ForeignResource) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n      Id #{}, discovered {}", resource.id, resource.discovered_at.to_rfc3339());
    let _ = writeln!(out, "      Type: {}, Id: {}\n", resource.resource_type, resource.resource_id);
    let _ = writeln!(out, "Resource details:\n{}", resource.resource_details);
    out
}

pub fn format_feature_line(feature: &ComplianceFeature) -> String {
    format!(
        "{} | tags: [{}] | {}",
        feature.id,
        feature.tags.join(", "),
        if feature.disabled { "disabled" } else { "enabled" }
    )
}

pub fn format_feature_details(feature: &ComplianceFeature) -> String {
    format!("{}\n\n{}\n", format_feature_line(feature), feature.source.trim_end())
}
