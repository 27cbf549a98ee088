//! Data models module
//!
//! Defines core data structures:
//! - TrackedState: a remote state blob under periodic compliance checks
//! - ForeignResource: a cloud resource not referenced by any tracked state
//! - ComplianceResult: structured outcome of one compliance run
//! - ValidationLogEntry: immutable audit record of an executed check
//! - ComplianceFeature: a named policy check handed to the checker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;


/// Generate a fresh record identifier
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Structured outcome of one compliance run.
///
/// Equality is structural over both maps, so two runs whose raw output
/// differs only cosmetically compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    /// Feature name -> whether every check in it passed
    pub feature_passed: BTreeMap<String, bool>,
    /// Feature name -> failure messages in output order (empty when passing)
    pub fail_messages: BTreeMap<String, Vec<String>>,
}

impl ComplianceResult {
    pub fn test_count(&self) -> usize {
        self.feature_passed.len()
    }

    pub fn error_count(&self) -> usize {
        self.feature_passed.values().filter(|passed| !**passed).count()
    }

    pub fn passed_count(&self) -> usize {
        self.test_count() - self.error_count()
    }

    /// Names of the failing features, sorted
    pub fn failing_features(&self) -> Vec<&str> {
        self.feature_passed
            .iter()
            .filter(|(_, passed)| !**passed)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Result stored on a tracked state after its latest reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckStatus {
    /// The state has never been checked
    #[default]
    NotChecked,
    /// The checker ran and its output was parsed
    Checked { result: ComplianceResult },
    /// Conversion or checking failed; carries the error text
    Failed { message: String },
}

impl CheckStatus {
    /// The compliance result, if the last pass produced one
    pub fn result(&self) -> Option<&ComplianceResult> {
        match self {
            CheckStatus::Checked { result } => Some(result),
            _ => None,
        }
    }
}

/// A remote infrastructure-state blob under periodic surveillance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackedState {
    pub id: String,
    /// Free-form account label the bucket belongs to
    #[serde(default)]
    pub account: String,
    pub bucket: String,
    pub path: String,
    /// Last converted content as pretty-printed JSON; empty if never fetched
    #[serde(default)]
    pub state_json: String,
    #[serde(default)]
    pub status: CheckStatus,
    /// Object-store modification token; empty means "never fetched"
    #[serde(default)]
    pub last_modification: String,
    /// `None` until the first successful reconciliation
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    /// Bypass the token short-circuit on the next tick
    #[serde(default)]
    pub force_recheck: bool,
    /// Labels selecting which compliance features apply
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TrackedState {
    pub fn new(account: &str, bucket: &str, path: &str, tags: Vec<String>) -> Self {
        Self {
            id: generate_id(),
            account: account.to_string(),
            bucket: bucket.to_string(),
            path: path.to_string(),
            tags,
            ..Self::default()
        }
    }

    /// `bucket:path`, as recorded in log entries and notices
    pub fn location(&self) -> String {
        format!("{}:{}", self.bucket, self.path)
    }
}

/// A cloud resource observed to exist outside every tracked state's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignResource {
    pub id: String,
    pub resource_type: String,
    /// Natural key used for matching against state content
    pub resource_id: String,
    #[serde(default)]
    pub resource_details: String,
    pub discovered_at: DateTime<Utc>,
    /// Operator-marked "known and accepted"
    #[serde(default)]
    pub is_exception: bool,
}

impl ForeignResource {
    pub fn new(resource_type: &str, resource_id: &str, resource_details: &str) -> Self {
        Self {
            id: generate_id(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            resource_details: resource_details.to_string(),
            discovered_at: Utc::now(),
            is_exception: false,
        }
    }
}

/// What triggered a validation log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    ManualValidation,
    StateCheck,
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogKind::ManualValidation => write!(f, "manual-validation"),
            LogKind::StateCheck => write!(f, "state-check"),
        }
    }
}

/// The tracked state's content and result before a state check ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousCheck {
    pub state_json: String,
    pub status: CheckStatus,
    /// `bucket:path` of the checked state
    pub location: String,
}

/// An immutable audit record of one executed compliance check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationLogEntry {
    pub id: String,
    pub kind: LogKind,
    pub created_at: DateTime<Utc>,
    pub state_json: String,
    pub result: ComplianceResult,
    /// Present only for `LogKind::StateCheck`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<PreviousCheck>,
}

impl ValidationLogEntry {
    pub fn manual(state_json: String, result: ComplianceResult) -> Self {
        Self {
            id: generate_id(),
            kind: LogKind::ManualValidation,
            created_at: Utc::now(),
            state_json,
            result,
            previous: None,
        }
    }

    pub fn state_check(
        state_json: String,
        result: ComplianceResult,
        previous_state: &TrackedState,
    ) -> Self {
        Self {
            id: generate_id(),
            kind: LogKind::StateCheck,
            created_at: Utc::now(),
            state_json,
            result,
            previous: Some(PreviousCheck {
                state_json: previous_state.state_json.clone(),
                status: previous_state.status.clone(),
                location: previous_state.location(),
            }),
        }
    }
}

/// A named policy check in the checker's domain language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceFeature {
    /// Feature name; doubles as the feature file name
    pub id: String,
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl ComplianceFeature {
    pub fn new(name: &str, source: &str, tags: Vec<String>) -> Self {
        Self {
            id: name.to_string(),
            source: source.to_string(),
            tags,
            disabled: false,
            created_at: Utc::now(),
        }
    }

    /// Feature names become file names, so only a conservative charset is
    /// allowed and hidden names are refused
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    }
}
