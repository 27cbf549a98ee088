//! Compliance evaluation of state content
//!
//! Shared by the reconciliation loop and on-demand validation: convert the
//! content, run the checker with the selected features, parse the output
//! and apply the empty-run policy.

use thiserror::Error;

use crate::compliance::{
    enforce_empty_run_policy, parse_compliance_output, select_features, EmptyRunError,
    EmptyRunPolicy, ParseError,
};
use crate::models::{ComplianceFeature, ComplianceResult, ValidationLogEntry};
use crate::store::{RecordStore, Store, StoreError};
use crate::tooling::{ToolInvoker, ToolingError};

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Tooling(#[from] ToolingError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    EmptyRun(#[from] EmptyRunError),
}

/// Converted content and its compliance result
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub state_json: String,
    pub result: ComplianceResult,
    /// Checker output with ANSI sequences removed
    pub output: String,
}

pub async fn evaluate(
    tools: &ToolInvoker,
    content: &[u8],
    features: &[&ComplianceFeature],
    policy: EmptyRunPolicy,
) -> Result<Evaluation, EvaluationError> {
    let state_json = tools.convert_to_json(content).await?;
    let run = tools.run_compliance_check(state_json.as_bytes(), features).await?;
    let result = parse_compliance_output(&run.output)?;
    let result = enforce_empty_run_policy(result, &run.output, policy)?;

    Ok(Evaluation {
        state_json,
        result,
        output: run.output,
    })
}

/// Features for an on-demand run: all enabled ones without tags, else the
/// ones selected by `tags`
pub fn features_for_tags<'a>(features: &'a [ComplianceFeature], tags: &[String]) -> Vec<&'a ComplianceFeature> {
    if tags.is_empty() {
        features.iter().filter(|feature| !feature.disabled).collect()
    } else {
        select_features(features, tags)
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validate arbitrary state content and record a manual-validation log entry
pub async fn validate_content<S>(
    store: &S,
    tools: &ToolInvoker,
    content: &[u8],
    tags: &[String],
    policy: EmptyRunPolicy,
) -> Result<ValidationLogEntry, ValidationError>
where
    S: Store + ?Sized,
{
    let features = store.load_all_lossy::<ComplianceFeature>().await?;
    let selected = features_for_tags(&features, tags);

    let evaluation = evaluate(tools, content, &selected, policy).await?;
    let entry = ValidationLogEntry::manual(evaluation.state_json, evaluation.result);
    store.save(&entry).await?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogKind;
    use crate::store::MemoryStore;
    use crate::tooling::ToolSettings;
    use std::time::Duration;

    /// Checker printing one passing feature per feature file it receives
    const LISTING_CHECKER: &str =
        r#"for f in "$4"/*.feature; do [ -e "$f" ] && echo "Feature: $(basename "$f" .feature)  # $f"; done; exit 0"#;

    fn invoker(checker: &str) -> ToolInvoker {
        ToolInvoker::new(ToolSettings {
            converter: vec!["sh".into(), "-c".into(), "exit 1".into(), "converter".into()],
            checker: vec!["sh".into(), "-c".into(), checker.into(), "checker".into()],
            timeout: Duration::from_secs(10),
        })
    }

    fn feature(name: &str, tags: &[&str], disabled: bool) -> ComplianceFeature {
        let mut feature = ComplianceFeature::new(name, "Feature: x", tags.iter().map(|t| t.to_string()).collect());
        feature.disabled = disabled;
        feature
    }

    #[test]
    fn test_features_for_tags() {
        let features = vec![
            feature("a", &["prod"], false),
            feature("b", &["dev"], false),
            feature("c", &["prod"], true),
        ];

        let all: Vec<&str> = features_for_tags(&features, &[]).iter().map(|f| f.id.as_str()).collect();
        assert_eq!(all, vec!["a", "b"]);

        let prod: Vec<&str> = features_for_tags(&features, &["prod".to_string()])
            .iter()
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(prod, vec!["a"]);
    }

    #[tokio::test]
    async fn test_evaluate_parses_checker_output() {
        let features = vec![feature("encryption", &[], false)];
        let refs: Vec<&ComplianceFeature> = features.iter().collect();

        let evaluation = evaluate(&invoker(LISTING_CHECKER), b"{}", &refs, EmptyRunPolicy::Reject)
            .await
            .unwrap();
        assert_eq!(evaluation.state_json, "{}");
        assert_eq!(evaluation.result.feature_passed.get("encryption"), Some(&true));
    }

    #[tokio::test]
    async fn test_evaluate_rejects_empty_run() {
        let err = evaluate(&invoker("echo nothing here"), b"{}", &[], EmptyRunPolicy::Reject)
            .await
            .unwrap_err();
        match err {
            EvaluationError::EmptyRun(e) => assert!(e.output.contains("nothing here")),
            other => panic!("unexpected error: {:?}", other),
        }

        let accepted = evaluate(&invoker("echo nothing here"), b"{}", &[], EmptyRunPolicy::Accept)
            .await
            .unwrap();
        assert_eq!(accepted.result.test_count(), 0);
    }

    #[tokio::test]
    async fn test_validate_content_records_manual_entry() {
        let store = MemoryStore::new();
        store.save(&feature("tagging", &["prod"], false)).await.unwrap();
        store.save(&feature("legacy", &["prod"], true)).await.unwrap();

        let entry = validate_content(&store, &invoker(LISTING_CHECKER), br#"{"a":1}"#, &[], EmptyRunPolicy::Reject)
            .await
            .unwrap();

        assert_eq!(entry.kind, LogKind::ManualValidation);
        assert!(entry.previous.is_none());
        assert_eq!(entry.result.test_count(), 1);
        assert!(entry.result.feature_passed.contains_key("tagging"));

        let logs = store.load_all::<ValidationLogEntry>().await.unwrap();
        assert_eq!(logs, vec![entry]);
    }

    #[tokio::test]
    async fn test_validate_content_conversion_failure_records_nothing() {
        let store = MemoryStore::new();
        let err = validate_content(&store, &invoker(LISTING_CHECKER), b"BINARY", &[], EmptyRunPolicy::Reject)
            .await
            .unwrap_err();

        assert!(matches!(err, ValidationError::Evaluation(EvaluationError::Tooling(_))));
        assert!(store.load_all::<ValidationLogEntry>().await.unwrap().is_empty());
    }
}
