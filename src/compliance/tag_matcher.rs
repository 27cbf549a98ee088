//! Tag matching for compliance feature selection
//!
//! A feature applies to a tracked state when any feature tag matches any
//! state tag. Feature tags containing glob characters ('*', '?', '[') are
//! matched as glob patterns; everything else is an exact comparison.

use glob::Pattern;
use thiserror::Error;

use crate::models::ComplianceFeature;

#[derive(Debug, Error)]
#[error("Invalid tag pattern '{pattern}': {message}")]
pub struct TagPatternError {
    pub pattern: String,
    pub message: String,
}

/// Check if a tag string contains glob pattern characters
pub fn is_glob_pattern(tag: &str) -> bool {
    tag.contains('*') || tag.contains('?') || tag.contains('[')
}

/// Match a state tag against a feature tag using either exact or glob matching
pub fn matches_tag(state_tag: &str, feature_tag: &str) -> bool {
    if is_glob_pattern(feature_tag) {
        match Pattern::new(feature_tag) {
            Ok(pattern) => pattern.matches(state_tag),
            // Invalid patterns degrade to exact matching
            Err(_) => state_tag == feature_tag,
        }
    } else {
        state_tag == feature_tag
    }
}

/// True if any feature tag matches any state tag
pub fn tags_intersect(feature_tags: &[String], state_tags: &[String]) -> bool {
    feature_tags.iter().any(|feature_tag| {
        state_tags
            .iter()
            .any(|state_tag| matches_tag(state_tag, feature_tag))
    })
}

/// Enabled features sharing at least one tag with `state_tags`.
///
/// Untagged features and an empty tag list select nothing.
pub fn select_features<'a>(
    features: &'a [ComplianceFeature],
    state_tags: &[String],
) -> Vec<&'a ComplianceFeature> {
    features
        .iter()
        .filter(|feature| !feature.disabled)
        .filter(|feature| tags_intersect(&feature.tags, state_tags))
        .collect()
}

/// Validate that all glob-looking tags are syntactically correct patterns
pub fn validate_tags(tags: &[String]) -> Result<(), TagPatternError> {
    for tag in tags {
        if is_glob_pattern(tag) {
            Pattern::new(tag).map_err(|e| TagPatternError {
                pattern: tag.clone(),
                message: e.to_string(),
            })?;
        }
    }
    Ok(())
}
