//! Resource drift reconciliation
//!
//! Keeps the foreign resource table equal to "live resources whose id
//! appears in no tracked state's content". Planning is pure; `apply`
//! persists the plan.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::resources::{EnumerationError, ListedResource, ResourceRegistry};
use crate::daemon::logging::DaemonLogger;
use crate::models::{ForeignResource, TrackedState};
use crate::store::{RecordStore, Store, StoreError};

/// One change to the foreign resource table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftAction {
    /// A live resource that no state mentions and that is not yet recorded
    Register(ForeignResource),
    /// A recorded foreign resource that some state now mentions
    Adopt {
        resource: ForeignResource,
        /// `bucket:path` of the first state containing the id
        owner: String,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriftReport {
    pub registered: usize,
    pub adopted: usize,
    pub failed: usize,
}

/// First state whose content contains `resource_id`
fn owning_state<'a>(states: &'a [TrackedState], resource_id: &str) -> Option<&'a TrackedState> {
    states.iter().find(|state| state.state_json.contains(resource_id))
}

/// Decide what to do with every listed resource.
///
/// A resource id appearing several times in `listed` yields at most one
/// action. Empty ids match every state and are ignored.
pub fn plan_drift(
    states: &[TrackedState],
    foreign: &[ForeignResource],
    listed: &[ListedResource],
) -> Vec<DriftAction> {
    let mut seen = HashSet::new();
    let mut actions = Vec::new();

    for resource in listed {
        if resource.resource_id.is_empty() || !seen.insert(resource.resource_id.as_str()) {
            continue;
        }

        let existing = foreign.iter().find(|fr| fr.resource_id == resource.resource_id);
        let owner = owning_state(states, &resource.resource_id);

        match (existing, owner) {
            (None, None) => actions.push(DriftAction::Register(ForeignResource::new(
                &resource.resource_type,
                &resource.resource_id,
                &resource.details,
            ))),
            (Some(existing), Some(owner)) => actions.push(DriftAction::Adopt {
                resource: existing.clone(),
                owner: owner.location(),
            }),
            _ => {}
        }
    }

    actions
}

/// Persist `actions`; a failed action is logged and the rest still run
pub async fn apply<S>(store: &S, actions: Vec<DriftAction>, logger: &DaemonLogger) -> DriftReport
where
    S: Store + ?Sized,
{
    let mut report = DriftReport::default();

    for action in actions {
        match action {
            DriftAction::Register(resource) => match store.save(&resource).await {
                Ok(()) => {
                    report.registered += 1;
                    logger.log_foreign_registered(&resource);
                }
                Err(e) => {
                    report.failed += 1;
                    logger.log_error(
                        &format!("Can't register foreign resource {}: {}", resource.resource_id, e),
                        Some("drift"),
                    );
                }
            },
            DriftAction::Adopt { resource, owner } => match store.remove::<ForeignResource>(&resource.id).await {
                Ok(_) => {
                    report.adopted += 1;
                    logger.log_foreign_adopted(&resource, &owner);
                }
                Err(e) => {
                    report.failed += 1;
                    logger.log_error(
                        &format!("Can't delete foreign resource {}: {}", resource.id, e),
                        Some("drift"),
                    );
                }
            },
        }
    }

    report
}

#[derive(Debug, thiserror::Error)]
pub enum DriftError {
    #[error("Can't load records for drift detection: {0}")]
    Load(#[from] StoreError),

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
}

/// One full drift pass: load, enumerate, plan, apply
pub async fn reconcile_once<S>(
    store: &S,
    registry: &ResourceRegistry,
    logger: &DaemonLogger,
) -> Result<DriftReport, DriftError>
where
    S: Store + ?Sized,
{
    let states = store.load_all_lossy::<TrackedState>().await?;
    let foreign = store.load_all_lossy::<ForeignResource>().await?;
    let listed = registry.list_all().await?;

    let actions = plan_drift(&states, &foreign, &listed);
    Ok(apply(store, actions, logger).await)
}

/// Run drift passes every `interval` until the task is dropped
pub async fn run_drift_loop<S>(
    store: Arc<S>,
    registry: ResourceRegistry,
    interval: Duration,
    logger: DaemonLogger,
) where
    S: Store + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; drift waits a full period
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match reconcile_once(store.as_ref(), &registry, &logger).await {
            Ok(report) => log::debug!(
                "Drift pass done: {} registered, {} adopted, {} failed",
                report.registered,
                report.adopted,
                report.failed
            ),
            Err(e) => logger.log_error(&e.to_string(), Some("drift")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn state_with(content: &str) -> TrackedState {
        let mut state = TrackedState::new("acct", "states", "prod.tfstate", vec![]);
        state.state_json = content.to_string();
        state
    }

    fn listed(id: &str) -> ListedResource {
        ListedResource {
            resource_type: "EC2Instance".to_string(),
            resource_id: id.to_string(),
            details: format!("{} details", id),
        }
    }

    #[test]
    fn test_unknown_resource_is_registered() {
        let states = vec![state_with(r#"{"id": "i-owned"}"#)];
        let actions = plan_drift(&states, &[], &[listed("i-owned"), listed("i-stray")]);

        assert_eq!(actions.len(), 1);
        match &actions[0] {
            DriftAction::Register(resource) => {
                assert_eq!(resource.resource_id, "i-stray");
                assert_eq!(resource.resource_type, "EC2Instance");
                assert_eq!(resource.resource_details, "i-stray details");
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_known_foreign_resource_now_owned_is_adopted() {
        let states = vec![state_with(r#"{"id": "i-1"}"#)];
        let foreign = vec![ForeignResource::new("EC2Instance", "i-1", "")];

        let actions = plan_drift(&states, &foreign, &[listed("i-1")]);
        assert_eq!(
            actions,
            vec![DriftAction::Adopt {
                resource: foreign[0].clone(),
                owner: "states:prod.tfstate".to_string(),
            }]
        );
    }

    #[test]
    fn test_known_foreign_resource_still_foreign_is_untouched() {
        let foreign = vec![ForeignResource::new("EC2Instance", "i-1", "")];
        assert!(plan_drift(&[state_with("{}")], &foreign, &[listed("i-1")]).is_empty());
    }

    #[test]
    fn test_duplicates_register_once() {
        let actions = plan_drift(&[], &[], &[listed("i-1"), listed("i-1")]);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_empty_id_is_ignored() {
        assert!(plan_drift(&[], &[], &[listed("")]).is_empty());

        let mut stale = ForeignResource::new("EC2Instance", "", "");
        stale.id = "stale".to_string();
        let states = vec![state_with("{}")];
        assert!(plan_drift(&states, &[stale], &[listed("")]).is_empty());
    }

    #[test]
    fn test_membership_is_substring() {
        // Prefix collisions count as ownership
        let states = vec![state_with(r#"{"id": "i-12345"}"#)];
        assert!(plan_drift(&states, &[], &[listed("i-123")]).is_empty());
    }

    #[tokio::test]
    async fn test_apply_persists_actions() {
        let store = MemoryStore::new();
        let adopted = ForeignResource::new("EC2Instance", "i-old", "");
        store.save(&adopted).await.unwrap();

        let actions = vec![
            DriftAction::Register(ForeignResource::new("EC2Instance", "i-new", "")),
            DriftAction::Adopt {
                resource: adopted.clone(),
                owner: "b:p".to_string(),
            },
        ];
        let report = apply(&store, actions, &DaemonLogger::default()).await;

        assert_eq!(report, DriftReport { registered: 1, adopted: 1, failed: 0 });
        let remaining = store.load_all::<ForeignResource>().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].resource_id, "i-new");
    }

    #[tokio::test]
    async fn test_apply_continues_after_failure() {
        let store = MemoryStore::new();
        let mut bad = ForeignResource::new("EC2Instance", "i-bad", "");
        bad.id = "../bad".to_string();

        let actions = vec![
            DriftAction::Register(bad),
            DriftAction::Register(ForeignResource::new("EC2Instance", "i-good", "")),
        ];
        let report = apply(&store, actions, &DaemonLogger::default()).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.registered, 1);
    }
}
