//! Integration tests for foreign resource drift reconciliation

mod helpers;

use std::time::Duration;

use helpers::TestEnvironment;
use stateguard::daemon::config::ResourceSource;
use stateguard::daemon::logging::DaemonLogger;
use stateguard::models::{ForeignResource, TrackedState};
use stateguard::monitor::drift::{reconcile_once, DriftError};
use stateguard::monitor::resources::{DiscoveredResource, StaticEnumerator};
use stateguard::monitor::ResourceRegistry;
use stateguard::store::{JsonStore, MemoryStore, RecordStore, Store};

fn registry(resources: &[&str]) -> ResourceRegistry {
    let mut registry = ResourceRegistry::new();
    registry.register(
        "S3Bucket",
        Box::new(StaticEnumerator::new(
            resources
                .iter()
                .map(|id| DiscoveredResource::new(*id, format!("{} details", id)))
                .collect(),
        )),
    );
    registry
}

async fn track_content<S: Store>(store: &S, path: &str, content: &str) -> TrackedState {
    let mut state = TrackedState::new("acct", "states", path, vec![]);
    state.state_json = content.to_string();
    store.save(&state).await.unwrap();
    state
}

async fn foreign_ids<S: Store>(store: &S) -> Vec<String> {
    let mut ids: Vec<String> = store
        .load_all::<ForeignResource>()
        .await
        .unwrap()
        .into_iter()
        .map(|resource| resource.resource_id)
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_foreign_table_tracks_unowned_resources() {
    let store = MemoryStore::new();
    let logger = DaemonLogger::default();
    track_content(&store, "a.tfstate", r#"{"bucket": "logs-bucket"}"#).await;

    let report = reconcile_once(&store, &registry(&["logs-bucket", "stray-bucket", "stray-bucket"]), &logger)
        .await
        .unwrap();

    assert_eq!(report.registered, 1);
    assert_eq!(report.adopted, 0);
    assert_eq!(foreign_ids(&store).await, vec!["stray-bucket"]);

    let recorded = store.load_all::<ForeignResource>().await.unwrap();
    assert_eq!(recorded[0].resource_type, "S3Bucket");
    assert_eq!(recorded[0].resource_details, "stray-bucket details");
    assert!(!recorded[0].is_exception);
}

#[tokio::test]
async fn test_repeated_pass_is_stable() {
    let store = MemoryStore::new();
    let logger = DaemonLogger::default();
    let registry = registry(&["stray-bucket"]);

    reconcile_once(&store, &registry, &logger).await.unwrap();
    let first = store.load_all::<ForeignResource>().await.unwrap();

    let report = reconcile_once(&store, &registry, &logger).await.unwrap();
    assert_eq!(report.registered, 0);
    assert_eq!(store.load_all::<ForeignResource>().await.unwrap(), first);
}

#[tokio::test]
async fn test_resource_is_adopted_once_a_state_mentions_it() {
    let store = MemoryStore::new();
    let logger = DaemonLogger::default();
    let registry = registry(&["stray-bucket", "other-bucket"]);

    reconcile_once(&store, &registry, &logger).await.unwrap();
    assert_eq!(foreign_ids(&store).await, vec!["other-bucket", "stray-bucket"]);

    // Exceptions are adopted like any other record
    let mut marked = store
        .load_all::<ForeignResource>()
        .await
        .unwrap()
        .into_iter()
        .find(|resource| resource.resource_id == "stray-bucket")
        .unwrap();
    marked.is_exception = true;
    store.save(&marked).await.unwrap();

    track_content(&store, "b.tfstate", r#"{"bucket": "stray-bucket"}"#).await;
    let report = reconcile_once(&store, &registry, &logger).await.unwrap();

    assert_eq!(report.adopted, 1);
    assert_eq!(foreign_ids(&store).await, vec!["other-bucket"]);
}

#[tokio::test]
async fn test_vanished_resources_are_left_alone() {
    let store = MemoryStore::new();
    let logger = DaemonLogger::default();

    reconcile_once(&store, &registry(&["stray-bucket"]), &logger).await.unwrap();
    let report = reconcile_once(&store, &registry(&[]), &logger).await.unwrap();

    assert_eq!(report.registered + report.adopted, 0);
    assert_eq!(foreign_ids(&store).await, vec!["stray-bucket"]);
}

#[tokio::test]
async fn test_command_enumerator_feeds_json_store() {
    let env = TestEnvironment::new();
    let store = JsonStore::new(env.data_dir());
    let logger = DaemonLogger::default();
    let sources = vec![ResourceSource {
        resource_type: "EC2Instance".to_string(),
        command: vec![
            "sh".to_string(),
            "-c".to_string(),
            r#"printf 'i-0001\tweb server\ni-0002\tdb server\n'"#.to_string(),
        ],
    }];
    let registry = ResourceRegistry::from_sources(&sources, Duration::from_secs(20));
    track_content(&store, "a.tfstate", r#"{"instance": "i-0001"}"#).await;

    let report = reconcile_once(&store, &registry, &logger).await.unwrap();

    assert_eq!(report.registered, 1);
    let recorded = store.load_all::<ForeignResource>().await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].resource_id, "i-0002");
    assert_eq!(recorded[0].resource_details, "db server");
    assert_eq!(recorded[0].resource_type, "EC2Instance");
}

#[tokio::test]
async fn test_failing_enumerator_aborts_pass() {
    let store = MemoryStore::new();
    let logger = DaemonLogger::default();
    let sources = vec![
        ResourceSource {
            resource_type: "Good".to_string(),
            command: vec!["sh".to_string(), "-c".to_string(), "echo good-1".to_string()],
        },
        ResourceSource {
            resource_type: "Broken".to_string(),
            command: vec!["sh".to_string(), "-c".to_string(), "echo denied >&2; exit 3".to_string()],
        },
    ];
    let registry = ResourceRegistry::from_sources(&sources, Duration::from_secs(20));

    let err = reconcile_once(&store, &registry, &logger).await.unwrap_err();

    assert!(matches!(err, DriftError::Enumeration(_)));
    assert!(err.to_string().contains("Broken"));
    assert!(foreign_ids(&store).await.is_empty());
}
