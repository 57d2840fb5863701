//! Trait contract tests for ReleaseStore, ExperimentStore and SessionStore.
//!
//! Every check runs against the in-memory fake and the SurrealDB backend
//! (`mem://`). Any conforming implementation must pass these.

use std::time::Duration;

use chrono::Utc;
use chatbot_logger::fakes::MemoryStore;
use chatbot_logger::storage_traits::*;
use chatbot_logger::{StorageError, SurrealStore};
use serde_json::json;

async fn backends() -> Vec<(&'static str, Box<dyn ChatbotStore>)> {
    vec![
        ("memory", Box::new(MemoryStore::new())),
        ("surreal", Box::new(SurrealStore::in_memory().await.unwrap())),
    ]
}

fn new_session(release: &RecordHash, experiment: Option<&RecordHash>) -> NewSession {
    NewSession {
        kind: SessionKind::from_dev_mode(experiment.is_some()),
        username: "ada".to_string(),
        chatbot_version: "1.0.0".to_string(),
        model_name: "gpt-3.5-turbo".to_string(),
        available_tools: vec![
            ToolDescriptor {
                name: "Search".to_string(),
                description: "web search".to_string(),
            },
            ToolDescriptor {
                name: "Calculator".to_string(),
                description: "arithmetic".to_string(),
            },
        ],
        release_reference: release.clone(),
        experiment_reference: experiment.cloned(),
    }
}

fn event(seq: u64, kind: SessionEventKind) -> SessionEvent {
    SessionEvent {
        seq,
        kind,
        payload: json!({ "seq": seq }),
        timestamp: Utc::now(),
    }
}

// ===========================================================================
// ReleaseStore
// ===========================================================================

#[tokio::test]
async fn release_lookup_of_unknown_version_is_not_found() {
    for (name, store) in backends().await {
        let err = store.find_release_by_version("9.9.9").await.unwrap_err();
        assert!(
            matches!(err, StorageError::NotFound { kind: "release", .. }),
            "{name}: expected NotFound, got {err:?}"
        );
    }
}

#[tokio::test]
async fn release_created_then_found_by_version() {
    for (name, store) in backends().await {
        let created = store.create_release("1.0.0").await.unwrap();
        assert_eq!(created.version, "1.0.0");

        let found = store.find_release_by_version("1.0.0").await.unwrap();
        assert_eq!(found.hash, created.hash, "{name}");

        let other = store.find_release_by_version("1.0.1").await;
        assert!(other.unwrap_err().is_not_found(), "{name}");
    }
}

#[tokio::test]
async fn release_lookup_returns_first_created_duplicate() {
    for (name, store) in backends().await {
        let first = store.create_release("2.0.0").await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let _second = store.create_release("2.0.0").await.unwrap();

        let found = store.find_release_by_version("2.0.0").await.unwrap();
        assert_eq!(found.hash, first.hash, "{name}");
    }
}

#[tokio::test]
async fn release_list_is_newest_first() {
    for (name, store) in backends().await {
        store.create_release("1.0.0").await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.create_release("1.1.0").await.unwrap();

        let versions: Vec<String> = store
            .list_releases()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec!["1.1.0", "1.0.0"], "{name}");
    }
}

// ===========================================================================
// ExperimentStore
// ===========================================================================

#[tokio::test]
async fn experiment_links_release_and_starts_empty() {
    for (name, store) in backends().await {
        let release = store.create_release("1.0.0").await.unwrap();
        let experiment = store
            .create_experiment(&release.hash, "1.0.0")
            .await
            .unwrap();

        assert_eq!(experiment.release_reference, release.hash, "{name}");
        assert!(experiment.fields.is_empty(), "{name}");
        assert_ne!(experiment.hash, release.hash, "{name}");
    }
}

#[tokio::test]
async fn experiment_field_assignment_overwrites_wholesale() {
    for (name, store) in backends().await {
        let release = store.create_release("1.0.0").await.unwrap();
        let experiment = store
            .create_experiment(&release.hash, "1.0.0")
            .await
            .unwrap();

        store
            .set_experiment_field(&experiment.hash, "memory", json!({"a": 1, "b": 2}))
            .await
            .unwrap();
        store
            .set_experiment_field(&experiment.hash, "memory", json!({"c": 3}))
            .await
            .unwrap();
        store
            .set_experiment_field(&experiment.hash, "llm", json!({"model_name": "gpt"}))
            .await
            .unwrap();

        let loaded = store.get_experiment(&experiment.hash).await.unwrap();
        assert_eq!(loaded.fields["memory"], json!({"c": 3}), "{name}");
        assert_eq!(loaded.fields["llm"], json!({"model_name": "gpt"}), "{name}");
        assert_eq!(loaded.fields.len(), 2, "{name}");
    }
}

#[tokio::test]
async fn experiment_field_keeps_null_members() {
    for (name, store) in backends().await {
        let release = store.create_release("1.0.0").await.unwrap();
        let experiment = store
            .create_experiment(&release.hash, "1.0.0")
            .await
            .unwrap();

        let llm = json!({"model_name": "m", "max_tokens": null, "request_timeout_secs": null});
        store
            .set_experiment_field(&experiment.hash, "llm", llm.clone())
            .await
            .unwrap();

        let loaded = store.get_experiment(&experiment.hash).await.unwrap();
        assert_eq!(loaded.fields["llm"], llm, "{name}");
    }
}

#[tokio::test]
async fn experiment_field_on_unknown_hash_is_not_found() {
    for (name, store) in backends().await {
        let bogus = RecordHash::generate("experiment");
        let err = store
            .set_experiment_field(&bogus, "memory", json!({}))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{name}: {err:?}");
    }
}

#[tokio::test]
async fn experiments_filter_by_release() {
    for (name, store) in backends().await {
        let r1 = store.create_release("1.0.0").await.unwrap();
        let r2 = store.create_release("2.0.0").await.unwrap();
        store.create_experiment(&r1.hash, "1.0.0").await.unwrap();
        store.create_experiment(&r2.hash, "2.0.0").await.unwrap();
        store.create_experiment(&r2.hash, "2.0.0").await.unwrap();

        assert_eq!(store.list_experiments(None).await.unwrap().len(), 3, "{name}");
        let only_r2 = store.list_experiments(Some(&r2.hash)).await.unwrap();
        assert_eq!(only_r2.len(), 2, "{name}");
        assert!(only_r2.iter().all(|e| e.release_reference == r2.hash));
    }
}

// ===========================================================================
// SessionStore
// ===========================================================================

#[tokio::test]
async fn session_persists_all_fields_in_order() {
    for (name, store) in backends().await {
        let release = store.create_release("1.0.0").await.unwrap();
        let session = store
            .create_session(new_session(&release.hash, None))
            .await
            .unwrap();

        let loaded = store.get_session(&session.hash).await.unwrap();
        assert_eq!(loaded.release_reference, release.hash, "{name}");
        assert_eq!(loaded.experiment_reference, None, "{name}");
        assert_eq!(loaded.kind, SessionKind::User, "{name}");
        let tool_names: Vec<&str> = loaded
            .available_tools
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(tool_names, vec!["Search", "Calculator"], "{name}");
    }
}

#[tokio::test]
async fn session_keeps_experiment_reference() {
    for (name, store) in backends().await {
        let release = store.create_release("1.0.0").await.unwrap();
        let experiment = store
            .create_experiment(&release.hash, "1.0.0")
            .await
            .unwrap();
        let session = store
            .create_session(new_session(&release.hash, Some(&experiment.hash)))
            .await
            .unwrap();

        let loaded = store.get_session(&session.hash).await.unwrap();
        assert_eq!(loaded.experiment_reference, Some(experiment.hash), "{name}");
        assert_eq!(loaded.kind, SessionKind::Dev, "{name}");
    }
}

#[tokio::test]
async fn session_events_are_ordered_by_seq() {
    for (name, store) in backends().await {
        let release = store.create_release("1.0.0").await.unwrap();
        let session = store
            .create_session(new_session(&release.hash, None))
            .await
            .unwrap();

        store
            .append_event(&session.hash, event(2, SessionEventKind::Turn))
            .await
            .unwrap();
        store
            .append_event(&session.hash, event(1, SessionEventKind::AgentAction))
            .await
            .unwrap();
        store
            .append_event(&session.hash, event(3, SessionEventKind::TurnError))
            .await
            .unwrap();

        let events = store.get_events(&session.hash).await.unwrap();
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3], "{name}");
        assert_eq!(events[0].kind, SessionEventKind::AgentAction, "{name}");
        assert_eq!(events[1].payload, json!({"seq": 2}), "{name}");
    }
}

#[tokio::test]
async fn session_append_to_unknown_session_is_not_found() {
    for (name, store) in backends().await {
        let bogus = RecordHash::generate("session");
        let err = store
            .append_event(&bogus, event(1, SessionEventKind::Turn))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{name}: {err:?}");

        let err = store.get_events(&bogus).await.unwrap_err();
        assert!(err.is_not_found(), "{name}: {err:?}");
    }
}

#[tokio::test]
async fn sessions_filter_by_release() {
    for (name, store) in backends().await {
        let r1 = store.create_release("1.0.0").await.unwrap();
        let r2 = store.create_release("2.0.0").await.unwrap();
        store.create_session(new_session(&r1.hash, None)).await.unwrap();
        store.create_session(new_session(&r2.hash, None)).await.unwrap();

        let only_r1 = store.list_sessions(Some(&r1.hash)).await.unwrap();
        assert_eq!(only_r1.len(), 1, "{name}");
        assert_eq!(only_r1[0].release_reference, r1.hash, "{name}");
        assert_eq!(store.list_sessions(None).await.unwrap().len(), 2, "{name}");
    }
}

// ===========================================================================
// Failure reporting (fake only)
// ===========================================================================

#[tokio::test]
async fn failing_store_reports_backend_errors_not_absence() {
    let store = MemoryStore::new();
    store.create_release("1.0.0").await.unwrap();
    store.fail_with("disk on fire");

    let err = store.find_release_by_version("1.0.0").await.unwrap_err();
    assert!(matches!(err, StorageError::Backend(ref m) if m == "disk on fire"));
    assert!(!err.is_not_found());

    store.recover();
    assert!(store.find_release_by_version("1.0.0").await.is_ok());
}
