//! End-to-end bookkeeping scenarios against the SurrealDB-backed store.
//!
//! Each test boots the chatbot with scripted components over an in-memory
//! SurrealDB instance and inspects the persisted Release / Experiment /
//! Session records.

use std::sync::Arc;

use chatbot_core::agent::fakes::{ScriptedComponents, ScriptedModel, StaticTool};
use chatbot_core::agent::search::DEFAULT_SEARCH_DESCRIPTION;
use chatbot_core::{
    AgentOptions, Bootstrap, ChatbotConfig, ChatbotError, FixedIdentity, ParsingErrorPolicy,
    Tool, VersionString,
};
use chatbot_logger::{
    ExperimentStore, ReleaseStore, SessionEventKind, SessionKind, SessionStore, SurrealStore,
};

fn identity(version: &str) -> FixedIdentity {
    FixedIdentity::new(VersionString::parse(version).unwrap(), "tester")
}

fn components(replies: &[&str]) -> ScriptedComponents {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(StaticTool::new(
            "Search",
            DEFAULT_SEARCH_DESCRIPTION,
            "Paris has about 2.1 million inhabitants.",
        )),
        Arc::new(StaticTool::new("Clock", "tells the time", "12:00")),
    ];
    ScriptedComponents::new(
        Arc::new(ScriptedModel::new(replies.iter().copied())),
        tools,
    )
}

async fn store() -> Arc<SurrealStore> {
    Arc::new(SurrealStore::in_memory().await.expect("in-memory surreal"))
}

fn config(dev_mode: bool) -> ChatbotConfig {
    ChatbotConfig {
        dev_mode,
        ..ChatbotConfig::default()
    }
}

#[tokio::test]
async fn new_version_creates_release_once() {
    let store = store().await;

    let first = Bootstrap::new(store.clone(), identity("1.0.0"), components(&[]))
        .run(&config(false))
        .await
        .expect("first run");
    let second = Bootstrap::new(store.clone(), identity("1.0.0"), components(&[]))
        .run(&config(false))
        .await
        .expect("second run");

    assert_eq!(first.release.version, "1.0.0");
    assert_eq!(first.release.hash, second.release.hash);
    let releases = store.list_releases().await.unwrap();
    assert_eq!(releases.len(), 1);
}

#[tokio::test]
async fn dev_run_fills_experiment_before_session() {
    let store = store().await;

    let runtime = Bootstrap::new(store.clone(), identity("1.0.0"), components(&[]))
        .run(&config(true))
        .await
        .expect("dev run");

    let experiment_hash = runtime
        .session
        .session()
        .experiment_reference
        .clone()
        .expect("dev session references experiment");
    let experiment = store.get_experiment(&experiment_hash).await.unwrap();

    assert_eq!(experiment.release_reference, runtime.release.hash);
    assert_eq!(experiment.version, "1.0.0");
    for field in ["memory", "tools", "llm", "agent"] {
        assert!(
            !experiment.fields[field].is_null(),
            "{field} should be recorded"
        );
    }
    assert!(experiment.started_at <= runtime.session.session().started_at);
    assert_eq!(experiment.fields["memory"]["memory_key"], "chat_history");
    assert_eq!(experiment.fields["llm"]["model_name"], "scripted");
}

#[tokio::test]
async fn user_run_has_no_experiment() {
    let store = store().await;

    let runtime = Bootstrap::new(store.clone(), identity("1.0.0"), components(&[]))
        .run(&config(false))
        .await
        .expect("user run");

    let session = store.get_session(runtime.session.hash()).await.unwrap();
    assert_eq!(session.kind, SessionKind::User);
    assert!(session.experiment_reference.is_none());
    assert_eq!(session.release_reference, runtime.release.hash);
    assert!(store.list_experiments(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn session_keeps_tool_order() {
    let store = store().await;
    let runtime = Bootstrap::new(store.clone(), identity("1.0.0"), components(&[]))
        .run(&config(false))
        .await
        .expect("run");

    let session = store.get_session(runtime.session.hash()).await.unwrap();
    let tools: Vec<(&str, &str)> = session
        .available_tools
        .iter()
        .map(|t| (t.name.as_str(), t.description.as_str()))
        .collect();
    assert_eq!(
        tools,
        vec![
            ("Search", DEFAULT_SEARCH_DESCRIPTION),
            ("Clock", "tells the time")
        ]
    );
}

#[tokio::test]
async fn conversation_is_printed_and_logged() {
    let store = store().await;
    let runtime = Bootstrap::new(
        store.clone(),
        identity("1.1.0"),
        components(&[
            "Thought: Do I need to use a tool? Yes\nAction: Search\nAction Input: population of Paris",
            "Thought: Do I need to use a tool? No\nAI: About 2.1 million people.",
        ]),
    )
    .run(&config(true))
    .await
    .expect("run");

    let mut output = Vec::new();
    let turns = runtime
        .interact(&b"How many people live in Paris?\n"[..], &mut output)
        .await
        .expect("interact");

    assert_eq!(turns, 1);
    assert_eq!(
        String::from_utf8(output).unwrap(),
        "Message:\nAbout 2.1 million people.\nMessage:\n"
    );

    let events = store.get_events(runtime.session.hash()).await.unwrap();
    let kinds: Vec<SessionEventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SessionEventKind::AgentAction,
            SessionEventKind::ToolResult,
            SessionEventKind::Turn
        ]
    );
    assert_eq!(events[0].payload["tool_input"], "population of Paris");
    assert_eq!(events[2].payload["output"], "About 2.1 million people.");
}

#[tokio::test]
async fn parsing_failure_is_recorded_then_raised() {
    let store = store().await;
    let config = ChatbotConfig {
        dev_mode: false,
        agent: AgentOptions {
            parsing_errors: ParsingErrorPolicy::Propagate,
            ..AgentOptions::default()
        },
    };
    let runtime = Bootstrap::new(store.clone(), identity("1.0.0"), components(&["no format"]))
        .run(&config)
        .await
        .expect("run");

    let err = runtime
        .interact(&b"hi\n"[..], Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ChatbotError::Agent(_)));

    let events = store.get_events(runtime.session.hash()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SessionEventKind::TurnError);
    assert_eq!(events[0].payload["input"], "hi");
}

#[tokio::test]
async fn sessions_filter_by_release() {
    let store = store().await;
    let v1 = Bootstrap::new(store.clone(), identity("1.0.0"), components(&[]))
        .run(&config(false))
        .await
        .unwrap();
    Bootstrap::new(store.clone(), identity("2.0.0"), components(&[]))
        .run(&config(false))
        .await
        .unwrap();

    let all = store.list_sessions(None).await.unwrap();
    let for_v1 = store.list_sessions(Some(&v1.release.hash)).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(for_v1.len(), 1);
    assert_eq!(for_v1[0].chatbot_version, "1.0.0");
}
