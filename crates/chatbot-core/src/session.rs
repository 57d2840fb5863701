//! Session record plus the agent callback that logs every turn into it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chatbot_logger::{
    NewSession, RecordHash, SessionEvent, SessionEventKind, SessionKind, SessionRecord,
    SessionStore, ToolDescriptor,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::agent::{AgentAction, AgentCallback, TurnMetadata};
use crate::domain::error::{AgentError, Result};
use crate::domain::version::VersionString;
use crate::obs;

/// Everything the Session record is written with.
///
/// The session kind follows `experiment_reference`: a run with an
/// Experiment is a dev session, one without is a user session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub username: String,
    pub chatbot_version: VersionString,
    pub model_name: String,
    pub available_tools: Vec<ToolDescriptor>,
    pub release_reference: RecordHash,
    pub experiment_reference: Option<RecordHash>,
}

impl SessionContext {
    fn into_new_session(self) -> NewSession {
        NewSession {
            kind: SessionKind::from_dev_mode(self.experiment_reference.is_some()),
            username: self.username,
            chatbot_version: self.chatbot_version.into(),
            model_name: self.model_name,
            available_tools: self.available_tools,
            release_reference: self.release_reference,
            experiment_reference: self.experiment_reference,
        }
    }
}

/// Agent callback bound to one persisted Session.
///
/// Events get consecutive `seq` numbers starting at 1. A hook whose write
/// fails logs a warning and returns; the turn carries on.
pub struct SessionCallback {
    store: Arc<dyn SessionStore>,
    session: SessionRecord,
    next_seq: AtomicU64,
}

impl SessionCallback {
    /// Write the Session record and return a callback bound to it.
    pub async fn begin(store: Arc<dyn SessionStore>, context: SessionContext) -> Result<Self> {
        let session = store.create_session(context.into_new_session()).await?;
        obs::emit_session_started(
            session.hash.as_str(),
            &session.username,
            &session.chatbot_version,
            session.kind == SessionKind::Dev,
        );
        Ok(Self {
            store,
            session,
            next_seq: AtomicU64::new(1),
        })
    }

    pub fn session(&self) -> &SessionRecord {
        &self.session
    }

    pub fn hash(&self) -> &RecordHash {
        &self.session.hash
    }

    async fn append(&self, kind: SessionEventKind, payload: Value) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let event = SessionEvent {
            seq,
            kind,
            payload,
            timestamp: Utc::now(),
        };
        match self.store.append_event(&self.session.hash, event).await {
            Ok(()) => obs::emit_session_event_appended(self.session.hash.as_str(), kind.as_str(), seq),
            Err(e) => obs::emit_session_callback_error(self.session.hash.as_str(), kind.as_str(), &e),
        }
    }
}

#[async_trait]
impl AgentCallback for SessionCallback {
    async fn on_agent_action(&self, action: &AgentAction) {
        let payload = json!({
            "tool": action.tool,
            "tool_input": action.tool_input,
            "log": action.log,
        });
        self.append(SessionEventKind::AgentAction, payload).await;
    }

    async fn on_tool_result(&self, tool: &str, output: &str) {
        let payload = json!({ "tool": tool, "output": output });
        self.append(SessionEventKind::ToolResult, payload).await;
    }

    async fn on_turn(&self, input: &str, output: &str, metadata: &TurnMetadata) {
        let payload = json!({
            "input": input,
            "output": output,
            "iterations": metadata.iterations,
            "tools_used": metadata.tools_used,
            "duration_ms": metadata.duration_ms,
        });
        self.append(SessionEventKind::Turn, payload).await;
    }

    async fn on_turn_error(&self, input: &str, error: &AgentError) {
        let payload = json!({ "input": input, "error": error.to_string() });
        self.append(SessionEventKind::TurnError, payload).await;
    }
}
