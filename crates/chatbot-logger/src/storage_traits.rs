//! Storage trait definitions for the chatbot records
//!
//! These traits define the three record collections:
//! - `ReleaseStore`: one record per deployed chatbot version
//! - `ExperimentStore`: configuration captured during dev runs
//! - `SessionStore`: interactive runs and their per-turn event log
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// RecordHash: stable record identity
// ---------------------------------------------------------------------------

/// Identity hash of a persisted record (SHA-256 hex string).
///
/// Used as the foreign-key value when one record references another. The
/// inner field is private so the string is always valid lowercase hex
/// produced by `generate` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordHash(String);

impl RecordHash {
    /// Mint a fresh identity for a record of the given kind.
    pub fn generate(kind: &str) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update(b"\0");
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        RecordHash(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for RecordHash {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidHash { hash: s });
        }
        Ok(RecordHash(s.to_ascii_lowercase()))
    }
}

impl From<RecordHash> for String {
    fn from(hash: RecordHash) -> Self {
        hash.0
    }
}

impl std::fmt::Display for RecordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ReleaseStore
// ---------------------------------------------------------------------------

/// One deployed version of the chatbot. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub hash: RecordHash,
    /// Semantic version string, the lookup key
    pub version: String,
    pub created_at: DateTime<Utc>,
}

/// Release records keyed by version.
///
/// Guarantees:
/// - `find_release_by_version` returns the earliest-created match, or
///   `StorageError::NotFound` when there is none. Backend failures are
///   reported as such and never as `NotFound`.
/// - `create_release` writes every field in a single operation.
/// - No uniqueness enforcement: two concurrent creators of the same new
///   version may both succeed.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// First release whose `version` equals the given string.
    async fn find_release_by_version(&self, version: &str) -> StorageResult<ReleaseRecord>;

    /// Persist a new release for `version` stamped with the current time.
    async fn create_release(&self, version: &str) -> StorageResult<ReleaseRecord>;

    /// All releases, newest first.
    async fn list_releases(&self) -> StorageResult<Vec<ReleaseRecord>>;
}

// ---------------------------------------------------------------------------
// ExperimentStore
// ---------------------------------------------------------------------------

/// Configuration captured during one dev-mode run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub hash: RecordHash,
    /// Hash of the release active when the experiment started
    pub release_reference: RecordHash,
    pub version: String,
    pub started_at: DateTime<Utc>,
    /// Incrementally assigned snapshots (memory, tools, llm, agent, ...)
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

#[async_trait]
pub trait ExperimentStore: Send + Sync {
    /// Persist a new experiment linked to `release_reference`.
    async fn create_experiment(
        &self,
        release_reference: &RecordHash,
        version: &str,
    ) -> StorageResult<ExperimentRecord>;

    /// Assign `field`, replacing any previous value wholesale.
    async fn set_experiment_field(
        &self,
        hash: &RecordHash,
        field: &str,
        value: serde_json::Value,
    ) -> StorageResult<()>;

    /// Retrieve an experiment by hash.
    async fn get_experiment(&self, hash: &RecordHash) -> StorageResult<ExperimentRecord>;

    /// List experiments, optionally only those of one release. Newest first.
    async fn list_experiments(
        &self,
        release_reference: Option<&RecordHash>,
    ) -> StorageResult<Vec<ExperimentRecord>>;
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Whether a session was a developer run or an end-user run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Dev,
    User,
}

impl SessionKind {
    pub fn from_dev_mode(dev_mode: bool) -> Self {
        if dev_mode {
            SessionKind::Dev
        } else {
            SessionKind::User
        }
    }
}

/// Name and description of a tool offered to the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

/// Fields supplied when a session is opened
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub kind: SessionKind,
    pub username: String,
    pub chatbot_version: String,
    pub model_name: String,
    /// Tools in the order they were handed to the agent
    pub available_tools: Vec<ToolDescriptor>,
    pub release_reference: RecordHash,
    pub experiment_reference: Option<RecordHash>,
}

/// One interactive run of the chatbot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub hash: RecordHash,
    pub kind: SessionKind,
    pub username: String,
    pub chatbot_version: String,
    pub model_name: String,
    pub started_at: DateTime<Utc>,
    pub available_tools: Vec<ToolDescriptor>,
    pub release_reference: RecordHash,
    pub experiment_reference: Option<RecordHash>,
}

impl SessionRecord {
    /// Stamp a `NewSession` with an identity and start time.
    pub fn from_new(session: NewSession, started_at: DateTime<Utc>) -> Self {
        Self {
            hash: RecordHash::generate("session"),
            kind: session.kind,
            username: session.username,
            chatbot_version: session.chatbot_version,
            model_name: session.model_name,
            started_at,
            available_tools: session.available_tools,
            release_reference: session.release_reference,
            experiment_reference: session.experiment_reference,
        }
    }
}

/// Kind of entry in a session log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    /// A completed user/agent exchange
    Turn,
    /// The agent decided to call a tool
    AgentAction,
    /// A tool returned an observation
    ToolResult,
    /// A turn failed before producing an answer
    TurnError,
}

impl SessionEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEventKind::Turn => "turn",
            SessionEventKind::AgentAction => "agent_action",
            SessionEventKind::ToolResult => "tool_result",
            SessionEventKind::TurnError => "turn_error",
        }
    }
}

impl std::str::FromStr for SessionEventKind {
    type Err = StorageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "turn" => Ok(SessionEventKind::Turn),
            "agent_action" => Ok(SessionEventKind::AgentAction),
            "tool_result" => Ok(SessionEventKind::ToolResult),
            "turn_error" => Ok(SessionEventKind::TurnError),
            other => Err(StorageError::Serialization(format!(
                "unknown session event kind: {other}"
            ))),
        }
    }
}

/// A single entry in a session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Monotonic sequence number within the session, starting at 1
    pub seq: u64,
    pub kind: SessionEventKind,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Session records and their append-only event logs.
///
/// Guarantees:
/// - `create_session` writes every field in a single operation.
/// - Events are returned ordered by `seq`.
/// - Appending to an unknown session fails with `NotFound`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session.
    async fn create_session(&self, session: NewSession) -> StorageResult<SessionRecord>;

    /// Append an event to a session's log.
    async fn append_event(&self, hash: &RecordHash, event: SessionEvent) -> StorageResult<()>;

    /// Retrieve a session by hash.
    async fn get_session(&self, hash: &RecordHash) -> StorageResult<SessionRecord>;

    /// Retrieve all events of a session, ordered by seq.
    async fn get_events(&self, hash: &RecordHash) -> StorageResult<Vec<SessionEvent>>;

    /// List sessions, optionally only those of one release. Newest first.
    async fn list_sessions(
        &self,
        release_reference: Option<&RecordHash>,
    ) -> StorageResult<Vec<SessionRecord>>;
}

/// Everything the chatbot persists, behind one object.
pub trait ChatbotStore: ReleaseStore + ExperimentStore + SessionStore {}

impl<T> ChatbotStore for T where T: ReleaseStore + ExperimentStore + SessionStore {}
