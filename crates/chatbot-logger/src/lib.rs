//! chatbot-logger: persisted records for the terminal chatbot
//!
//! Every run of the chatbot is logged against three record collections:
//!
//! - `ReleaseRecord`: one per chatbot version, created on first sight
//! - `ExperimentRecord`: dev-mode runs, capturing the assembled configuration
//! - `SessionRecord`: one per interactive run, plus its per-turn event log
//!
//! Records reference each other through `RecordHash` identities
//! (insertion order Release -> Experiment -> Session).
//!
//! ## Key Components
//!
//! - `storage_traits`: backend-agnostic async traits
//! - `fakes::MemoryStore`: in-memory implementation for tests
//! - `SurrealStore`: SurrealDB implementation (`SurrealHandle` manages the connection)

mod error;
pub mod fakes;
mod handle;
pub mod migrations;
mod schema;
pub mod storage_traits;
mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::{CloudConfig, SurrealHandle, DEFAULT_LOCAL_PATH};
pub use storage_traits::{
    ChatbotStore, ExperimentRecord, ExperimentStore, NewSession, RecordHash, ReleaseRecord,
    ReleaseStore, SessionEvent, SessionEventKind, SessionKind, SessionRecord, SessionStore,
    StorageResult, ToolDescriptor,
};
pub use surreal_store::SurrealStore;

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
