//! Domain types for the chatbot.
//!
//! - `VersionString`: validated semantic version keying Release records
//! - snapshot structs: versioned configuration captured into Experiments
//! - error taxonomy shared by the whole crate

pub mod error;
pub mod snapshot;
pub mod version;

pub use error::{AgentError, ChatbotError, Result};
pub use snapshot::{
    AgentSnapshot, ExperimentField, MemorySnapshot, ModelSnapshot, ToolSnapshot,
    SNAPSHOT_SCHEMA_VERSION,
};
pub use version::VersionString;
