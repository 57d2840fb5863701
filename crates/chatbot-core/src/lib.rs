//! Chatbot Core Library
//!
//! Release / experiment / session bookkeeping around a conversational agent.
//! A run resolves its version and user, finds or creates the Release for
//! that version, optionally records an Experiment with the assembled agent
//! configuration (dev mode), opens a Session and then serves the
//! conversation line by line.

pub mod agent;
pub mod bootstrap;
pub mod domain;
pub mod experiment;
pub mod interaction;
pub mod obs;
pub mod release_registry;
pub mod resolver;
pub mod session;
pub mod telemetry;

pub use agent::{
    AgentAction, AgentCallback, AgentOptions, ChatAgent, ComponentFactory,
    ConversationBufferMemory, ConversationalAgent, LanguageModel, OpenAiChatModel,
    OpenAiComponents, ParsingErrorPolicy, SearchTool, SerpApiClient, Tool, TurnMetadata,
};
pub use bootstrap::{Bootstrap, ChatbotConfig, ChatbotRuntime};
pub use domain::{
    AgentError, AgentSnapshot, ChatbotError, ExperimentField, MemorySnapshot, ModelSnapshot,
    Result, ToolSnapshot, VersionString, SNAPSHOT_SCHEMA_VERSION,
};
pub use experiment::{
    record_snapshot, start_experiment, ConfigRecorder, ExperimentRecorder, NoopRecorder,
};
pub use interaction::InteractionLoop;
pub use release_registry::ReleaseRegistry;
pub use resolver::{version_from_manifest, EnvironmentResolver, FixedIdentity, IdentityResolver};
pub use session::{SessionCallback, SessionContext};
pub use telemetry::init_tracing;
