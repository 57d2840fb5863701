//! Agent assembly: the model client, tools, conversation memory and the
//! conversational ReAct agent that ties them together.
//!
//! External services sit behind narrow traits ([`LanguageModel`], [`Tool`])
//! so the agent loop can be driven by scripted fakes in tests.

pub mod conversational;
pub mod fakes;
pub mod memory;
pub mod openai;
pub mod search;

use std::sync::Arc;

use async_trait::async_trait;
use chatbot_logger::ToolDescriptor;
use serde::{Deserialize, Serialize};

use crate::domain::error::AgentError;
use crate::domain::snapshot::{AgentSnapshot, ModelSnapshot, ToolSnapshot, SNAPSHOT_SCHEMA_VERSION};

pub use conversational::{AgentOptions, ConversationalAgent, ParsingErrorPolicy};
pub use memory::ConversationBufferMemory;
pub use openai::OpenAiChatModel;
pub use search::{SearchTool, SerpApiClient};

/// Text-in, text-out language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt`, cutting generation at the first of `stop`.
    async fn complete(&self, prompt: &str, stop: &[&str]) -> Result<String, AgentError>;

    fn model_name(&self) -> &str;

    fn snapshot(&self) -> ModelSnapshot;
}

/// A named capability the agent may invoke with free-text input.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// When set, the tool output is returned to the user as the answer.
    fn return_direct(&self) -> bool {
        false
    }

    async fn call(&self, input: &str) -> Result<String, AgentError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }

    fn snapshot(&self) -> ToolSnapshot {
        ToolSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            name: self.name().to_string(),
            description: self.description().to_string(),
            return_direct: self.return_direct(),
        }
    }
}

/// A tool invocation chosen by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: String,
    /// Raw model text that produced the action
    pub log: String,
}

/// Facts about a completed turn, passed to [`AgentCallback::on_turn`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    /// Model calls made during the turn
    pub iterations: usize,
    /// Tools invoked, in call order
    pub tools_used: Vec<String>,
    pub duration_ms: u64,
}

/// Lifecycle hooks invoked by the agent during a turn.
///
/// Hooks cannot fail: an implementation that persists events deals with its
/// own errors so a turn is never aborted by instrumentation.
#[async_trait]
pub trait AgentCallback: Send + Sync {
    async fn on_agent_action(&self, _action: &AgentAction) {}

    async fn on_tool_result(&self, _tool: &str, _output: &str) {}

    async fn on_turn(&self, _input: &str, _output: &str, _metadata: &TurnMetadata) {}

    async fn on_turn_error(&self, _input: &str, _error: &AgentError) {}
}

/// A conversational agent answering one user message at a time.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn run(&self, input: &str, callbacks: &[&dyn AgentCallback])
        -> Result<String, AgentError>;

    fn snapshot(&self) -> AgentSnapshot;
}

/// Builds the external collaborators that assembly wires into an agent.
pub trait ComponentFactory: Send + Sync {
    fn memory(&self) -> ConversationBufferMemory {
        ConversationBufferMemory::new()
    }

    fn tools(&self) -> Result<Vec<Arc<dyn Tool>>, AgentError>;

    fn language_model(&self) -> Result<Arc<dyn LanguageModel>, AgentError>;
}

/// Production components: SerpAPI search and the OpenAI chat model.
#[derive(Debug, Clone)]
pub struct OpenAiComponents {
    serpapi_key: String,
    openai_key: String,
    model_name: String,
    request_timeout_secs: Option<u64>,
}

impl OpenAiComponents {
    pub fn new(serpapi_key: impl Into<String>, openai_key: impl Into<String>) -> Self {
        Self {
            serpapi_key: serpapi_key.into(),
            openai_key: openai_key.into(),
            model_name: openai::DEFAULT_MODEL.to_string(),
            request_timeout_secs: None,
        }
    }

    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }
}

impl ComponentFactory for OpenAiComponents {
    fn tools(&self) -> Result<Vec<Arc<dyn Tool>>, AgentError> {
        if self.serpapi_key.trim().is_empty() {
            return Err(AgentError::Configuration(
                "SerpAPI key is empty".to_string(),
            ));
        }
        let search = SearchTool::new(SerpApiClient::new(self.serpapi_key.clone()));
        Ok(vec![Arc::new(search)])
    }

    fn language_model(&self) -> Result<Arc<dyn LanguageModel>, AgentError> {
        if self.openai_key.trim().is_empty() {
            return Err(AgentError::Configuration(
                "OpenAI key is empty".to_string(),
            ));
        }
        let mut model = OpenAiChatModel::new(self.openai_key.clone(), self.model_name.clone());
        if let Some(secs) = self.request_timeout_secs {
            model = model.with_request_timeout(std::time::Duration::from_secs(secs));
        }
        Ok(Arc::new(model))
    }
}
