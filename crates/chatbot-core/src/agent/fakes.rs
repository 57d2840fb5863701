//! Scripted stand-ins for the model and tools (testing only)
//!
//! `ScriptedModel` replays canned completions and keeps every prompt it was
//! given; `StaticTool` answers every call with the same text.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ComponentFactory, LanguageModel, Tool};
use crate::domain::error::AgentError;
use crate::domain::snapshot::{ModelSnapshot, SNAPSHOT_SCHEMA_VERSION};

/// Model that returns queued completions in order.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str, _stop: &[&str]) -> Result<String, AgentError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Model("scripted model has no reply left".to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            provider: "scripted".to_string(),
            model_name: "scripted".to_string(),
            temperature: 0.0,
            max_tokens: None,
            request_timeout_secs: None,
        }
    }
}

/// Tool that always answers with the same text and records its inputs.
#[derive(Debug)]
pub struct StaticTool {
    name: String,
    description: String,
    reply: Result<String, String>,
    return_direct: bool,
    calls: Mutex<Vec<String>>,
}

impl StaticTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            reply: Ok(reply.into()),
            return_direct: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A tool whose every call fails with `message`.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "always fails".to_string(),
            reply: Err(message.into()),
            return_direct: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn returning_directly(mut self) -> Self {
        self.return_direct = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn return_direct(&self) -> bool {
        self.return_direct
    }

    async fn call(&self, input: &str) -> Result<String, AgentError> {
        self.calls.lock().unwrap().push(input.to_string());
        self.reply.clone().map_err(|message| AgentError::Tool {
            tool: self.name.clone(),
            message,
        })
    }
}

/// Component factory handing out pre-built fakes.
pub struct ScriptedComponents {
    pub model: Arc<ScriptedModel>,
    pub tools: Vec<Arc<dyn Tool>>,
}

impl ScriptedComponents {
    pub fn new(model: Arc<ScriptedModel>, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { model, tools }
    }
}

impl ComponentFactory for ScriptedComponents {
    fn tools(&self) -> Result<Vec<Arc<dyn Tool>>, AgentError> {
        Ok(self.tools.clone())
    }

    fn language_model(&self) -> Result<Arc<dyn LanguageModel>, AgentError> {
        Ok(self.model.clone())
    }
}
