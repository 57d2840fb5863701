//! Startup sequence: identity, Release, optional Experiment, agent assembly
//! and Session, in that order.

use std::sync::Arc;

use chatbot_logger::{
    ChatbotStore, ExperimentRecord, ExperimentStore, ReleaseRecord, SessionStore,
};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{info, Instrument};

use crate::agent::{AgentOptions, ChatAgent, ComponentFactory, ConversationalAgent};
use crate::domain::error::Result;
use crate::domain::snapshot::{ExperimentField, ToolSnapshot};
use crate::experiment::{record_snapshot, start_experiment, ConfigRecorder, NoopRecorder};
use crate::interaction::InteractionLoop;
use crate::obs;
use crate::release_registry::ReleaseRegistry;
use crate::resolver::IdentityResolver;
use crate::session::{SessionCallback, SessionContext};

/// Run-level switches.
#[derive(Debug, Clone, Default)]
pub struct ChatbotConfig {
    /// Record an Experiment with the assembled configuration
    pub dev_mode: bool,
    pub agent: AgentOptions,
}

/// Wires the chatbot together against one store.
pub struct Bootstrap<S> {
    store: Arc<S>,
    resolver: Box<dyn IdentityResolver>,
    components: Box<dyn ComponentFactory>,
}

impl<S> Bootstrap<S>
where
    S: ChatbotStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        resolver: impl IdentityResolver + 'static,
        components: impl ComponentFactory + 'static,
    ) -> Self {
        Self {
            store,
            resolver: Box::new(resolver),
            components: Box::new(components),
        }
    }

    /// Perform the startup sequence and return a runtime ready to chat.
    pub async fn run(self, config: &ChatbotConfig) -> Result<ChatbotRuntime> {
        let username = self.resolver.resolve_user()?;
        let version = self.resolver.resolve_version()?;
        info!(username = %username, version = %version, dev = config.dev_mode, "starting chatbot");

        let release = ReleaseRegistry::new(self.store.clone())
            .get_or_create_release(&version)
            .await?;

        let experiment_store: Arc<dyn ExperimentStore> = self.store.clone();
        let recorder: Box<dyn ConfigRecorder> = if config.dev_mode {
            Box::new(start_experiment(experiment_store.clone(), &release, &version).await?)
        } else {
            Box::new(NoopRecorder)
        };

        let memory = self.components.memory();
        record_snapshot(recorder.as_ref(), ExperimentField::Memory, &memory.snapshot()).await?;

        let tools = self.components.tools()?;
        let tool_snapshots: Vec<ToolSnapshot> = tools.iter().map(|t| t.snapshot()).collect();
        record_snapshot(recorder.as_ref(), ExperimentField::Tools, &tool_snapshots).await?;

        let llm = self.components.language_model()?;
        record_snapshot(recorder.as_ref(), ExperimentField::Llm, &llm.snapshot()).await?;

        let agent = ConversationalAgent::new(llm, tools, memory, config.agent.clone())?;
        record_snapshot(recorder.as_ref(), ExperimentField::Agent, &agent.snapshot()).await?;

        let experiment = match recorder.experiment() {
            Some(hash) => Some(experiment_store.get_experiment(hash).await?),
            None => None,
        };

        let session_store: Arc<dyn SessionStore> = self.store.clone();
        let context = SessionContext {
            username,
            chatbot_version: version,
            model_name: agent.model_name().to_string(),
            available_tools: agent.tool_descriptors(),
            release_reference: release.hash.clone(),
            experiment_reference: experiment.as_ref().map(|e| e.hash.clone()),
        };
        let session = SessionCallback::begin(session_store, context).await?;

        Ok(ChatbotRuntime {
            release,
            experiment,
            session,
            agent,
        })
    }
}

/// Everything created at startup, ready to serve the conversation.
pub struct ChatbotRuntime {
    pub release: ReleaseRecord,
    /// Present only in dev mode, with every snapshot field filled
    pub experiment: Option<ExperimentRecord>,
    pub session: SessionCallback,
    pub agent: ConversationalAgent,
}

impl ChatbotRuntime {
    /// Drive the conversation until end of input.
    pub async fn interact<R, W>(&self, reader: R, writer: W) -> Result<u64>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let span = obs::session_span(self.session.hash().as_str());
        InteractionLoop::new(&self.agent as &dyn ChatAgent, &self.session)
            .run(reader, writer)
            .instrument(span)
            .await
    }
}
