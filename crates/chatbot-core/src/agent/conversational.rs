//! Conversational ReAct agent.
//!
//! Each turn renders a prompt from the tool list, the conversation memory
//! and a scratchpad of earlier steps, then asks the model for either a tool
//! call (`Action:` / `Action Input:`) or a reply (`AI:`). Tool observations
//! are appended to the scratchpad until the model replies or the iteration
//! budget runs out.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use async_trait::async_trait;
use chatbot_logger::ToolDescriptor;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::memory::ConversationBufferMemory;
use super::{AgentAction, AgentCallback, ChatAgent, LanguageModel, Tool, TurnMetadata};
use crate::domain::error::AgentError;
use crate::domain::snapshot::{AgentSnapshot, SNAPSHOT_SCHEMA_VERSION};

pub const AGENT_TYPE: &str = "conversational-react-description";
pub const DEFAULT_MAX_ITERATIONS: usize = 15;
pub const DEFAULT_RETRY_PROMPT: &str = "Check your output and make sure it conforms!";

const STOP_SEQUENCE: &str = "\nObservation:";
const OBSERVATION_PREFIX: &str = "Observation: ";
const LLM_PREFIX: &str = "Thought:";
const PARSE_ERROR_PREFIX: &str = "Could not parse LLM output: `";

const PROMPT_PREFIX: &str = "Assistant is a large language model trained by OpenAI.

Assistant is designed to be able to assist with a wide range of tasks, from answering simple questions to providing in-depth explanations and discussions on a wide range of topics. As a language model, Assistant is able to generate human-like text based on the input it receives, allowing it to engage in natural-sounding conversations and provide responses that are coherent and relevant to the topic at hand.

Assistant is constantly learning and improving, and its capabilities are constantly evolving. It is able to process and understand large amounts of text, and can use this knowledge to provide accurate and informative responses to a wide range of questions. Additionally, Assistant is able to generate its own text based on the input it receives, allowing it to engage in discussions and provide explanations and descriptions on a wide range of topics.

Overall, Assistant is a powerful tool that can help with a wide range of tasks and provide valuable insights and information on a wide range of topics. Whether you need help with a specific question or just want to have a conversation about a particular topic, Assistant is here to assist.

TOOLS:
------

Assistant has access to the following tools:";

/// What to do when the model output is neither a tool call nor a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ParsingErrorPolicy {
    /// Fail the turn with `AgentError::OutputParsing`.
    Propagate,
    /// Feed `prompt` back to the model as the observation and keep going.
    Retry { prompt: String },
    /// Hand the raw model text to the user as the answer.
    SurfaceRawText,
}

impl Default for ParsingErrorPolicy {
    fn default() -> Self {
        ParsingErrorPolicy::Retry {
            prompt: DEFAULT_RETRY_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOptions {
    pub max_iterations: usize,
    /// Log every reasoning step at info level instead of debug
    pub verbose: bool,
    pub parsing_errors: ParsingErrorPolicy,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            verbose: true,
            parsing_errors: ParsingErrorPolicy::default(),
        }
    }
}

/// One parsed model completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    Action(AgentAction),
    Finish(String),
}

fn action_regex() -> &'static Regex {
    static ACTION: OnceLock<Regex> = OnceLock::new();
    ACTION.get_or_init(|| {
        Regex::new(r"Action: (.*?)[\n]*Action Input: ([\s\S]*)").expect("action pattern is valid")
    })
}

/// Parse a completion into a tool call or a reply to the human.
pub fn parse_output(text: &str, ai_prefix: &str) -> Result<ParsedOutput, AgentError> {
    let reply_marker = format!("{ai_prefix}:");
    if let Some(idx) = text.rfind(&reply_marker) {
        let reply = text[idx + reply_marker.len()..].trim();
        return Ok(ParsedOutput::Finish(reply.to_string()));
    }

    match action_regex().captures(text) {
        Some(caps) => {
            let tool = caps[1].trim().to_string();
            let tool_input = caps[2].trim().trim_matches('"').to_string();
            Ok(ParsedOutput::Action(AgentAction {
                tool,
                tool_input,
                log: text.to_string(),
            }))
        }
        None => Err(AgentError::OutputParsing {
            output: text.to_string(),
        }),
    }
}

/// Remove the `Could not parse LLM output: `...`` wrapper, if present.
pub fn strip_parse_wrapper(message: &str) -> &str {
    let inner = message.strip_prefix(PARSE_ERROR_PREFIX).unwrap_or(message);
    inner.strip_suffix('`').unwrap_or(inner)
}

/// Agent that converses with the user and calls tools when needed.
pub struct ConversationalAgent {
    llm: Arc<dyn LanguageModel>,
    tools: Vec<Arc<dyn Tool>>,
    memory: Mutex<ConversationBufferMemory>,
    memory_key: String,
    ai_prefix: String,
    options: AgentOptions,
}

impl ConversationalAgent {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        tools: Vec<Arc<dyn Tool>>,
        memory: ConversationBufferMemory,
        options: AgentOptions,
    ) -> Result<Self, AgentError> {
        if options.max_iterations == 0 {
            return Err(AgentError::Configuration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        for (i, tool) in tools.iter().enumerate() {
            if tools[..i].iter().any(|t| t.name() == tool.name()) {
                return Err(AgentError::Configuration(format!(
                    "duplicate tool name: {}",
                    tool.name()
                )));
            }
        }

        Ok(Self {
            llm,
            tools,
            memory_key: memory.memory_key().to_string(),
            ai_prefix: memory.ai_prefix().to_string(),
            memory: Mutex::new(memory),
            options,
        })
    }

    pub fn tool_descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Number of messages currently held in memory.
    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    fn build_prompt(&self, input: &str, history: &str, scratchpad: &str) -> String {
        let tool_lines = self
            .tools
            .iter()
            .map(|t| format!("> {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let tool_names = self.tool_names().join(", ");
        let ai_prefix = &self.ai_prefix;

        format!(
            "{PROMPT_PREFIX}\n\n{tool_lines}\n\n\
             To use a tool, please use the following format:\n\n\
             ```\n\
             Thought: Do I need to use a tool? Yes\n\
             Action: the action to take, should be one of [{tool_names}]\n\
             Action Input: the input to the action\n\
             Observation: the result of the action\n\
             ```\n\n\
             When you have a response to say to the Human, or if you do not need to use a tool, you MUST use the format:\n\n\
             ```\n\
             Thought: Do I need to use a tool? No\n\
             {ai_prefix}: [your response here]\n\
             ```\n\n\
             Begin!\n\n\
             Previous conversation history:\n\
             {history}\n\n\
             New input: {input}\n\
             {scratchpad}"
        )
    }

    fn log_step(&self, text: &str) {
        if self.options.verbose {
            info!(step = %text, "agent step");
        } else {
            debug!(step = %text, "agent step");
        }
    }

    /// Run the named tool; returns the observation and whether it ends the turn.
    async fn invoke_tool(&self, action: &AgentAction) -> Result<(String, bool), AgentError> {
        match self.tools.iter().find(|t| t.name() == action.tool) {
            Some(tool) => {
                let output = tool.call(&action.tool_input).await?;
                Ok((output, tool.return_direct()))
            }
            None => Ok((
                format!(
                    "{} is not a valid tool, try one of [{}].",
                    action.tool,
                    self.tool_names().join(", ")
                ),
                false,
            )),
        }
    }

    async fn run_steps(
        &self,
        input: &str,
        callbacks: &[&dyn AgentCallback],
    ) -> Result<(String, TurnMetadata), AgentError> {
        let history = self.memory.lock().await.buffer();
        let mut scratchpad = String::new();
        let mut metadata = TurnMetadata::default();

        for _ in 0..self.options.max_iterations {
            let prompt = self.build_prompt(input, &history, &scratchpad);
            let text = self.llm.complete(&prompt, &[STOP_SEQUENCE]).await?;
            metadata.iterations += 1;
            self.log_step(&text);

            let observation = match parse_output(&text, &self.ai_prefix) {
                Ok(ParsedOutput::Finish(reply)) => return Ok((reply, metadata)),
                Ok(ParsedOutput::Action(action)) => {
                    for cb in callbacks {
                        cb.on_agent_action(&action).await;
                    }
                    let (observation, direct) = self.invoke_tool(&action).await?;
                    metadata.tools_used.push(action.tool.clone());
                    for cb in callbacks {
                        cb.on_tool_result(&action.tool, &observation).await;
                    }
                    if direct {
                        return Ok((observation, metadata));
                    }
                    observation
                }
                Err(err) => match &self.options.parsing_errors {
                    ParsingErrorPolicy::Propagate => return Err(err),
                    ParsingErrorPolicy::Retry { prompt } => {
                        debug!(error = %err, "retrying after unparseable output");
                        prompt.clone()
                    }
                    ParsingErrorPolicy::SurfaceRawText => {
                        let raw = strip_parse_wrapper(&err.to_string()).to_string();
                        return Ok((raw, metadata));
                    }
                },
            };

            scratchpad.push_str(&text);
            scratchpad.push_str(&format!("\n{OBSERVATION_PREFIX}{observation}\n{LLM_PREFIX}"));
        }

        Err(AgentError::IterationLimit(self.options.max_iterations))
    }
}

#[async_trait]
impl ChatAgent for ConversationalAgent {
    async fn run(
        &self,
        input: &str,
        callbacks: &[&dyn AgentCallback],
    ) -> Result<String, AgentError> {
        let started = Instant::now();
        match self.run_steps(input, callbacks).await {
            Ok((output, mut metadata)) => {
                metadata.duration_ms = started.elapsed().as_millis() as u64;
                self.memory.lock().await.save_context(input, &output);
                for cb in callbacks {
                    cb.on_turn(input, &output, &metadata).await;
                }
                Ok(output)
            }
            Err(err) => {
                for cb in callbacks {
                    cb.on_turn_error(input, &err).await;
                }
                Err(err)
            }
        }
    }

    fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            agent_type: AGENT_TYPE.to_string(),
            tool_names: self.tool_names(),
            max_iterations: self.options.max_iterations,
            verbose: self.options.verbose,
            memory_key: self.memory_key.clone(),
            parsing_errors: self.options.parsing_errors.clone(),
        }
    }
}
