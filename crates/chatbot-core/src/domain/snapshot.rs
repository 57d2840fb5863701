//! Configuration snapshots captured into dev-mode Experiments.
//!
//! Each loggable component has an explicit, versioned snapshot struct so the
//! experiment log schema does not follow the components' internal layout.
//! Credentials never appear in a snapshot.

use serde::{Deserialize, Serialize};

use crate::agent::ParsingErrorPolicy;

/// Bumped whenever a snapshot struct changes shape.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// The experiment fields assembly writes, in the order they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentField {
    Memory,
    Tools,
    Llm,
    Agent,
}

impl ExperimentField {
    pub const ALL: [ExperimentField; 4] = [
        ExperimentField::Memory,
        ExperimentField::Tools,
        ExperimentField::Llm,
        ExperimentField::Agent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentField::Memory => "memory",
            ExperimentField::Tools => "tools",
            ExperimentField::Llm => "llm",
            ExperimentField::Agent => "agent",
        }
    }
}

impl std::fmt::Display for ExperimentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation memory configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub schema_version: u32,
    pub memory_key: String,
    pub human_prefix: String,
    pub ai_prefix: String,
    pub input_key: String,
    /// Messages held when the snapshot was taken
    pub message_count: usize,
}

/// One tool as offered to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSnapshot {
    pub schema_version: u32,
    pub name: String,
    pub description: String,
    pub return_direct: bool,
}

/// Language-model client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub schema_version: u32,
    pub provider: String,
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: Option<u64>,
}

/// Assembled agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub schema_version: u32,
    pub agent_type: String,
    pub tool_names: Vec<String>,
    pub max_iterations: usize,
    pub verbose: bool,
    pub memory_key: String,
    pub parsing_errors: ParsingErrorPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_match_experiment_keys() {
        let names: Vec<&str> = ExperimentField::ALL.iter().map(|f| f.as_str()).collect();
        assert_eq!(names, vec!["memory", "tools", "llm", "agent"]);
        assert_eq!(
            serde_json::to_value(ExperimentField::Llm).unwrap(),
            serde_json::json!("llm")
        );
    }

    #[test]
    fn model_snapshot_has_no_credential_field() {
        let snapshot = ModelSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            provider: "openai".to_string(),
            model_name: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            max_tokens: None,
            request_timeout_secs: Some(60),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert!(keys.iter().all(|k| !k.contains("key")));
    }
}
