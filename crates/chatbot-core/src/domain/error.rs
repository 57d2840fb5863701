//! Error taxonomy for the chatbot.

use chatbot_logger::StorageError;

/// Errors raised by the agent and its collaborators (model, tools, parser).
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("language model call failed: {0}")]
    Model(String),

    #[error("tool {tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// The model produced text that is neither a tool call nor an answer.
    #[error("Could not parse LLM output: `{output}`")]
    OutputParsing { output: String },

    #[error("agent stopped after {0} iterations without an answer")]
    IterationLimit(usize),

    #[error("agent configuration error: {0}")]
    Configuration(String),
}

/// Chatbot errors.
#[derive(Debug, thiserror::Error)]
pub enum ChatbotError {
    #[error("could not resolve chatbot version: {0}")]
    VersionResolution(String),

    #[error("could not resolve current user: {0}")]
    UserResolution(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for chatbot operations.
pub type Result<T> = std::result::Result<T, ChatbotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_error_display_keeps_raw_output() {
        let err = AgentError::OutputParsing {
            output: "I think the answer is 4".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Could not parse LLM output: `I think the answer is 4`"
        );
    }

    #[test]
    fn storage_errors_convert_and_keep_their_kind() {
        let err: ChatbotError = StorageError::Backend("timeout".to_string()).into();
        assert!(matches!(err, ChatbotError::Storage(StorageError::Backend(_))));
        assert!(err.to_string().contains("timeout"));
    }
}
