//! Buffer memory holding the whole conversation verbatim.

use serde::{Deserialize, Serialize};

use crate::domain::snapshot::{MemorySnapshot, SNAPSHOT_SCHEMA_VERSION};

pub const DEFAULT_MEMORY_KEY: &str = "chat_history";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Human,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub content: String,
}

/// Ordered human/AI exchanges, rendered into the prompt under `memory_key`.
#[derive(Debug, Clone)]
pub struct ConversationBufferMemory {
    memory_key: String,
    human_prefix: String,
    ai_prefix: String,
    input_key: String,
    messages: Vec<ChatMessage>,
}

impl Default for ConversationBufferMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationBufferMemory {
    pub fn new() -> Self {
        Self {
            memory_key: DEFAULT_MEMORY_KEY.to_string(),
            human_prefix: "Human".to_string(),
            ai_prefix: "AI".to_string(),
            input_key: "input".to_string(),
            messages: Vec::new(),
        }
    }

    pub fn memory_key(&self) -> &str {
        &self.memory_key
    }

    pub fn ai_prefix(&self) -> &str {
        &self.ai_prefix
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Store one completed exchange.
    pub fn save_context(&mut self, input: &str, output: &str) {
        self.messages.push(ChatMessage {
            speaker: Speaker::Human,
            content: input.to_string(),
        });
        self.messages.push(ChatMessage {
            speaker: Speaker::Ai,
            content: output.to_string(),
        });
    }

    /// Conversation so far as `Human: ...` / `AI: ...` lines.
    pub fn buffer(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let prefix = match m.speaker {
                    Speaker::Human => &self.human_prefix,
                    Speaker::Ai => &self.ai_prefix,
                };
                format!("{prefix}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            memory_key: self.memory_key.clone(),
            human_prefix: self.human_prefix.clone(),
            ai_prefix: self.ai_prefix.clone(),
            input_key: self.input_key.clone(),
            message_count: self.messages.len(),
        }
    }
}
