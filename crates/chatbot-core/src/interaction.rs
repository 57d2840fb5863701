//! Line-oriented conversation loop.

use std::time::Instant;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::agent::{AgentCallback, ChatAgent};
use crate::domain::error::Result;
use crate::obs;

pub const PROMPT: &str = "Message:\n";

/// Reads one message per line, forwards it to the agent and writes back
/// the reply unchanged.
///
/// Blank lines are skipped. End of input ends the loop normally; an agent
/// error ends it with that error once the callback has seen it.
pub struct InteractionLoop<'a> {
    agent: &'a dyn ChatAgent,
    callback: &'a dyn AgentCallback,
}

impl<'a> InteractionLoop<'a> {
    pub fn new(agent: &'a dyn ChatAgent, callback: &'a dyn AgentCallback) -> Self {
        Self { agent, callback }
    }

    /// Run until end of input, returning the number of answered messages.
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> Result<u64>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        let mut turns = 0u64;

        loop {
            writer.write_all(PROMPT.as_bytes()).await?;
            writer.flush().await?;

            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                debug!(turns, "end of input");
                return Ok(turns);
            }
            let line = decode_line(&buf);
            if line.trim().is_empty() {
                continue;
            }

            let started = Instant::now();
            let outcome = self.agent.run(&line, &[self.callback]).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(reply) => {
                    turns += 1;
                    writer.write_all(reply.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                    obs::emit_turn_completed(turns, elapsed_ms, true);
                }
                Err(err) => {
                    obs::emit_turn_completed(turns + 1, elapsed_ms, false);
                    return Err(err.into());
                }
            }
        }
    }
}

/// Drop the line terminator; invalid UTF-8 is replaced rather than fatal.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fakes::ScriptedModel;
    use crate::agent::{AgentOptions, ConversationBufferMemory, ConversationalAgent};
    use crate::domain::error::{AgentError, ChatbotError};
    use std::sync::Arc;
    use tokio::io::BufReader;

    struct NoCallback;
    impl AgentCallback for NoCallback {}

    fn agent(replies: &[&str]) -> ConversationalAgent {
        let model = Arc::new(ScriptedModel::new(replies.iter().copied()));
        ConversationalAgent::new(
            model,
            vec![],
            ConversationBufferMemory::new(),
            AgentOptions::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn prints_the_reply_verbatim() {
        let agent = agent(&["AI: **Paris**, obviously.  "]);
        let input = BufReader::new(&b"capital of France?\n"[..]);
        let mut output = Vec::new();

        let turns = InteractionLoop::new(&agent, &NoCallback)
            .run(input, &mut output)
            .await
            .unwrap();

        assert_eq!(turns, 1);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Message:\n**Paris**, obviously.\nMessage:\n"
        );
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_end_the_conversation() {
        let model = Arc::new(ScriptedModel::new(["AI: got it", "AI: still here"]));
        let agent = ConversationalAgent::new(
            model.clone(),
            vec![],
            ConversationBufferMemory::new(),
            AgentOptions::default(),
        )
        .unwrap();
        let input = BufReader::new(&b"caf\xe9 menu\nnext\n"[..]);
        let mut output = Vec::new();

        let turns = InteractionLoop::new(&agent, &NoCallback)
            .run(input, &mut output)
            .await
            .unwrap();

        assert_eq!(turns, 2);
        assert!(model.prompts()[0].contains("caf\u{FFFD} menu"));
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Message:\ngot it\nMessage:\nstill here\nMessage:\n"
        );
    }

    #[tokio::test]
    async fn blank_lines_are_skipped_and_crlf_is_stripped() {
        let agent = agent(&["AI: one", "AI: two"]);
        let input = BufReader::new(&b"first\r\n\n   \nsecond"[..]);
        let mut output = Vec::new();

        let turns = InteractionLoop::new(&agent, &NoCallback)
            .run(input, &mut output)
            .await
            .unwrap();

        assert_eq!(turns, 2);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Message:\none\nMessage:\nMessage:\nMessage:\ntwo\nMessage:\n"
        );
    }

    #[tokio::test]
    async fn empty_input_exits_cleanly() {
        let agent = agent(&[]);
        let mut output = Vec::new();
        let turns = InteractionLoop::new(&agent, &NoCallback)
            .run(BufReader::new(&b""[..]), &mut output)
            .await
            .unwrap();
        assert_eq!(turns, 0);
        assert_eq!(output, b"Message:\n");
    }

    #[tokio::test]
    async fn agent_error_ends_the_loop() {
        let agent = agent(&["AI: ok"]);
        let input = BufReader::new(&b"one\ntwo\nthree\n"[..]);
        let mut output = Vec::new();

        let err = InteractionLoop::new(&agent, &NoCallback)
            .run(input, &mut output)
            .await
            .unwrap_err();

        assert!(matches!(err, ChatbotError::Agent(AgentError::Model(_))));
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Message:\nok\nMessage:\n"
        );
    }
}
