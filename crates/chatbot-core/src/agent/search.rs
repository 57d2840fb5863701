//! Web search through SerpAPI.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::Tool;
use crate::domain::error::AgentError;

const BASE_URL: &str = "https://serpapi.com/search";
const NO_RESULT: &str = "No good search result found";

pub const DEFAULT_SEARCH_NAME: &str = "Search";
pub const DEFAULT_SEARCH_DESCRIPTION: &str =
    "useful for when you need to answer questions about current events or the current state of the world";

/// Minimal SerpAPI client for Google results.
#[derive(Clone)]
pub struct SerpApiClient {
    client: Client,
    api_key: String,
    engine: String,
    google_domain: String,
    gl: String,
    hl: String,
}

impl SerpApiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            engine: "google".to_string(),
            google_domain: "google.com".to_string(),
            gl: "us".to_string(),
            hl: "en".to_string(),
        }
    }

    /// Raw SerpAPI response for `query`.
    pub async fn search(&self, query: &str) -> Result<Value, AgentError> {
        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("engine", self.engine.as_str()),
                ("google_domain", self.google_domain.as_str()),
                ("gl", self.gl.as_str()),
                ("hl", self.hl.as_str()),
            ])
            .send()
            .await
            .map_err(|err| search_error(format!("SerpAPI request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read SerpAPI error body".to_string());
            return Err(search_error(format!(
                "SerpAPI returned {}: {body}",
                status.as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|err| search_error(format!("Failed to parse SerpAPI response: {err}")))
    }

    /// Search and reduce the response to a single text answer.
    pub async fn run(&self, query: &str) -> Result<String, AgentError> {
        let payload = self.search(query).await?;
        extract_answer(&payload)
    }
}

fn search_error(message: String) -> AgentError {
    AgentError::Tool {
        tool: DEFAULT_SEARCH_NAME.to_string(),
        message,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pick the most direct answer out of a SerpAPI response.
///
/// Preference: answer box (answer, snippet, highlighted words), knowledge
/// graph description, then the first organic result snippet.
pub fn extract_answer(payload: &Value) -> Result<String, AgentError> {
    if let Some(error) = payload.get("error") {
        return Err(search_error(format!("Got error from SerpAPI: {error}")));
    }

    if let Some(answer_box) = payload.get("answer_box") {
        let highlighted = answer_box
            .get("snippet_highlighted_words")
            .and_then(Value::as_array)
            .and_then(|words| words.first());
        if let Some(answer) = non_empty_str(answer_box.get("answer"))
            .or_else(|| non_empty_str(answer_box.get("snippet")))
            .or_else(|| non_empty_str(highlighted))
        {
            return Ok(answer);
        }
    }

    if let Some(description) =
        non_empty_str(payload.get("knowledge_graph").and_then(|kg| kg.get("description")))
    {
        return Ok(description);
    }

    let organic = payload
        .get("organic_results")
        .and_then(Value::as_array)
        .and_then(|results| results.iter().find_map(|r| non_empty_str(r.get("snippet"))));
    if let Some(snippet) = organic {
        return Ok(snippet);
    }

    Ok(NO_RESULT.to_string())
}

/// The `Search` tool offered to the agent.
#[derive(Clone)]
pub struct SearchTool {
    client: SerpApiClient,
    name: String,
    description: String,
}

impl SearchTool {
    pub fn new(client: SerpApiClient) -> Self {
        Self {
            client,
            name: DEFAULT_SEARCH_NAME.to_string(),
            description: DEFAULT_SEARCH_DESCRIPTION.to_string(),
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, input: &str) -> Result<String, AgentError> {
        debug!(tool = %self.name, query = %input, "running web search");
        self.client.run(input).await
    }
}
