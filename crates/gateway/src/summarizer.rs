use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tally_core::config::AiConfig;
use tally_core::digest::{Summarizer, SummarizerError};
use tracing::debug;

/// Client for an OpenAI-style `responses` endpoint. One attempt per call.
#[derive(Clone)]
pub struct ResponsesSummarizer {
    http: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    model: String,
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: &'a str,
    store: bool,
    temperature: f32,
    tool_choice: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    status: Option<String>,
    role: Option<String>,
    #[serde(default)]
    content: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ResponsesSummarizer {
    pub fn new(
        api_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SummarizerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| SummarizerError::Transport(error.to_string()))?;
        Ok(Self { http, api_url: api_url.into(), api_key, model: model.into() })
    }

    pub fn from_config(config: &AiConfig) -> Result<Self, SummarizerError> {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl Summarizer for ResponsesSummarizer {
    async fn summarize(&self, instructions: &str, input: &str) -> Result<String, SummarizerError> {
        let request = ResponsesRequest {
            model: &self.model,
            instructions,
            input,
            store: false,
            temperature: 0.0,
            tool_choice: "none",
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| SummarizerError::Transport(error.to_string()))?;

        let status = response.status();
        let body =
            response.text().await.map_err(|error| SummarizerError::Transport(error.to_string()))?;
        if !status.is_success() {
            return Err(SummarizerError::Status { status: status.as_u16(), body });
        }

        let parsed: ResponsesBody =
            serde_json::from_str(&body).map_err(|error| SummarizerError::Decode(error.to_string()))?;
        let text = output_text(&parsed).ok_or(SummarizerError::MissingOutput)?;
        debug!(
            event_name = "summarizer.response.received",
            model = %self.model,
            input_bytes = input.len(),
            output_bytes = text.len(),
            "summary received"
        );
        Ok(text)
    }
}

/// First completed assistant message carrying an `output_text` segment.
fn output_text(body: &ResponsesBody) -> Option<String> {
    body.output
        .iter()
        .filter(|item| {
            item.kind == "message"
                && item.status.as_deref() == Some("completed")
                && item.role.as_deref() == Some("assistant")
        })
        .flat_map(|item| item.content.iter())
        .find(|content| content.kind == "output_text")
        .map(|content| content.text.clone())
}
