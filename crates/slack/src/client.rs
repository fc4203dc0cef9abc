//! Thin Slack Web API client. Tokens are passed per call because one
//! process serves many workspaces.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tally_core::config::SlackConfig;
use tally_core::digest::DeliveryError;
use thiserror::Error;
use tracing::debug;

use crate::blocks::{Block, View};
use crate::chunking::MessageBody;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack `{method}` request failed: {message}")]
    Transport { method: String, message: String },
    #[error("slack `{method}` returned status {status}: {body}")]
    Http { method: String, status: u16, body: String },
    #[error("slack `{method}` failed with `{error}`")]
    Api { method: String, error: String, messages: Vec<String> },
    #[error("slack `{method}` response could not be decoded: {message}")]
    Decode { method: String, message: String },
    #[error("slack `{method}` response is missing `{field}`")]
    MissingField { method: String, field: &'static str },
}

impl From<SlackApiError> for DeliveryError {
    fn from(error: SlackApiError) -> Self {
        match error {
            SlackApiError::Api { error, messages, .. } => DeliveryError::Api { error, messages },
            other => DeliveryError::Transport(other.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FileUpload {
    pub file_name: String,
    pub title: String,
    pub bytes: Vec<u8>,
    pub channel_id: Option<String>,
    pub initial_comment: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SlackWebClient {
    http: reqwest::Client,
    api_base: String,
}

impl SlackWebClient {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, SlackApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("tally-digest"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|error| SlackApiError::Transport {
                method: "client".to_owned(),
                message: error.to_string(),
            })?;

        Ok(Self { http, api_base: api_base.trim_end_matches('/').to_owned() })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, SlackApiError> {
        Self::new(&config.api_base_url, DEFAULT_TIMEOUT)
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    pub async fn post_message(
        &self,
        token: &SecretString,
        channel: &str,
        blocks: &[Block],
    ) -> Result<(), SlackApiError> {
        let body = MessageBody { channel, blocks };
        self.call(
            "chat.postMessage",
            self.http
                .post(self.url("chat.postMessage"))
                .bearer_auth(token.expose_secret())
                .json(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn publish_view(
        &self,
        token: &SecretString,
        user_id: &str,
        view: &View,
    ) -> Result<(), SlackApiError> {
        let body = json!({ "user_id": user_id, "view": view });
        self.call(
            "views.publish",
            self.http.post(self.url("views.publish")).bearer_auth(token.expose_secret()).json(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn open_view(
        &self,
        token: &SecretString,
        trigger_id: &str,
        view: &View,
    ) -> Result<(), SlackApiError> {
        let body = json!({ "trigger_id": trigger_id, "view": view });
        self.call(
            "views.open",
            self.http.post(self.url("views.open")).bearer_auth(token.expose_secret()).json(&body),
        )
        .await?;
        Ok(())
    }

    /// Stacks `view` on top of the modal that produced `trigger_id`.
    pub async fn push_view(
        &self,
        token: &SecretString,
        trigger_id: &str,
        view: &View,
    ) -> Result<(), SlackApiError> {
        let body = json!({ "trigger_id": trigger_id, "view": view });
        self.call(
            "views.push",
            self.http.post(self.url("views.push")).bearer_auth(token.expose_secret()).json(&body),
        )
        .await?;
        Ok(())
    }

    /// Three-step external upload. Returns the file's `url_private`.
    pub async fn upload_file(
        &self,
        token: &SecretString,
        upload: FileUpload,
    ) -> Result<String, SlackApiError> {
        let length = upload.bytes.len().to_string();
        let ticket = self
            .call(
                "files.getUploadURLExternal",
                self.http
                    .get(self.url("files.getUploadURLExternal"))
                    .bearer_auth(token.expose_secret())
                    .query(&[("filename", upload.file_name.as_str()), ("length", length.as_str())]),
            )
            .await?;
        let upload_url = required_str(&ticket, "files.getUploadURLExternal", "upload_url")?;
        let file_id = required_str(&ticket, "files.getUploadURLExternal", "file_id")?;

        let part = Part::bytes(upload.bytes).file_name(upload.file_name.clone());
        let response = self
            .http
            .post(upload_url)
            .bearer_auth(token.expose_secret())
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|error| transport("upload", error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackApiError::Http { method: "upload".to_owned(), status: status.as_u16(), body });
        }

        let mut complete = json!({ "files": [{ "id": file_id, "title": upload.title }] });
        if let Some(channel_id) = upload.channel_id {
            complete["channel_id"] = Value::String(channel_id);
        }
        if let Some(comment) = upload.initial_comment {
            complete["initial_comment"] = Value::String(comment);
        }
        let completed = self
            .call(
                "files.completeUploadExternal",
                self.http
                    .post(self.url("files.completeUploadExternal"))
                    .bearer_auth(token.expose_secret())
                    .json(&complete),
            )
            .await?;

        completed
            .pointer("/files/0/url_private")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| SlackApiError::MissingField {
                method: "files.completeUploadExternal".to_owned(),
                field: "url_private",
            })
    }

    async fn call(&self, method: &str, request: RequestBuilder) -> Result<Value, SlackApiError> {
        let response = request.send().await.map_err(|error| transport(method, error))?;
        let status = response.status();
        let body = response.text().await.map_err(|error| transport(method, error))?;
        if !status.is_success() {
            return Err(SlackApiError::Http { method: method.to_owned(), status: status.as_u16(), body });
        }

        let value: Value = serde_json::from_str(&body).map_err(|error| SlackApiError::Decode {
            method: method.to_owned(),
            message: error.to_string(),
        })?;
        if value.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = value.get("error").and_then(Value::as_str).unwrap_or("unknown_error").to_owned();
            let messages = value
                .pointer("/response_metadata/messages")
                .and_then(Value::as_array)
                .map(|messages| {
                    messages.iter().filter_map(Value::as_str).map(str::to_owned).collect()
                })
                .unwrap_or_default();
            return Err(SlackApiError::Api { method: method.to_owned(), error, messages });
        }

        debug!(event_name = "slack.api.ok", method, "slack call succeeded");
        Ok(value)
    }
}

fn transport(method: &str, error: reqwest::Error) -> SlackApiError {
    SlackApiError::Transport { method: method.to_owned(), message: error.to_string() }
}

fn required_str(value: &Value, method: &str, field: &'static str) -> Result<String, SlackApiError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|found| !found.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| SlackApiError::MissingField { method: method.to_owned(), field })
}
