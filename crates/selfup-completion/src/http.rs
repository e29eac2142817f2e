use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use selfup_core::{Result, UpgradeError};
use tracing::debug;

use crate::client::{CompletionClient, CompletionRequest};
use crate::settings::CompletionSettings;

const ERROR_BODY_PREVIEW_CHARS: usize = 512;

/// OpenAI-compatible `chat/completions` client.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: Client,
    settings: CompletionSettings,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    error: Option<ChatError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    message: String,
}

impl HttpCompletionClient {
    pub fn new(settings: CompletionSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| {
                UpgradeError::CompletionUnavailable(format!("failed building http client: {err}"))
            })?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = self.settings.chat_completions_url();
        let body = ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_payload,
                },
            ],
        };
        debug!(
            url = %url,
            model = %self.settings.model,
            payload_bytes = request.user_payload.len(),
            "requesting completion"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.settings.api_key.expose())
            .json(&body)
            .send()
            .map_err(map_transport_error)?;
        let status = response.status();
        let text = response.text().map_err(map_transport_error)?;
        debug!(status = %status, body_bytes = text.len(), "completion response received");

        if !status.is_success() {
            return Err(UpgradeError::CompletionUnavailable(format!(
                "status={status} body='{}'",
                preview(&text)
            )));
        }

        extract_message_content(&text)
    }
}

/// Pulls `choices[0].message.content` out of a chat completion body.
pub fn extract_message_content(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|err| {
        UpgradeError::CompletionUnavailable(format!(
            "unreadable completion body ({err}): '{}'",
            preview(body)
        ))
    })?;

    if let Some(error) = parsed.error {
        return Err(UpgradeError::CompletionUnavailable(format!(
            "service reported an error: {}",
            error.message
        )));
    }

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(UpgradeError::CompletionUnavailable(
            "completion returned no content".to_string(),
        ));
    }

    Ok(content)
}

fn map_transport_error(err: reqwest::Error) -> UpgradeError {
    if err.is_timeout() {
        return UpgradeError::Cancelled;
    }
    UpgradeError::CompletionUnavailable(format!("request failed: {err}"))
}

pub(crate) fn preview(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(ERROR_BODY_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
