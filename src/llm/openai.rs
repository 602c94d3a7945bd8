// src/llm/openai.rs
// OpenAI client using the Responses API

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::http_client::LlmHttpClient;
use super::prompt::build_summary_prompt;
use super::provider::{CompletionClient, Summarizer};
use crate::config::ChatSettings;
use crate::db::{Sender, Turn};

const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Responses API Request Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ResponsesRequest {
    model: String,
    input: Input,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// Either a bare prompt string or a list of role messages
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Input {
    Text(String),
    Messages(Vec<InputMessage>),
}

#[derive(Debug, Serialize)]
struct InputMessage {
    role: &'static str,
    content: MessageContent,
}

/// Assistant turns go as plain strings, user turns as typed parts
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "input_text")]
    InputText { text: String },
    #[serde(rename = "input_image")]
    InputImage { image_url: String },
}

// ============================================================================
// Responses API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<ResponsesUsage>,
}

/// Output item; reasoning and tool items are ignored
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum OutputItem {
    #[serde(rename = "message")]
    Message(MessageOutput),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageOutput {
    #[serde(default)]
    content: Vec<OutputPart>,
}

#[derive(Debug, Deserialize)]
struct OutputPart {
    #[serde(rename = "type")]
    part_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ============================================================================
// Client Implementation
// ============================================================================

pub struct OpenAiClient {
    api_key: String,
    model: String,
    max_output_tokens: u32,
    http: LlmHttpClient,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, max_output_tokens: u32) -> Self {
        Self {
            api_key,
            model,
            max_output_tokens,
            http: LlmHttpClient::new(REQUEST_TIMEOUT, CONNECT_TIMEOUT),
        }
    }

    pub fn from_settings(api_key: String, settings: &ChatSettings) -> Self {
        Self::new(api_key, settings.model.clone(), settings.max_output_tokens)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Convert a turn to an input message. Turns with neither text nor an
    /// image payload produce nothing.
    fn convert_turn(turn: &Turn) -> Option<InputMessage> {
        let text = turn
            .text_content()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match turn.sender {
            Sender::Assistant => text.map(|t| InputMessage {
                role: "assistant",
                content: MessageContent::Text(t.to_string()),
            }),
            Sender::User => {
                let mut parts = Vec::new();
                if let Some(t) = text {
                    parts.push(ContentPart::InputText { text: t.to_string() });
                }
                if let Some(image) = turn.image() {
                    parts.push(ContentPart::InputImage {
                        image_url: image.data_url(),
                    });
                }
                if parts.is_empty() {
                    None
                } else {
                    Some(InputMessage {
                        role: "user",
                        content: MessageContent::Parts(parts),
                    })
                }
            }
        }
    }

    fn build_chat_request(&self, instructions: Option<&str>, turns: &[Turn]) -> ResponsesRequest {
        ResponsesRequest {
            model: self.model.clone(),
            input: Input::Messages(turns.iter().filter_map(Self::convert_turn).collect()),
            instructions: instructions.map(str::to_string),
            max_output_tokens: Some(self.max_output_tokens),
        }
    }

    fn build_prompt_request(&self, prompt: String) -> ResponsesRequest {
        ResponsesRequest {
            model: self.model.clone(),
            input: Input::Text(prompt),
            instructions: None,
            max_output_tokens: Some(self.max_output_tokens),
        }
    }

    /// Join all `output_text` parts of message items
    fn extract_content(output: &[OutputItem]) -> Option<String> {
        let texts: Vec<&str> = output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message(msg) => Some(msg),
                OutputItem::Other => None,
            })
            .flat_map(|msg| msg.content.iter())
            .filter(|part| part.part_type == "output_text" || part.part_type == "text")
            .filter_map(|part| part.text.as_deref())
            .collect();

        let joined = texts.join("\n");
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn parse_response(body: &str) -> Result<String> {
        let response: ResponsesResponse =
            serde_json::from_str(body).context("Failed to parse Responses API response")?;

        if let Some(usage) = &response.usage {
            debug!(
                response_id = response.id.as_deref().unwrap_or(""),
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Responses API usage"
            );
        }

        Self::extract_content(&response.output).ok_or_else(|| anyhow!("Empty response from model"))
    }

    async fn send(&self, request: &ResponsesRequest) -> Result<String> {
        let request_id = Uuid::new_v4().to_string();
        let start_time = Instant::now();
        let body = serde_json::to_string(request)?;

        debug!(request_id = %request_id, model = %self.model, "Sending Responses API request");

        let response_body = self
            .http
            .post_json_with_retry(&request_id, OPENAI_RESPONSES_URL, &self.api_key, body)
            .await?;
        let text = Self::parse_response(&response_body)?;

        info!(
            request_id = %request_id,
            duration_ms = start_time.elapsed().as_millis() as u64,
            response_len = text.len(),
            "Responses API request complete"
        );
        Ok(text)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, turn_count = turns.len()))]
    async fn complete(&self, instructions: Option<&str>, turns: &[Turn]) -> Result<String> {
        let request = self.build_chat_request(instructions, turns);
        if let Input::Messages(messages) = &request.input {
            if messages.is_empty() {
                return Err(anyhow!("Nothing to send: no turn has content"));
            }
        }
        self.send(&request).await
    }
}

#[async_trait]
impl Summarizer for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, turn_count = turns.len()))]
    async fn summarize(&self, existing: Option<&str>, turns: &[Turn]) -> Result<String> {
        let request = self.build_prompt_request(build_summary_prompt(existing, turns));
        self.send(&request).await
    }
}
