use async_trait::async_trait;
use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::models::{fetch_models, normalize_models};
use crate::api::{ChatRequest, ChatResponse, ChatToolCallDelta, ModelInfo};
use crate::core::error::AgentError;
use crate::utils::url::construct_api_url;

/// One event of a streamed model reply.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(String),
    ToolCall(ChatToolCallDelta),
    Error(String),
    End,
}

/// Something that can answer a chat request with a stream of events.
///
/// `open_stream` returns once the request has been accepted; failures before
/// that point are errors, failures afterwards arrive as `StreamMessage::Error`.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn open_stream(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<StreamMessage>, AgentError>;
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(payload: &str, tx: &mpsc::UnboundedSender<StreamMessage>) -> bool {
    if payload == "[DONE]" {
        let _ = tx.send(StreamMessage::End);
        return true;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => {
            if let Some(choice) = response.choices.into_iter().next() {
                if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                    let _ = tx.send(StreamMessage::Chunk(content));
                }
                for call in choice.delta.tool_calls.unwrap_or_default() {
                    let _ = tx.send(StreamMessage::ToolCall(call));
                }
            }
            false
        }
        Err(_) => {
            if payload.trim().is_empty() {
                return false;
            }

            let _ = tx.send(StreamMessage::Error(format_api_error(payload)));
            let _ = tx.send(StreamMessage::End);
            true
        }
    }
}

fn process_sse_line(line: &str, tx: &mpsc::UnboundedSender<StreamMessage>) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx))
        .unwrap_or(false)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Render an error body for the terminal: a one-line summary when the body
/// carries one, then the body itself.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error: <empty response>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
                Some(summary) => format!("API Error: {summary}\n{pretty_json}"),
                None => format!("API Error:\n{pretty_json}"),
            };
        }
    }

    format!("API Error: {trimmed}")
}

/// OpenAI-compatible `chat/completions` endpoint with SSE streaming.
#[derive(Clone)]
pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpChatBackend {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, Box<dyn std::error::Error>> {
        let mut models = fetch_models(&self.client, &self.base_url, &self.api_key)
            .await?
            .data;
        normalize_models(&mut models);
        Ok(models)
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn open_stream(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<StreamMessage>, AgentError> {
        let chat_url = construct_api_url(&self.base_url, "chat/completions");
        debug!(
            url = %chat_url,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "submitting chat request"
        );

        let response = self
            .client
            .post(chat_url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::ModelStream(format_api_error(&e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            warn!(%status, "chat request rejected");
            return Err(AgentError::ModelStream(format!(
                "HTTP {status}: {}",
                format_api_error(&error_text)
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            tokio::select! {
                _ = async move {
                    let mut stream = response.bytes_stream();
                    let mut buffer: Vec<u8> = Vec::new();

                    while let Some(chunk) = stream.next().await {
                        let chunk_bytes = match chunk {
                            Ok(bytes) => bytes,
                            Err(e) => {
                                let _ = tx.send(StreamMessage::Error(format_api_error(&e.to_string())));
                                let _ = tx.send(StreamMessage::End);
                                return;
                            }
                        };
                        buffer.extend_from_slice(&chunk_bytes);

                        while let Some(newline_pos) = memchr(b'\n', &buffer) {
                            let should_end = match std::str::from_utf8(&buffer[..newline_pos]) {
                                Ok(line) => process_sse_line(line.trim(), &tx),
                                Err(e) => {
                                    warn!(error = %e, "invalid UTF-8 in stream");
                                    false
                                }
                            };
                            buffer.drain(..=newline_pos);
                            if should_end {
                                return;
                            }
                        }
                    }

                    let _ = tx.send(StreamMessage::End);
                } => {}
                _ = cancel.cancelled() => {
                    debug!("chat stream cancelled");
                }
            }
        });

        Ok(rx)
    }
}
