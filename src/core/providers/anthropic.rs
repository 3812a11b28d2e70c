//! Anthropic Messages API adapter
//!
//! Anthropic's wire format differs from OpenAI's in three ways this adapter
//! bridges: system prompts are a top-level `system` field rather than a
//! `system`-role message, usage is reported as `input_tokens`/`output_tokens`
//! rather than `prompt_tokens`/`completion_tokens`, and streaming is a
//! sequence of named SSE events (`message_start`, `content_block_delta`, ...)
//! rather than one uniform chunk shape.

use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::providers::ChatStream;
use crate::core::types::chat::{
    ChatChoice, ChatChunk, ChatDelta, ChatMessage, ChatRequest, ChatResponse, ChatStreamChoice,
    FinishReason, Usage,
};
use crate::core::types::message::MessageRole;
use crate::utils::error::{GatewayError, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicProvider {
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| GatewayError::Internal(format!("building http client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Hoist any `system`-role messages into Anthropic's top-level `system`
    /// field and translate the remaining turns.
    fn request_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut system_parts = Vec::new();
        let mut messages = Vec::new();

        for m in &request.messages {
            match m.role {
                MessageRole::System => system_parts.push(m.text_content()),
                _ => messages.push(translate_message(m)),
            }
        }

        let mut body = json!({
            "model": map_model_name(&request.model),
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": stream,
        });

        if !system_parts.is_empty() {
            body["system"] = json!(system_parts.join("\n\n"));
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(stop) = &request.stop {
            body["stop_sequences"] = json!(stop);
        }

        body
    }

    pub async fn chat(&self, request: &ChatRequest, timeout: Option<Duration>) -> Result<ChatResponse> {
        let body = self.request_body(request, false);

        let mut builder = self
            .client
            .post(self.url("/v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(d) = timeout {
            builder = builder.timeout(d);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::upstream_transient("anthropic", e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::upstream_transient("anthropic", e.to_string()))?;

        if !status.is_success() {
            return Err(classify_http_error(status.as_u16(), &bytes));
        }

        let raw: AnthropicMessage = serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::Translation(format!("anthropic response: {e}")))?;

        Ok(from_anthropic_message(raw, &request.model))
    }

    pub async fn chat_stream(&self, request: &ChatRequest, timeout: Option<Duration>) -> Result<ChatStream> {
        let body = self.request_body(request, true);

        let mut builder = self
            .client
            .post(self.url("/v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(d) = timeout {
            builder = builder.timeout(d);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::upstream_transient("anthropic", e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let bytes = resp.bytes().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &bytes));
        }

        let model = request.model.clone();
        Ok(Box::pin(parse_sse_stream(resp.bytes_stream(), model)))
    }

    pub async fn probe(&self) -> bool {
        let body = json!({
            "model": "claude-3-haiku-20240307",
            "messages": [{"role": "user", "content": "ping"}],
            "max_tokens": 1,
        });

        self.client
            .post(self.url("/v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success() || r.status().as_u16() == 400)
            .unwrap_or(false)
    }
}

/// Translate a canonical model name to Anthropic's vendor model id, passing
/// unrecognized names through unchanged.
fn map_model_name(model: &str) -> &str {
    match model {
        "claude-3-opus" => "claude-3-opus-20240229",
        "claude-3-sonnet" => "claude-3-sonnet-20240229",
        "claude-3-haiku" => "claude-3-haiku-20240307",
        "claude-3.5-sonnet" => "claude-3-5-sonnet-20240620",
        "claude-2" | "claude-2.1" => "claude-2.1",
        "claude-2.0" => "claude-2.0",
        other => other,
    }
}

fn translate_message(m: &ChatMessage) -> Value {
    json!({
        "role": match m.role {
            MessageRole::Assistant => "assistant",
            _ => "user",
        },
        "content": m.text_content(),
    })
}

#[derive(Debug, Deserialize)]
struct AnthropicMessage {
    id: String,
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

fn map_stop_reason(reason: Option<&str>) -> Option<FinishReason> {
    match reason {
        Some("end_turn") | Some("stop_sequence") => Some(FinishReason::Stop),
        Some("max_tokens") => Some(FinishReason::Length),
        Some("tool_use") => Some(FinishReason::ToolCalls),
        _ => None,
    }
}

fn from_anthropic_message(raw: AnthropicMessage, model: &str) -> ChatResponse {
    let text = raw
        .content
        .iter()
        .filter_map(|b| match b {
            AnthropicContentBlock::Text { text } => Some(text.as_str()),
            AnthropicContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");

    ChatResponse {
        id: raw.id,
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: MessageRole::Assistant,
                content: Some(text.into()),
                ..Default::default()
            },
            finish_reason: map_stop_reason(raw.stop_reason.as_deref()),
        }],
        usage: Some(Usage::new(raw.usage.input_tokens, raw.usage.output_tokens)),
        provider: "anthropic".to_string(),
        latency_ms: 0,
    }
}

/// Anthropic's typed SSE events, named by `event:` line rather than uniform
/// JSON shape. Only the subset needed to accumulate a chat response is
/// modeled; unknown events are ignored rather than erroring, since Anthropic
/// adds new event types over time.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    MessageStart {
        message: AnthropicStreamMessageStart,
    },
    ContentBlockDelta {
        delta: AnthropicStreamDelta,
    },
    MessageDelta {
        delta: AnthropicStreamMessageDelta,
        usage: AnthropicStreamDeltaUsage,
    },
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamMessageStart {
    id: String,
    usage: AnthropicStreamStartUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamStartUsage {
    input_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamDelta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamMessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamDeltaUsage {
    output_tokens: u32,
}

fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    model: String,
) -> impl Stream<Item = Result<ChatChunk>> + Send + 'static {
    async_stream::stream! {
        let mut buf = String::new();
        let mut message_id = String::new();
        let mut input_tokens = 0u32;
        tokio::pin!(byte_stream);

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(GatewayError::upstream_transient("anthropic", e.to_string()));
                    return;
                }
            };
            buf.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buf.find("\n\n") {
                let record: String = buf.drain(..pos + 2).collect();
                let data_line = record.lines().find_map(|l| l.strip_prefix("data: "));
                let Some(payload) = data_line else { continue };

                let event: AnthropicStreamEvent = match serde_json::from_str(payload) {
                    Ok(e) => e,
                    Err(e) => {
                        yield Err(GatewayError::Translation(format!("anthropic event: {e}")));
                        continue;
                    }
                };

                match event {
                    AnthropicStreamEvent::MessageStart { message } => {
                        message_id = message.id;
                        input_tokens = message.usage.input_tokens;
                    }
                    AnthropicStreamEvent::ContentBlockDelta { delta: AnthropicStreamDelta::TextDelta { text } } => {
                        yield Ok(ChatChunk {
                            id: message_id.clone(),
                            object: "chat.completion.chunk".to_string(),
                            created: chrono::Utc::now().timestamp(),
                            model: model.clone(),
                            choices: vec![ChatStreamChoice {
                                index: 0,
                                delta: ChatDelta { role: None, content: Some(text) },
                                finish_reason: None,
                            }],
                            usage: None,
                        });
                    }
                    AnthropicStreamEvent::MessageDelta { delta, usage } => {
                        yield Ok(ChatChunk {
                            id: message_id.clone(),
                            object: "chat.completion.chunk".to_string(),
                            created: chrono::Utc::now().timestamp(),
                            model: model.clone(),
                            choices: vec![ChatStreamChoice {
                                index: 0,
                                delta: ChatDelta::default(),
                                finish_reason: map_stop_reason(delta.stop_reason.as_deref()),
                            }],
                            usage: Some(Usage::new(input_tokens, usage.output_tokens)),
                        });
                    }
                    AnthropicStreamEvent::MessageStop => {
                        yield Ok(ChatChunk {
                            id: message_id.clone(),
                            object: "chat.completion.chunk".to_string(),
                            created: chrono::Utc::now().timestamp(),
                            model: model.clone(),
                            choices: vec![ChatStreamChoice {
                                index: 0,
                                delta: ChatDelta::default(),
                                finish_reason: Some(FinishReason::Stop),
                            }],
                            usage: None,
                        });
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

fn classify_http_error(status: u16, body: &[u8]) -> GatewayError {
    let message = String::from_utf8_lossy(body).to_string();
    match status {
        429 | 500..=599 => GatewayError::upstream_transient("anthropic", message),
        _ => GatewayError::upstream_permanent("anthropic", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_stop_reasons() {
        assert_eq!(map_stop_reason(Some("end_turn")), Some(FinishReason::Stop));
        assert_eq!(map_stop_reason(Some("max_tokens")), Some(FinishReason::Length));
        assert_eq!(map_stop_reason(Some("tool_use")), Some(FinishReason::ToolCalls));
        assert_eq!(map_stop_reason(None), None);
    }

    #[test]
    fn hoists_system_messages() {
        let provider = AnthropicProvider::new("https://api.anthropic.com".into(), "key".into()).unwrap();
        let request = ChatRequest::new("claude-3-5-sonnet-20241022")
            .add_system_message("be terse")
            .add_user_message("hi");
        let body = provider.request_body(&request, false);
        assert_eq!(body["system"], json!("be terse"));
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }
}
