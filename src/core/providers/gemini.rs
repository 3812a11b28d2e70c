//! Google Gemini generateContent adapter
//!
//! Gemini's request shape nests messages under `contents[].parts[].text` and
//! moves the API key into a query parameter rather than a header; system
//! prompts go in a dedicated `systemInstruction` field, mirroring Anthropic's
//! hoist but with a different field name. Streaming is requested with
//! `?alt=sse`, framed the same as the other two vendors, but parsed here with
//! `futures::stream::unfold` rather than `async_stream!` to keep the parsing
//! style between vendors deliberately non-uniform.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::providers::ChatStream;
use crate::core::types::chat::{
    ChatChoice, ChatChunk, ChatDelta, ChatMessage, ChatRequest, ChatResponse, ChatStreamChoice,
    FinishReason, Usage,
};
use crate::core::types::message::MessageRole;
use crate::utils::error::{GatewayError, Result};

#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiProvider {
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

    fn endpoint(&self, model: &str, method: &str, stream: bool) -> String {
        let mut url = format!(
            "{}/v1beta/models/{model}:{method}?key={}",
            self.base_url.trim_end_matches('/'),
            self.api_key,
        );
        if stream {
            url.push_str("&alt=sse");
        }
        url
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for m in &request.messages {
            match m.role {
                MessageRole::System => system_parts.push(m.text_content()),
                MessageRole::Assistant => contents.push(json!({
                    "role": "model",
                    "parts": [{"text": m.text_content()}],
                })),
                _ => contents.push(json!({
                    "role": "user",
                    "parts": [{"text": m.text_content()}],
                })),
            }
        }

        let mut body = json!({ "contents": contents });

        if !system_parts.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{"text": system_parts.join("\n\n")}] });
        }

        let mut generation_config = json!({});
        if let Some(temperature) = request.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            generation_config["topP"] = json!(top_p);
        }
        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }
        if let Some(stop) = &request.stop {
            generation_config["stopSequences"] = json!(stop);
        }
        if generation_config.as_object().map(|o| !o.is_empty()).unwrap_or(false) {
            body["generationConfig"] = generation_config;
        }

        body
    }

    pub async fn chat(&self, request: &ChatRequest, timeout: Option<Duration>) -> Result<ChatResponse> {
        let body = self.request_body(request);

        let mut builder = self.client.post(self.endpoint(&request.model, "generateContent", false)).json(&body);
        if let Some(d) = timeout {
            builder = builder.timeout(d);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::upstream_transient("gemini", e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::upstream_transient("gemini", e.to_string()))?;

        if !status.is_success() {
            return Err(classify_http_error(status.as_u16(), &bytes));
        }

        let raw: GeminiResponse = serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::Translation(format!("gemini response: {e}")))?;

        Ok(from_gemini_response(raw, &request.model))
    }

    pub async fn chat_stream(&self, request: &ChatRequest, timeout: Option<Duration>) -> Result<ChatStream> {
        let body = self.request_body(request);

        let mut builder = self.client.post(self.endpoint(&request.model, "streamGenerateContent", true)).json(&body);
        if let Some(d) = timeout {
            builder = builder.timeout(d);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::upstream_transient("gemini", e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let bytes = resp.bytes().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &bytes));
        }

        let model = request.model.clone();
        Ok(Box::pin(parse_sse_stream(resp.bytes_stream(), model)))
    }

    pub async fn probe(&self) -> bool {
        self.client
            .get(format!(
                "{}/v1beta/models?key={}",
                self.base_url.trim_end_matches('/'),
                self.api_key
            ))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: GeminiContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    prompt_token_count: u32,
    candidates_token_count: u32,
}

fn map_finish_reason(reason: Option<&str>) -> Option<FinishReason> {
    match reason {
        Some("STOP") => Some(FinishReason::Stop),
        Some("MAX_TOKENS") => Some(FinishReason::Length),
        Some(_) => Some(FinishReason::ContentFilter),
        None => None,
    }
}

fn candidate_text(candidate: &GeminiCandidate) -> String {
    candidate.content.parts.iter().map(|p| p.text.as_str()).collect()
}

fn from_gemini_response(raw: GeminiResponse, model: &str) -> ChatResponse {
    let candidate = raw.candidates.first();
    let text = candidate.map(candidate_text).unwrap_or_default();
    let finish_reason = candidate.and_then(|c| map_finish_reason(c.finish_reason.as_deref()));

    ChatResponse {
        id: crate::utils::generate_request_id(),
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
            finish_reason,
        }],
        usage: raw
            .usage_metadata
            .map(|u| Usage::new(u.prompt_token_count, u.candidates_token_count)),
        provider: "gemini".to_string(),
        latency_ms: 0,
    }
}

fn classify_http_error(status: u16, body: &[u8]) -> GatewayError {
    let message = String::from_utf8_lossy(body).to_string();
    match status {
        429 | 500..=599 => GatewayError::upstream_transient("gemini", message),
        _ => GatewayError::upstream_permanent("gemini", message),
    }
}

struct UnfoldState {
    byte_stream: std::pin::Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buf: BytesMut,
    done: bool,
}

/// Pull complete `data: ...\n\n` SSE records one at a time out of the byte
/// stream, yielding a `ChatChunk` per record.
fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    model: String,
) -> impl Stream<Item = Result<ChatChunk>> + Send + 'static {
    let initial = UnfoldState {
        byte_stream: Box::pin(byte_stream),
        buf: BytesMut::new(),
        done: false,
    };

    stream::unfold(initial, move |mut state| {
        let model = model.clone();
        async move {
            loop {
                if state.done {
                    return None;
                }

                if let Some(pos) = find_double_newline(&state.buf) {
                    let record = state.buf.split_to(pos + 2);
                    let text = String::from_utf8_lossy(&record).to_string();
                    let Some(payload) = text.lines().find_map(|l| l.strip_prefix("data: ")) else {
                        continue;
                    };

                    let parsed: std::result::Result<GeminiResponse, _> = serde_json::from_str(payload);
                    let chunk = match parsed {
                        Ok(raw) => Ok(gemini_response_to_chunk(raw, &model)),
                        Err(e) => Err(GatewayError::Translation(format!("gemini chunk: {e}"))),
                    };
                    return Some((chunk, state));
                }

                match state.byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        state.buf.extend_from_slice(&bytes);
                        continue;
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((
                            Err(GatewayError::upstream_transient("gemini", e.to_string())),
                            state,
                        ));
                    }
                    None => {
                        state.done = true;
                        return None;
                    }
                }
            }
        }
    })
}

fn find_double_newline(buf: &BytesMut) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn gemini_response_to_chunk(raw: GeminiResponse, model: &str) -> ChatChunk {
    let candidate = raw.candidates.first();
    let text = candidate.map(candidate_text).unwrap_or_default();
    let finish_reason = candidate.and_then(|c| map_finish_reason(c.finish_reason.as_deref()));

    ChatChunk {
        id: crate::utils::generate_request_id(),
        object: "chat.completion.chunk".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![ChatStreamChoice {
            index: 0,
            delta: ChatDelta {
                role: None,
                content: Some(text),
            },
            finish_reason,
        }],
        usage: raw
            .usage_metadata
            .map(|u| Usage::new(u.prompt_token_count, u.candidates_token_count)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_finish_reasons() {
        assert_eq!(map_finish_reason(Some("STOP")), Some(FinishReason::Stop));
        assert_eq!(map_finish_reason(Some("MAX_TOKENS")), Some(FinishReason::Length));
        assert_eq!(map_finish_reason(Some("SAFETY")), Some(FinishReason::ContentFilter));
        assert_eq!(map_finish_reason(None), None);
    }

    #[test]
    fn hoists_system_instruction() {
        let provider = GeminiProvider::new("https://generativelanguage.googleapis.com".into(), "key".into()).unwrap();
        let request = ChatRequest::new("gemini-1.5-pro")
            .add_system_message("be terse")
            .add_user_message("hi");
        let body = provider.request_body(&request);
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            json!("be terse")
        );
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }
}
