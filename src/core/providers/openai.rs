//! OpenAI-compatible adapter
//!
//! Also used for any vendor that speaks the OpenAI chat-completions wire
//! format (most self-hosted and OpenAI-compatible gateways do), so
//! `base_url` is configurable rather than hardcoded to `api.openai.com`.

use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::{Value, json};

use crate::core::providers::ChatStream;
use crate::core::types::chat::{ChatChunk, ChatRequest, ChatResponse};
use crate::utils::error::{GatewayError, Result};

#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
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

    fn request_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut body = serde_json::to_value(request).unwrap_or_else(|_| json!({}));
        if let Value::Object(ref mut map) = body {
            map.insert("stream".to_string(), json!(stream));
        }
        body
    }

    pub async fn chat(&self, request: &ChatRequest, timeout: Option<Duration>) -> Result<ChatResponse> {
        let body = self.request_body(request, false);

        let mut builder = self.client.post(self.url("/chat/completions")).bearer_auth(&self.api_key).json(&body);
        if let Some(d) = timeout {
            builder = builder.timeout(d);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::upstream_transient("openai", e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::upstream_transient("openai", e.to_string()))?;

        if !status.is_success() {
            return Err(classify_http_error("openai", status.as_u16(), &bytes));
        }

        let mut value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::Translation(format!("openai response: {e}")))?;
        value["provider"] = json!("openai");
        serde_json::from_value(value).map_err(|e| GatewayError::Translation(e.to_string()))
    }

    pub async fn chat_stream(&self, request: &ChatRequest, timeout: Option<Duration>) -> Result<ChatStream> {
        let body = self.request_body(request, true);

        let mut builder = self.client.post(self.url("/chat/completions")).bearer_auth(&self.api_key).json(&body);
        if let Some(d) = timeout {
            builder = builder.timeout(d);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::upstream_transient("openai", e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let bytes = resp.bytes().await.unwrap_or_default();
            return Err(classify_http_error("openai", status.as_u16(), &bytes));
        }

        Ok(Box::pin(parse_sse_stream(resp.bytes_stream())))
    }

    pub async fn probe(&self) -> bool {
        self.client
            .get(self.url("/models"))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// Frame raw SSE bytes into `data: ...` payloads, stopping at `[DONE]`.
///
/// OpenAI's framing is the simplest of the three vendors: one JSON object per
/// `data:` line, no typed event names to distinguish.
fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<ChatChunk>> + Send + 'static {
    async_stream::stream! {
        let mut buf = String::new();
        tokio::pin!(byte_stream);

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(GatewayError::upstream_transient("openai", e.to_string()));
                    return;
                }
            };
            buf.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buf.find("\n\n") {
                let record: String = buf.drain(..pos + 2).collect();
                for line in record.lines() {
                    let Some(payload) = line.strip_prefix("data: ") else { continue };
                    if payload == "[DONE]" {
                        return;
                    }
                    match serde_json::from_str::<ChatChunk>(payload) {
                        Ok(parsed) => yield Ok(parsed),
                        Err(e) => yield Err(GatewayError::Translation(format!("openai chunk: {e}"))),
                    }
                }
            }
        }
    }
}

fn classify_http_error(provider: &str, status: u16, body: &[u8]) -> GatewayError {
    let message = String::from_utf8_lossy(body).to_string();
    match status {
        429 | 500..=599 => GatewayError::upstream_transient(provider, message),
        _ => GatewayError::upstream_permanent(provider, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_429_and_5xx_as_transient() {
        assert!(classify_http_error("openai", 429, b"rate limited").is_retryable());
        assert!(classify_http_error("openai", 503, b"unavailable").is_retryable());
        assert!(!classify_http_error("openai", 400, b"bad request").is_retryable());
    }
}
