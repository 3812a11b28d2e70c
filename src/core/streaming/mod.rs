//! Streaming response accounting
//!
//! Wraps a provider's [`ChatChunk`] stream, re-framing each chunk as an
//! OpenAI-style `data: ...\n\n` SSE record for the client while accumulating
//! content and usage. Usage is taken from the last chunk that carries one
//! (some vendors only report it on the final frame); if none ever do, it's
//! estimated from the accumulated text via [`tokens`]. The terminal log row
//! is written exactly once — on normal end-of-stream or on early drop (a
//! client disconnect mid-stream) — via the `finished` guard on
//! [`AccountantState`], whichever happens first.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use actix_web::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use actix_web::{HttpResponse, web};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use tracing::warn;

use crate::core::providers::ChatStream;
use crate::core::router::RequestLogSink;
use crate::core::types::chat::Usage;
use crate::core::types::context::RequestContext;
use crate::utils::error::Result;
use crate::utils::tokens;

pin_project! {
    pub struct StreamAccountant {
        #[pin]
        inner: ChatStream,
        state: AccountantState,
    }
}

struct AccountantState {
    ctx: RequestContext,
    provider_id: String,
    model: String,
    log_sink: Arc<dyn RequestLogSink>,
    start: Instant,
    prompt_tokens: u32,
    accumulated_content: String,
    usage: Option<Usage>,
    finished: bool,
    done_sent: bool,
}

impl AccountantState {
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let usage = self.usage.unwrap_or_else(|| {
            Usage::new(
                self.prompt_tokens,
                tokens::estimate_completion_tokens(&self.accumulated_content),
            )
        });
        let ctx = self.ctx.clone();
        let provider_id = self.provider_id.clone();
        let model = self.model.clone();
        let log_sink = self.log_sink.clone();
        let latency_ms = self.start.elapsed().as_millis() as u64;

        tokio::spawn(async move {
            log_sink
                .log_streaming_success(&ctx, &provider_id, &model, usage.prompt_tokens, usage.completion_tokens, latency_ms)
                .await;
        });
    }
}

impl Drop for AccountantState {
    fn drop(&mut self) {
        self.finish();
    }
}

impl StreamAccountant {
    pub fn new(
        inner: ChatStream,
        ctx: RequestContext,
        provider_id: impl Into<String>,
        model: impl Into<String>,
        log_sink: Arc<dyn RequestLogSink>,
        prompt_tokens: u32,
    ) -> Self {
        Self {
            inner,
            state: AccountantState {
                ctx,
                provider_id: provider_id.into(),
                model: model.into(),
                log_sink,
                start: Instant::now(),
                prompt_tokens,
                accumulated_content: String::new(),
                usage: None,
                finished: false,
                done_sent: false,
            },
        }
    }
}

impl Stream for StreamAccountant {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if this.state.done_sent {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if let Some(text) = chunk.choices.first().and_then(|c| c.delta.content.clone()) {
                    this.state.accumulated_content.push_str(&text);
                }
                if let Some(usage) = chunk.usage {
                    this.state.usage = Some(usage);
                }
                let payload = serde_json::to_string(&chunk).unwrap_or_default();
                Poll::Ready(Some(Ok(Bytes::from(format!("data: {payload}\n\n")))))
            }
            Poll::Ready(Some(Err(e))) => {
                warn!(error = %e, "upstream stream error mid-flight");
                this.state.done_sent = true;
                this.state.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.state.done_sent = true;
                this.state.finish();
                Poll::Ready(Some(Ok(Bytes::from_static(b"data: [DONE]\n\n"))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Wrap a byte stream in a Server-Sent Events HTTP response.
pub fn create_sse_response<S>(stream: S) -> HttpResponse
where
    S: Stream<Item = Result<web::Bytes>> + Send + 'static,
{
    HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, "text/event-stream"))
        .insert_header((CACHE_CONTROL, "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::Mutex;

    use crate::core::types::chat::{ChatChunk, ChatDelta, ChatStreamChoice};
    use crate::utils::error::GatewayError;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(String, u32, u32)>>,
    }

    #[async_trait]
    impl RequestLogSink for RecordingSink {
        async fn log_success(&self, _: &RequestContext, _: &crate::core::types::chat::ChatResponse, _: &str, _: u64) {}

        async fn log_streaming_success(
            &self,
            _ctx: &RequestContext,
            provider_id: &str,
            _model: &str,
            prompt_tokens: u32,
            completion_tokens: u32,
            _latency_ms: u64,
        ) {
            self.calls.lock().unwrap().push((provider_id.to_string(), prompt_tokens, completion_tokens));
        }

        async fn log_failure(&self, _: &RequestContext, _: &str, _: &GatewayError, _: u64) {}
    }

    fn chunk(text: &str) -> ChatChunk {
        ChatChunk {
            id: "1".into(),
            object: "chat.completion.chunk".into(),
            created: 0,
            model: "m".into(),
            choices: vec![ChatStreamChoice {
                index: 0,
                delta: ChatDelta { role: None, content: Some(text.to_string()) },
                finish_reason: None,
            }],
            usage: None,
        }
    }

    #[tokio::test]
    async fn frames_chunks_and_terminates_with_done() {
        let inner: ChatStream = Box::pin(futures::stream::iter(vec![Ok(chunk("hel")), Ok(chunk("lo"))]));
        let sink = Arc::new(RecordingSink::default());
        let acc = StreamAccountant::new(inner, RequestContext::new(), "openai", "gpt-4o", sink.clone(), 10);

        let frames: Vec<_> = acc.collect().await;
        assert_eq!(frames.len(), 3);
        let last = frames.last().unwrap().as_ref().unwrap();
        assert_eq!(&last[..], b"data: [DONE]\n\n");

        tokio::task::yield_now().await;
        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "openai");
        assert_eq!(calls[0].1, 10);
        assert!(calls[0].2 > 0);
    }

    #[tokio::test]
    async fn dropped_stream_still_logs_exactly_once() {
        let inner: ChatStream = Box::pin(futures::stream::iter(vec![Ok(chunk("partial"))]));
        let sink = Arc::new(RecordingSink::default());
        let mut acc = StreamAccountant::new(inner, RequestContext::new(), "anthropic", "claude-3-5-sonnet", sink.clone(), 5);

        let _ = acc.next().await;
        drop(acc);

        tokio::task::yield_now().await;
        assert_eq!(sink.calls.lock().unwrap().len(), 1);
    }
}
