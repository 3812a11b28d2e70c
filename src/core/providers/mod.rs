//! Vendor provider adapters
//!
//! A provider instance is one configured credential/endpoint pair for one
//! vendor (e.g. two different OpenAI API keys are two instances). The
//! `Provider` enum is a tagged variant rather than a trait object: the set of
//! vendors is closed and known at compile time, so a `match` in the factory
//! and in `Provider`'s own methods is simpler than an object-safe trait with
//! associated error/config types and a type-erased handle.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;

use crate::core::types::chat::{ChatChunk, ChatRequest, ChatResponse};
use crate::utils::error::{GatewayError, Result};

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

/// Which vendor a provider instance talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Vendor's public API base, used when a provider row leaves `base_url`
    /// unset (the common case for anything but a self-hosted/proxy vendor).
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(GatewayError::validation(format!(
                "unknown provider kind '{other}'"
            ))),
        }
    }
}

/// A configured, ready-to-call vendor adapter.
#[derive(Clone)]
pub enum Provider {
    OpenAi(openai::OpenAiProvider),
    Anthropic(anthropic::AnthropicProvider),
    Gemini(gemini::GeminiProvider),
}

impl Provider {
    pub fn new(kind: ProviderKind, base_url: String, api_key: String) -> Result<Self> {
        Ok(match kind {
            ProviderKind::OpenAi => Provider::OpenAi(openai::OpenAiProvider::new(base_url, api_key)?),
            ProviderKind::Anthropic => {
                Provider::Anthropic(anthropic::AnthropicProvider::new(base_url, api_key)?)
            }
            ProviderKind::Gemini => Provider::Gemini(gemini::GeminiProvider::new(base_url, api_key)?),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::OpenAi(_) => ProviderKind::OpenAi,
            Provider::Anthropic(_) => ProviderKind::Anthropic,
            Provider::Gemini(_) => ProviderKind::Gemini,
        }
    }

    /// `timeout` is the per-request timeout hint, if any; it clamps the
    /// adapter's own HTTP client timeout for this one call.
    pub async fn chat(&self, request: &ChatRequest, timeout: Option<Duration>) -> Result<ChatResponse> {
        match self {
            Provider::OpenAi(p) => p.chat(request, timeout).await,
            Provider::Anthropic(p) => p.chat(request, timeout).await,
            Provider::Gemini(p) => p.chat(request, timeout).await,
        }
    }

    pub async fn chat_stream(&self, request: &ChatRequest, timeout: Option<Duration>) -> Result<ChatStream> {
        match self {
            Provider::OpenAi(p) => p.chat_stream(request, timeout).await,
            Provider::Anthropic(p) => p.chat_stream(request, timeout).await,
            Provider::Gemini(p) => p.chat_stream(request, timeout).await,
        }
    }

    /// Lightweight reachability probe used by the health prober; never raises.
    pub async fn probe(&self) -> bool {
        match self {
            Provider::OpenAi(p) => p.probe().await,
            Provider::Anthropic(p) => p.probe().await,
            Provider::Gemini(p) => p.probe().await,
        }
    }
}
