//! Gateway error taxonomy
//!
//! Every error surfaced to an HTTP caller is one of [`GatewayError`]'s
//! variants. `ResponseError` maps each to a status code and a stable JSON
//! envelope; handlers and the dispatcher should construct these directly
//! rather than returning raw provider/driver errors.

use actix_web::{HttpResponse, http::StatusCode};
use serde::Serialize;
use serde_json::json;

pub type Result<T> = std::result::Result<T, GatewayError>;

tokio::task_local! {
    /// The `X-Request-ID` chosen for the in-flight request, set by
    /// [`crate::server::middleware::RequestIdMiddleware`] around the whole
    /// service call chain so that [`GatewayError::error_response`] — which
    /// has no direct access to the request — can still stamp the same id
    /// into the error envelope.
    static REQUEST_ID: String;
}

/// Run `fut` with `request_id` available to any [`GatewayError::error_response`]
/// call made while it's in flight.
pub async fn with_request_id<F: std::future::Future>(request_id: String, fut: F) -> F::Output {
    REQUEST_ID.scope(request_id, fut).await
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or semantically invalid request body.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or rejected credentials.
    #[error("authentication error: {0}")]
    Auth(String),

    /// No healthy provider instance exists for the requested logical model.
    #[error("no healthy provider available for model '{0}'")]
    NoProvider(String),

    /// The requested logical model has no binding at all.
    #[error("unknown model '{0}'")]
    ProviderNotFound(String),

    /// An upstream call failed in a way that looks retryable (timeout,
    /// connection reset, 429, 5xx).
    #[error("upstream error from {provider}: {message}")]
    UpstreamTransient { provider: String, message: String },

    /// An upstream call failed in a way that retrying would not fix (4xx
    /// other than 429, malformed vendor response). Distinguished from
    /// `UpstreamTransient` for logging only — both currently map to the same
    /// HTTP status, per an explicit design decision recorded in DESIGN.md.
    #[error("upstream error from {provider}: {message}")]
    UpstreamPermanent { provider: String, message: String },

    /// Translating between the canonical shape and a vendor's wire format
    /// failed.
    #[error("translation error: {0}")]
    Translation(String),

    /// Storage, configuration, or other internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upstream_transient(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::UpstreamTransient {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    pub fn upstream_permanent(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::UpstreamPermanent {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Whether the dispatcher should retry/fall back after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamTransient { .. })
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Auth(_) => "auth_error",
            Self::NoProvider(_) => "no_provider_available",
            Self::ProviderNotFound(_) => "model_not_found",
            Self::UpstreamTransient { .. } => "upstream_transient_error",
            Self::UpstreamPermanent { .. } => "upstream_error",
            Self::Translation(_) => "translation_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    details: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
    timestamp: chrono::DateTime<chrono::Utc>,
    request_id: Option<String>,
}

impl actix_web::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NoProvider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ProviderNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamTransient { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamPermanent { .. } => StatusCode::BAD_GATEWAY,
            Self::Translation(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let details = match self {
            Self::UpstreamTransient { provider, .. } | Self::UpstreamPermanent { provider, .. } => {
                json!({ "provider": provider })
            }
            _ => json!({}),
        };

        let body = ErrorEnvelope {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
                details,
            },
            timestamp: chrono::Utc::now(),
            request_id: REQUEST_ID.try_with(Clone::clone).ok(),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<sea_orm::DbErr> for GatewayError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Translation(e.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::UpstreamTransient {
            provider: "unknown".to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn validation_maps_to_422() {
        let e = GatewayError::validation("bad field");
        assert_eq!(e.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn upstream_transient_is_retryable() {
        assert!(GatewayError::upstream_transient("openai", "timeout").is_retryable());
        assert!(!GatewayError::upstream_permanent("openai", "bad request").is_retryable());
    }

    #[test]
    fn no_provider_maps_to_500() {
        let e = GatewayError::NoProvider("gpt-4o".to_string());
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
