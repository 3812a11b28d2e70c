//! Bearer/API-key extraction and allow-list enforcement
//!
//! This is the one piece of caller identity the core owns: without it there
//! is no `user_id` to attach to a request log row. There is no session or
//! user store behind it — a caller is just a string that is or isn't on the
//! configured allow-list (an empty allow-list accepts anything).

use std::future::{Ready, ready};
use std::hash::{Hash, Hasher};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::{HttpMessage, ResponseError, web};
use futures::future::LocalBoxFuture;
use tracing::warn;

use crate::core::types::context::RequestContext;
use crate::server::middleware::request_id::RequestId;
use crate::server::state::AppState;
use crate::utils::error::GatewayError;

const PUBLIC_PATHS: &[&str] = &["/healthz"];

pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if PUBLIC_PATHS.contains(&req.path()) {
            let fut = self.service.call(req);
            return Box::pin(async move { Ok(fut.await?.map_into_left_body()) });
        }

        let key = extract_key(&req);
        let state = req.app_data::<web::Data<AppState>>().cloned();

        let Some(key) = key else {
            let (req, _) = req.into_parts();
            let response = GatewayError::Auth("missing credentials".to_string()).error_response();
            return Box::pin(async move { Ok(ServiceResponse::new(req, response).map_into_right_body()) });
        };

        let allowed = state.as_ref().is_none_or(|s| {
            let auth = &s.gateway.config().auth;
            auth.is_allowed(&key) || auth.admin_key.as_deref() == Some(key.as_str())
        });

        if !allowed {
            warn!("rejected request with unrecognized API key");
            let (req, _) = req.into_parts();
            let response = GatewayError::Auth("invalid API key".to_string()).error_response();
            return Box::pin(async move { Ok(ServiceResponse::new(req, response).map_into_right_body()) });
        }

        let client_ip = req.connection_info().peer_addr().map(|s| s.to_string());
        let request_id = req.extensions().get::<RequestId>().map(|r| r.0.clone());
        let mut ctx = RequestContext::new().with_user_id(fingerprint(&key));
        if let Some(id) = request_id {
            ctx = ctx.with_request_id(id);
        }
        if let Some(ip) = client_ip {
            ctx = ctx.with_client_ip(ip);
        }
        req.extensions_mut().insert(ctx);

        let fut = self.service.call(req);
        Box::pin(async move { Ok(fut.await?.map_into_left_body()) })
    }
}

fn extract_key(req: &ServiceRequest) -> Option<String> {
    if let Some(header) = req.headers().get("x-api-key").and_then(|h| h.to_str().ok()) {
        return Some(header.to_string());
    }
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Short, stable, non-reversible identifier for a key, so request logs carry
/// a consistent caller id without persisting the raw credential.
fn fingerprint(key: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    format!("key:{:016x}", hasher.finish())
}
