//! `POST /v1/chat/completions` — the one request-serving route. Dispatches
//! through the gateway's [`Dispatcher`], returning either a single JSON
//! response or an SSE stream depending on the request's `stream` flag.

use actix_web::{HttpRequest, HttpResponse, web};

use crate::core::streaming::{StreamAccountant, create_sse_response};
use crate::core::types::chat::ChatRequest;
use crate::core::types::context::RequestContext;
use crate::server::state::AppState;
use crate::utils::error::{GatewayError, Result};

fn validate(request: &ChatRequest) -> Result<()> {
    if request.model.trim().is_empty() {
        return Err(GatewayError::validation("model must not be empty"));
    }
    if request.messages.is_empty() {
        return Err(GatewayError::validation("messages must not be empty"));
    }
    Ok(())
}

fn context_of(req: &HttpRequest) -> RequestContext {
    req.extensions().get::<RequestContext>().cloned().unwrap_or_default()
}

pub async fn chat_completions(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    validate(&request)?;
    let ctx = context_of(&req);
    let dispatcher = state.gateway.dispatcher();

    if request.stream {
        let prompt_tokens = dispatcher.estimate_input_tokens(&request);
        let (provider_id, stream) = dispatcher.route_streaming(&request).await?;
        let accountant = StreamAccountant::new(
            stream,
            ctx,
            provider_id,
            request.model.clone(),
            dispatcher.log_sink(),
            prompt_tokens,
        );
        return Ok(create_sse_response(accountant));
    }

    let response = dispatcher.route(request, ctx).await?;
    Ok(HttpResponse::Ok().json(response))
}
