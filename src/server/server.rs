//! HTTP server composition: CORS, auth, request-id, and access logging
//! wrapped around the route table.

use actix_cors::Cors;
use actix_web::{App, HttpServer as ActixHttpServer, middleware::Logger, web};
use tracing_actix_web::TracingLogger;

use crate::config::Config;
use crate::core::Gateway;
use crate::server::middleware::{AuthMiddleware, RequestIdMiddleware};
use crate::server::routes;
use crate::server::state::AppState;
use crate::utils::error::{GatewayError, Result};

/// Turns a malformed-JSON / unknown-field extractor failure into the same
/// validation error envelope a handler-level check would produce, instead of
/// actix's default plain-text 400.
fn json_error_handler(err: actix_web::error::JsonPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    GatewayError::Validation(err.to_string()).into()
}

pub async fn run(config: Config, gateway: Gateway) -> Result<()> {
    let address = config.address();
    let state = web::Data::new(AppState::new(gateway));

    tracing::info!(%address, "starting HTTP server");

    ActixHttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(Logger::default())
            .wrap(AuthMiddleware)
            .wrap(RequestIdMiddleware)
            .configure(routes::configure)
    })
    .bind(&address)
    .map_err(|e| GatewayError::Internal(format!("failed to bind {address}: {e}")))?
    .run()
    .await
    .map_err(|e| GatewayError::Internal(format!("server error: {e}")))
}
