//! `GET /healthz` — process and dependency health.

use actix_web::{HttpResponse, web};

use crate::server::state::AppState;

pub async fn healthz(state: web::Data<AppState>) -> HttpResponse {
    let status = state.gateway.health_check().await;
    if status.status == "healthy" {
        HttpResponse::Ok().json(status)
    } else {
        HttpResponse::ServiceUnavailable().json(status)
    }
}
