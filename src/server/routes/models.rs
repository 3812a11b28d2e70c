//! `GET /v1/models` — OpenAI-shaped listing of logical models.

use actix_web::{HttpResponse, web};
use serde::Serialize;
use serde_json::json;

use crate::server::state::AppState;
use crate::utils::error::Result;

#[derive(Serialize)]
struct ModelEntry {
    id: String,
    object: &'static str,
    created: i64,
    owned_by: &'static str,
}

pub async fn list_models(state: web::Data<AppState>) -> Result<HttpResponse> {
    let names = state.gateway.storage().config_store.list_model_names().await?;
    let data: Vec<ModelEntry> = names
        .iter()
        .map(|name| ModelEntry {
            id: name.clone(),
            object: "model",
            created: 0,
            owned_by: "orchestrator",
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "object": "list", "data": data })))
}
