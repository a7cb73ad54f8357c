use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub token_present: bool,
    pub services: ServicesHealth,
    pub active_polls: Vec<String>,
}

#[derive(Serialize)]
pub struct ServicesHealth {
    pub count: usize,
    pub used_api: bool,
    pub loaded_at: Option<String>,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let services = {
        let snapshot = state.services.read().await;
        ServicesHealth {
            count: snapshot.services.len(),
            used_api: snapshot.used_api,
            loaded_at: snapshot.loaded_at.map(|t| t.to_rfc3339()),
        }
    };

    let mut active_polls: Vec<String> = state
        .scheduler
        .active_scopes()
        .iter()
        .map(ToString::to_string)
        .collect();
    active_polls.sort();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        token_present: state.tokens.has_token().await,
        services,
        active_polls,
    })
}
