use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::auth::{revalidate, validate_and_save, TokenStatus};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

fn status_code(status: TokenStatus) -> StatusCode {
    match status {
        TokenStatus::Valid => StatusCode::OK,
        TokenStatus::Missing => StatusCode::BAD_REQUEST,
        TokenStatus::Rejected => StatusCode::UNAUTHORIZED,
        TokenStatus::Unverified => StatusCode::BAD_GATEWAY,
    }
}

pub async fn set_token(
    State(state): State<SharedState>,
    Json(body): Json<TokenRequest>,
) -> impl IntoResponse {
    let status = validate_and_save(&state.fetcher, &body.token).await;
    (status_code(status), Json(serde_json::json!({ "status": status })))
}

pub async fn token_status(State(state): State<SharedState>) -> impl IntoResponse {
    let status = revalidate(&state.fetcher).await;
    Json(serde_json::json!({
        "status": status,
        "token_present": state.tokens.has_token().await,
    }))
}

pub async fn clear_token(State(state): State<SharedState>) -> impl IntoResponse {
    state.tokens.clear().await;
    Json(serde_json::json!({ "status": "cleared" }))
}
