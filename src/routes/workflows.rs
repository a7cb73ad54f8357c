use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::SyncError;
use crate::polling::PollScope;
use crate::state::SharedState;
use crate::workflows::{RunFilter, RunsView};

#[derive(Deserialize)]
pub struct RunsQuery {
    #[serde(default)]
    pub status: RunFilter,
}

#[derive(Deserialize)]
pub struct IntervalRequest {
    pub interval_ms: u64,
}

async fn view(state: &SharedState, scope: PollScope, filter: RunFilter) -> Result<Json<RunsView>, SyncError> {
    state
        .workflows
        .view(&scope, filter)
        .await
        .map(Json)
        .ok_or_else(|| SyncError::NotFound(format!("{} is not open", scope)))
}

// --- Global Actions widget ---

pub async fn global_runs(
    State(state): State<SharedState>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<RunsView>, SyncError> {
    view(&state, PollScope::GlobalActionsWidget, query.status).await
}

pub async fn open_global(State(state): State<SharedState>) -> impl IntoResponse {
    state.open_widget().await;
    Json(serde_json::json!({
        "status": "open",
        "interval_ms": state.widget_interval().await.as_millis() as u64,
    }))
}

pub async fn close_global(State(state): State<SharedState>) -> impl IntoResponse {
    state.close_widget().await;
    Json(serde_json::json!({ "status": "closed" }))
}

pub async fn refresh_global(State(state): State<SharedState>) -> Result<Json<RunsView>, SyncError> {
    let scope = PollScope::GlobalActionsWidget;
    if !state.workflows.is_open(&scope).await {
        return Err(SyncError::NotFound(format!("{} is not open", scope)));
    }
    state.workflows.refresh(&scope).await?;
    view(&state, scope, RunFilter::All).await
}

pub async fn set_global_interval(
    State(state): State<SharedState>,
    Json(body): Json<IntervalRequest>,
) -> Result<impl IntoResponse, SyncError> {
    state.set_widget_interval(body.interval_ms).await?;
    Ok(Json(serde_json::json!({
        "status": "updated",
        "interval_ms": body.interval_ms,
    })))
}

// --- Per-service workflow tab ---

pub async fn service_runs(
    State(state): State<SharedState>,
    Path((org, repo)): Path<(String, String)>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<RunsView>, SyncError> {
    view(&state, PollScope::service(org, repo), query.status).await
}

pub async fn open_service(
    State(state): State<SharedState>,
    Path((org, repo)): Path<(String, String)>,
) -> impl IntoResponse {
    state.open_service_workflows(&org, &repo).await;
    Json(serde_json::json!({
        "status": "open",
        "scope": PollScope::service(org, repo).to_string(),
        "interval_ms": state.service_interval().await.as_millis() as u64,
    }))
}

pub async fn close_service(
    State(state): State<SharedState>,
    Path((org, repo)): Path<(String, String)>,
) -> impl IntoResponse {
    state.close_service_workflows(&org, &repo).await;
    Json(serde_json::json!({ "status": "closed" }))
}

pub async fn refresh_service(
    State(state): State<SharedState>,
    Path((org, repo)): Path<(String, String)>,
) -> Result<Json<RunsView>, SyncError> {
    let scope = PollScope::service(org, repo);
    if !state.workflows.is_open(&scope).await {
        return Err(SyncError::NotFound(format!("{} is not open", scope)));
    }
    state.workflows.refresh(&scope).await?;
    view(&state, scope, RunFilter::All).await
}

pub async fn set_service_interval(
    State(state): State<SharedState>,
    Json(body): Json<IntervalRequest>,
) -> Result<impl IntoResponse, SyncError> {
    state.set_service_interval(body.interval_ms).await?;
    Ok(Json(serde_json::json!({
        "status": "updated",
        "interval_ms": body.interval_ms,
    })))
}
