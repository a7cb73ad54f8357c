use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::models::{Service, ServiceDetail};
use crate::staleness::{count_stale_installed, filter_stale, staleness_info, staleness_stats, StalenessInfo, StalenessStats};
use crate::state::SharedState;
use crate::statistics::{service_stats, ServiceStats};

#[derive(Deserialize)]
pub struct ServicesQuery {
    #[serde(default)]
    pub stale_only: bool,
}

#[derive(Serialize)]
pub struct ServiceView {
    #[serde(flatten)]
    pub service: Service,
    pub staleness: StalenessInfo,
}

#[derive(Serialize)]
pub struct ServiceDetailView {
    #[serde(flatten)]
    pub detail: ServiceDetail,
    pub staleness: StalenessInfo,
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: ServiceStats,
    pub staleness: StalenessStats,
    pub stale_installed: usize,
    pub current_checks_hash: Option<String>,
}

pub async fn list_services(
    State(state): State<SharedState>,
    Query(query): Query<ServicesQuery>,
) -> Result<Json<Vec<ServiceView>>, SyncError> {
    let services = state.services().await?;
    let current = state.registry.current_fingerprint().await;
    let current = current.as_deref();

    let selected: Vec<&Service> = if query.stale_only {
        filter_stale(&services, current)
    } else {
        services.iter().collect()
    };

    let views = selected
        .into_iter()
        .map(|service| ServiceView {
            staleness: staleness_info(service, current),
            service: service.clone(),
        })
        .collect();
    Ok(Json(views))
}

pub async fn refresh_services(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, SyncError> {
    let count = state.refresh_services().await?;
    let used_api = state.services.read().await.used_api;

    Ok(Json(serde_json::json!({
        "status": "refreshed",
        "count": count,
        "used_api": used_api,
    })))
}

pub async fn stats(State(state): State<SharedState>) -> Result<Json<StatsResponse>, SyncError> {
    let services = state.services().await?;
    let current = state.registry.current_fingerprint().await;
    let current = current.as_deref();

    Ok(Json(StatsResponse {
        stats: service_stats(&services, current),
        staleness: staleness_stats(&services, current),
        stale_installed: count_stale_installed(&services, current),
        current_checks_hash: current.map(str::to_string),
    }))
}

pub async fn service_detail(
    State(state): State<SharedState>,
    Path((org, repo)): Path<(String, String)>,
) -> Result<Json<ServiceDetailView>, SyncError> {
    let detail = match state.registry.load_service_detail(&org, &repo).await {
        Ok(detail) => detail,
        Err(SyncError::Http { status: 404, .. }) => {
            return Err(SyncError::NotFound(format!("{}/{}", org, repo)))
        }
        Err(e) => return Err(e),
    };
    let current = state.registry.current_fingerprint().await;

    Ok(Json(ServiceDetailView {
        staleness: staleness_info(&detail.service, current.as_deref()),
        detail,
    }))
}
