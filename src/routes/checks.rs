use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::adoption::{
    adoption_by_team, all_checks_adoption, excluded_services_for_check, filter_by_check_criteria,
    overall_adoption, sort_teams_by_adoption, CheckAdoption, CheckAdoptionEntry, CheckFilter,
    ServiceCheckInfo, TeamAdoptionEntry,
};
use crate::error::SyncError;
use crate::models::{CheckMetadata, ChecksManifest, Service};
use crate::state::SharedState;
use crate::statistics::SortDirection;

#[derive(Deserialize)]
pub struct AdoptionQuery {
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub filters: BTreeMap<String, CheckFilter>,
}

#[derive(Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub checks: Vec<CheckMetadata>,
}

#[derive(Serialize)]
pub struct ChecksResponse {
    #[serde(flatten)]
    pub manifest: ChecksManifest,
    pub by_category: Vec<CategoryGroup>,
}

#[derive(Serialize)]
pub struct CheckAdoptionResponse {
    pub check: CheckMetadata,
    pub overall: CheckAdoption,
    pub teams: Vec<TeamAdoptionEntry>,
    pub excluded_services: Vec<ServiceCheckInfo>,
}

pub async fn list_checks(State(state): State<SharedState>) -> Result<Json<ChecksResponse>, SyncError> {
    let manifest = state.registry.load_checks().await?;
    let by_category = manifest
        .by_category()
        .into_iter()
        .map(|(category, checks)| CategoryGroup {
            category,
            checks: checks.into_iter().cloned().collect(),
        })
        .collect();

    Ok(Json(ChecksResponse {
        manifest: manifest.as_ref().clone(),
        by_category,
    }))
}

pub async fn refresh_checks(
    State(state): State<SharedState>,
) -> Result<Json<ChecksResponse>, SyncError> {
    state.registry.clear_checks_cache().await;
    list_checks(State(state)).await
}

pub async fn all_adoption(
    State(state): State<SharedState>,
) -> Result<Json<Vec<CheckAdoptionEntry>>, SyncError> {
    let manifest = state.registry.load_checks().await?;
    let services = state.services().await?;
    Ok(Json(all_checks_adoption(&services, &manifest.checks)))
}

pub async fn check_adoption(
    State(state): State<SharedState>,
    Path(check_id): Path<String>,
    Query(query): Query<AdoptionQuery>,
) -> Result<Json<CheckAdoptionResponse>, SyncError> {
    let manifest = state.registry.load_checks().await?;
    let check = manifest
        .check(&check_id)
        .cloned()
        .ok_or_else(|| SyncError::NotFound(format!("check {}", check_id)))?;
    let services = state.services().await?;

    Ok(Json(CheckAdoptionResponse {
        overall: overall_adoption(&services, &check_id),
        teams: sort_teams_by_adoption(adoption_by_team(&services, &check_id), query.direction),
        excluded_services: excluded_services_for_check(&services, &check_id),
        check,
    }))
}

pub async fn filter_services(
    State(state): State<SharedState>,
    Json(body): Json<FilterRequest>,
) -> Result<Json<Vec<Service>>, SyncError> {
    let services = state.services().await?;
    let matched = filter_by_check_criteria(&services, &body.filters)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(matched))
}
