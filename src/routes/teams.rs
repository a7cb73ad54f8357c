use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::models::{Rank, Service, TeamEntry};
use crate::state::SharedState;
use crate::statistics::SortDirection;
use crate::team_stats::{
    merge_with_registry, rank_summary, services_for_team, services_without_team, sort_team_stats,
    stats_for, team_rank, unique_teams, MergedTeam, TeamSortKey, TeamStats,
};

#[derive(Deserialize)]
pub struct TeamStatsQuery {
    #[serde(default = "default_sort")]
    pub sort: TeamSortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

fn default_sort() -> TeamSortKey {
    TeamSortKey::AverageScore
}

#[derive(Deserialize)]
pub struct TeamsQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Serialize)]
pub struct TeamView {
    #[serde(flatten)]
    pub team: MergedTeam,
    pub rank: Rank,
    pub rank_summary: String,
}

#[derive(Serialize)]
pub struct TeamsResponse {
    pub teams: Vec<TeamView>,
    pub unassigned_services: usize,
    pub registry_loaded: bool,
    pub used_api: bool,
}

pub async fn list_teams(
    State(state): State<SharedState>,
    Query(query): Query<TeamsQuery>,
) -> Result<Json<TeamsResponse>, SyncError> {
    let services = state.services().await?;
    let current = state.registry.current_fingerprint().await;
    let loaded = state.registry.load_teams(query.refresh).await;

    let computed = stats_for(&services, current.as_deref());
    let teams = merge_with_registry(loaded.teams.as_deref(), &computed)
        .into_values()
        .map(|team| TeamView {
            rank: team_rank(team.statistics.average_score),
            rank_summary: rank_summary(&team.statistics.rank_distribution),
            team,
        })
        .collect();

    Ok(Json(TeamsResponse {
        teams,
        unassigned_services: services_without_team(&services).len(),
        registry_loaded: loaded.teams.is_some(),
        used_api: loaded.used_api,
    }))
}

pub async fn team_stats(
    State(state): State<SharedState>,
    Query(query): Query<TeamStatsQuery>,
) -> Result<Json<Vec<TeamStats>>, SyncError> {
    let services = state.services().await?;
    let current = state.registry.current_fingerprint().await;
    let stats = stats_for(&services, current.as_deref()).into_values().collect();
    Ok(Json(sort_team_stats(stats, query.sort, query.direction)))
}

pub async fn team_names(State(state): State<SharedState>) -> Result<Json<Vec<String>>, SyncError> {
    let services = state.services().await?;
    Ok(Json(unique_teams(&services)))
}

pub async fn team_services(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Service>>, SyncError> {
    let services = state.services().await?;
    let members: Vec<Service> = services_for_team(&services, &name)
        .into_iter()
        .cloned()
        .collect();
    if members.is_empty() {
        return Err(SyncError::NotFound(format!("team {}", name)));
    }
    Ok(Json(members))
}

pub async fn team_profile(
    State(state): State<SharedState>,
    Path(team_id): Path<String>,
) -> Result<Json<TeamEntry>, SyncError> {
    match state.registry.load_team(&team_id).await {
        Ok(team) => Ok(Json(team)),
        Err(SyncError::Http { status: 404, .. }) => {
            Err(SyncError::NotFound(format!("team {}", team_id)))
        }
        Err(e) => Err(e),
    }
}
