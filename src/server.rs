use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::{auth, checks, health, services, teams, workflows};
use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health::health))
        // Services
        .route("/services", get(services::list_services))
        .route("/services/refresh", post(services::refresh_services))
        .route("/services/stats", get(services::stats))
        .route("/services/{org}/{repo}", get(services::service_detail))
        // Checks and adoption
        .route("/checks", get(checks::list_checks))
        .route("/checks/refresh", post(checks::refresh_checks))
        .route("/checks/adoption", get(checks::all_adoption))
        .route("/checks/filter", post(checks::filter_services))
        .route("/checks/{check_id}/adoption", get(checks::check_adoption))
        // Teams
        .route("/teams", get(teams::list_teams))
        .route("/teams/stats", get(teams::team_stats))
        .route("/teams/names", get(teams::team_names))
        .route("/teams/{name}/services", get(teams::team_services))
        .route("/teams/{name}/profile", get(teams::team_profile))
        // Global Actions widget
        .route("/workflows/global", get(workflows::global_runs))
        .route("/workflows/global/open", post(workflows::open_global))
        .route("/workflows/global/close", post(workflows::close_global))
        .route("/workflows/global/refresh", post(workflows::refresh_global))
        .route(
            "/workflows/global/interval",
            post(workflows::set_global_interval),
        )
        // Per-service workflow tabs
        .route(
            "/workflows/service/interval",
            post(workflows::set_service_interval),
        )
        .route(
            "/workflows/service/{org}/{repo}",
            get(workflows::service_runs),
        )
        .route(
            "/workflows/service/{org}/{repo}/open",
            post(workflows::open_service),
        )
        .route(
            "/workflows/service/{org}/{repo}/close",
            post(workflows::close_service),
        )
        .route(
            "/workflows/service/{org}/{repo}/refresh",
            post(workflows::refresh_service),
        )
        // Token
        .route(
            "/auth/token",
            get(auth::token_status)
                .post(auth::set_token)
                .delete(auth::clear_token),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
