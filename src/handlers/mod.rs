mod api_keys;
mod internal;
mod organizations;
mod projects;
mod users;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::db::AppState;

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: String,
    pub deleted: bool,
}

impl DeleteResponse {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            deleted: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    #[serde(default)]
    pub include_summary: bool,
}

async fn health() -> &'static str {
    "ok"
}

/// Caller-facing routes. Identity comes from the upstream auth headers.
pub fn public_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/v1/organizations",
            post(organizations::create_organization).get(organizations::list_organizations),
        )
        .route(
            "/v1/organizations/{org_id}",
            delete(organizations::delete_organization),
        )
        .route(
            "/v1/organizations/{org_id}/users",
            post(organizations::create_organization_user)
                .get(organizations::list_organization_users),
        )
        .route(
            "/v1/organizations/{org_id}/users/{user_id}",
            delete(organizations::delete_organization_user),
        )
        .route(
            "/v1/organizations/{org_id}/projects",
            post(projects::create_project).get(projects::list_projects),
        )
        .route(
            "/v1/organizations/{org_id}/projects/{project_id}",
            patch(projects::update_project).delete(projects::delete_project),
        )
        .route(
            "/v1/organizations/{org_id}/projects/{project_id}/users",
            post(projects::create_project_user).get(projects::list_project_users),
        )
        .route(
            "/v1/organizations/{org_id}/projects/{project_id}/users/{user_id}",
            delete(projects::delete_project_user),
        )
        .route(
            "/v1/organizations/{org_id}/projects/{project_id}/api_keys",
            post(api_keys::create_project_api_key).get(api_keys::list_project_api_keys),
        )
        .route(
            "/v1/organizations/{org_id}/projects/{project_id}/api_keys/{id}",
            delete(api_keys::delete_project_api_key),
        )
        .route("/v1/api_keys", get(api_keys::list_api_keys))
        .route(
            "/v1/api_keys/{id}",
            patch(api_keys::update_api_key).delete(api_keys::delete_api_key),
        )
        .route("/v1/users/self", get(users::get_user_self))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Trusted routes for platform components; serve on a private listener only.
pub fn internal_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/internal/v1/organizations",
            get(internal::list_organizations),
        )
        .route(
            "/internal/v1/organization_users",
            get(internal::list_organization_users),
        )
        .route("/internal/v1/projects", get(internal::list_projects))
        .route(
            "/internal/v1/project_users",
            get(internal::list_project_users),
        )
        .route("/internal/v1/api_keys", get(internal::list_api_keys))
        .route(
            "/internal/v1/users",
            get(internal::list_users).post(internal::create_user),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
