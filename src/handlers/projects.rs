use axum::{
    Json,
    extract::{Path, Query, State},
};

use super::{DeleteResponse, ListResponse, SummaryQuery};
use crate::db::AppState;
use crate::error::Result;
use crate::models::*;
use crate::rbac::Caller;
use crate::service::projects;

pub async fn create_project(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<String>,
    Json(input): Json<CreateProject>,
) -> Result<Json<Project>> {
    let project = projects::create_project(&state, &caller, &org_id, &input)?;
    Ok(Json(project))
}

pub async fn list_projects(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ListResponse<ProjectWithSummary>>> {
    let projects = projects::list_projects(&state, &caller, &org_id, query.include_summary)?;
    Ok(Json(projects.into()))
}

pub async fn update_project(
    State(state): State<AppState>,
    caller: Caller,
    Path((org_id, project_id)): Path<(String, String)>,
    Json(input): Json<UpdateProject>,
) -> Result<Json<Project>> {
    let project = projects::update_project(&state, &caller, &org_id, &project_id, &input)?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    caller: Caller,
    Path((org_id, project_id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    projects::delete_project(&state, &caller, &org_id, &project_id)?;
    Ok(Json(DeleteResponse::new(project_id)))
}

pub async fn create_project_user(
    State(state): State<AppState>,
    caller: Caller,
    Path((org_id, project_id)): Path<(String, String)>,
    Json(input): Json<CreateProjectUser>,
) -> Result<Json<ProjectUser>> {
    let binding = projects::create_project_user(&state, &caller, &org_id, &project_id, &input)?;
    Ok(Json(binding))
}

pub async fn list_project_users(
    State(state): State<AppState>,
    caller: Caller,
    Path((org_id, project_id)): Path<(String, String)>,
) -> Result<Json<ListResponse<ProjectUser>>> {
    let users = projects::list_project_users(&state, &caller, &org_id, &project_id)?;
    Ok(Json(users.into()))
}

pub async fn delete_project_user(
    State(state): State<AppState>,
    caller: Caller,
    Path((org_id, project_id, user_id)): Path<(String, String, String)>,
) -> Result<Json<DeleteResponse>> {
    projects::delete_project_user(&state, &caller, &org_id, &project_id, &user_id)?;
    Ok(Json(DeleteResponse::new(user_id)))
}
