use axum::{Json, extract::State};

use super::ListResponse;
use crate::db::AppState;
use crate::error::InternalError;
use crate::models::*;
use crate::service::internal;

type InternalResult<T> = std::result::Result<Json<T>, InternalError>;

pub async fn list_organizations(State(state): State<AppState>) -> InternalResult<ListResponse<Organization>> {
    Ok(Json(internal::list_internal_organizations(&state)?.into()))
}

pub async fn list_organization_users(
    State(state): State<AppState>,
) -> InternalResult<ListResponse<OrganizationUser>> {
    Ok(Json(internal::list_internal_organization_users(&state)?.into()))
}

pub async fn list_projects(State(state): State<AppState>) -> InternalResult<ListResponse<Project>> {
    Ok(Json(internal::list_internal_projects(&state)?.into()))
}

pub async fn list_project_users(
    State(state): State<AppState>,
) -> InternalResult<ListResponse<ProjectUser>> {
    Ok(Json(internal::list_internal_project_users(&state)?.into()))
}

pub async fn list_api_keys(State(state): State<AppState>) -> InternalResult<ListResponse<ApiKeyView>> {
    Ok(Json(internal::list_internal_api_keys(&state)?.into()))
}

pub async fn list_users(State(state): State<AppState>) -> InternalResult<ListResponse<User>> {
    Ok(Json(internal::list_internal_users(&state)?.into()))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUserInternal>,
) -> InternalResult<User> {
    Ok(Json(internal::create_user_internal(&state, &input)?))
}
