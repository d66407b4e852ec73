use axum::{
    Json,
    extract::{Path, State},
};

use super::{DeleteResponse, ListResponse};
use crate::db::AppState;
use crate::error::Result;
use crate::models::*;
use crate::rbac::Caller;
use crate::service::api_keys;

pub async fn create_project_api_key(
    State(state): State<AppState>,
    caller: Caller,
    Path((org_id, project_id)): Path<(String, String)>,
    Json(input): Json<CreateApiKey>,
) -> Result<Json<ApiKeyView>> {
    let key = api_keys::create_api_key(&state, &caller, &org_id, &project_id, &input)?;
    Ok(Json(key))
}

pub async fn list_project_api_keys(
    State(state): State<AppState>,
    caller: Caller,
    Path((org_id, project_id)): Path<(String, String)>,
) -> Result<Json<ListResponse<ApiKeyView>>> {
    let keys = api_keys::list_project_api_keys(&state, &caller, &org_id, &project_id)?;
    Ok(Json(keys.into()))
}

pub async fn delete_project_api_key(
    State(state): State<AppState>,
    caller: Caller,
    Path((org_id, project_id, id)): Path<(String, String, String)>,
) -> Result<Json<DeleteResponse>> {
    api_keys::delete_project_api_key(&state, &caller, &org_id, &project_id, &id)?;
    Ok(Json(DeleteResponse::new(id)))
}

pub async fn list_api_keys(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ListResponse<ApiKeyView>>> {
    let keys = api_keys::list_api_keys(&state, &caller)?;
    Ok(Json(keys.into()))
}

pub async fn update_api_key(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(input): Json<UpdateApiKey>,
) -> Result<Json<ApiKeyView>> {
    let key = api_keys::update_api_key(&state, &caller, &id, &input)?;
    Ok(Json(key))
}

pub async fn delete_api_key(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    api_keys::delete_api_key(&state, &caller, &id)?;
    Ok(Json(DeleteResponse::new(id)))
}
