use axum::{
    Json,
    extract::{Path, Query, State},
};

use super::{DeleteResponse, ListResponse, SummaryQuery};
use crate::db::AppState;
use crate::error::Result;
use crate::models::*;
use crate::rbac::Caller;
use crate::service::organizations;

pub async fn create_organization(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<CreateOrganization>,
) -> Result<Json<Organization>> {
    let org = organizations::create_organization(&state, &caller, &input)?;
    Ok(Json(org))
}

pub async fn list_organizations(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ListResponse<OrganizationWithSummary>>> {
    let orgs = organizations::list_organizations(&state, &caller, query.include_summary)?;
    Ok(Json(orgs.into()))
}

pub async fn delete_organization(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    organizations::delete_organization(&state, &caller, &org_id)?;
    Ok(Json(DeleteResponse::new(org_id)))
}

pub async fn create_organization_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<String>,
    Json(input): Json<CreateOrganizationUser>,
) -> Result<Json<OrganizationUser>> {
    let binding = organizations::create_organization_user(&state, &caller, &org_id, &input)?;
    Ok(Json(binding))
}

pub async fn list_organization_users(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<String>,
) -> Result<Json<ListResponse<OrganizationUser>>> {
    let users = organizations::list_organization_users(&state, &caller, &org_id)?;
    Ok(Json(users.into()))
}

pub async fn delete_organization_user(
    State(state): State<AppState>,
    caller: Caller,
    Path((org_id, user_id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    organizations::delete_organization_user(&state, &caller, &org_id, &user_id)?;
    Ok(Json(DeleteResponse::new(user_id)))
}
