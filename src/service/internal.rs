//! Trusted surface for platform components. No per-call RBAC.

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::*;
use crate::util::{is_valid_namespace, normalize_user_id};

use super::api_keys::{reveal_secret, to_view};
use super::organizations::create_organization_in_tx;
use super::projects::create_project_in_tx;
use super::{begin, required};

pub fn list_internal_organizations(state: &AppState) -> Result<Vec<Organization>> {
    let conn = state.db.get()?;
    queries::list_all_organizations(&conn)
}

pub fn list_internal_organization_users(state: &AppState) -> Result<Vec<OrganizationUser>> {
    let conn = state.db.get()?;
    queries::list_all_organization_users(&conn)
}

pub fn list_internal_projects(state: &AppState) -> Result<Vec<Project>> {
    let conn = state.db.get()?;
    queries::list_all_projects(&conn)
}

pub fn list_internal_project_users(state: &AppState) -> Result<Vec<ProjectUser>> {
    let conn = state.db.get()?;
    queries::list_all_project_users(&conn)
}

pub fn list_internal_users(state: &AppState) -> Result<Vec<User>> {
    let conn = state.db.get()?;
    queries::list_users(&conn)
}

/// Every key in every tenant with its plaintext secret and internal user id.
pub fn list_internal_api_keys(state: &AppState) -> Result<Vec<ApiKeyView>> {
    let conn = state.db.get()?;
    queries::list_all_api_keys(&conn)?
        .iter()
        .map(|key| {
            let secret = reveal_secret(state.data_key.as_ref(), key)?;
            to_view(&conn, key, secret, true)
        })
        .collect()
}

/// Attach a new identity by (tenant, title, namespace).
///
/// Existing users are returned unchanged. When the tenant has an organization
/// with `title`, the user becomes owner of it and of its project assigned to
/// `kubernetes_namespace`. Otherwise an organization and project are created
/// with the user as owner.
pub fn create_user_internal(state: &AppState, input: &CreateUserInternal) -> Result<User> {
    let tenant_id = required(&input.tenant_id, "tenant id")?;
    let title = required(&input.title, "title")?;
    let user_id = normalize_user_id(required(&input.user_id, "user id")?);
    let namespace = required(&input.kubernetes_namespace, "kubernetes namespace")?;
    if !is_valid_namespace(namespace) {
        return Err(AppError::BadRequest(format!("invalid namespace {:?}", namespace)));
    }

    let mut conn = state.db.get()?;
    let tx = begin(&mut conn)?;

    if let Some(user) = queries::get_user(&tx, &user_id)? {
        return Ok(user);
    }

    match queries::get_organization_by_title(&tx, tenant_id, title)? {
        Some(org) => {
            let project = queries::list_projects_for_organization(&tx, &org.id)?
                .into_iter()
                .find(|p| p.kubernetes_namespace() == Some(namespace))
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "no project with namespace {:?} in organization {:?}",
                        namespace, title
                    ))
                })?;

            queries::find_or_create_user(&tx, &user_id)?;
            queries::create_organization_user(&tx, &org.id, &user_id, OrganizationRole::Owner, false)?;
            queries::create_project_user(
                &tx,
                &project.id,
                &org.id,
                &user_id,
                ProjectRole::Owner,
                false,
            )?;
            tracing::info!(
                "Attached {} to organization {} and project {}",
                user_id,
                org.id,
                project.id
            );
        }
        None => {
            let org = create_organization_in_tx(&tx, tenant_id, title, false, &[user_id.clone()])?;
            let assignments = vec![ProjectAssignment {
                cluster_id: String::new(),
                namespace: namespace.to_string(),
            }];
            let project = create_project_in_tx(&tx, &org, title, &assignments, false)?;
            tracing::info!(
                "Created organization {} and project {} for {}",
                org.id,
                project.id,
                user_id
            );
        }
    }

    let user = queries::find_or_create_user(&tx, &user_id)?;
    tx.commit()?;
    Ok(user)
}
