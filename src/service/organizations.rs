use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::*;
use crate::rbac::Caller;
use crate::util::normalize_user_id;

use super::{begin, organization_in_tenant, required};

/// Insert an organization and bind every listed user as owner.
pub(crate) fn create_organization_in_tx(
    tx: &Connection,
    tenant_id: &str,
    title: &str,
    is_default: bool,
    owner_ids: &[String],
) -> Result<Organization> {
    let org = queries::create_organization(tx, tenant_id, title, is_default)
        .map_err(|e| e.or_conflict(format!("organization {:?} already exists", title)))?;

    let mut owners: Vec<&String> = owner_ids.iter().collect();
    owners.sort();
    owners.dedup();
    for user_id in owners {
        queries::find_or_create_user(tx, user_id)?;
        queries::create_organization_user(tx, &org.id, user_id, OrganizationRole::Owner, false)?;
    }

    Ok(org)
}

pub fn create_organization(
    state: &AppState,
    caller: &Caller,
    input: &CreateOrganization,
) -> Result<Organization> {
    let title = required(&input.title, "title")?;

    let mut conn = state.db.get()?;
    state
        .auth
        .validate_organization_creation(&conn, &caller.user_id, &caller.tenant_id)?;

    let tx = begin(&mut conn)?;
    let org = create_organization_in_tx(
        &tx,
        &caller.tenant_id,
        title,
        false,
        &[caller.user_id.clone()],
    )?;
    tx.commit()?;

    tracing::info!("Created organization {} ({:?}) in tenant {}", org.id, org.title, org.tenant_id);
    Ok(org)
}

pub fn delete_organization(state: &AppState, caller: &Caller, organization_id: &str) -> Result<()> {
    let mut conn = state.db.get()?;
    let org = organization_in_tenant(&conn, caller, organization_id)?;
    state
        .auth
        .validate_organization_owner(&conn, &org.id, &caller.user_id)?;

    if org.is_default {
        return Err(AppError::BadRequest(
            "the default organization cannot be deleted".into(),
        ));
    }

    let projects = queries::list_projects_for_organization(&conn, &org.id)?;
    if !projects.is_empty() {
        let titles: Vec<&str> = projects.iter().map(|p| p.title.as_str()).collect();
        return Err(AppError::FailedPrecondition(format!(
            "organization {:?} still has projects: {}",
            org.title,
            titles.join(", ")
        )));
    }

    // A project created between the check above and this transaction is
    // orphaned. Known race, left as is.
    let tx = begin(&mut conn)?;
    if !queries::delete_organization(&tx, &org.id)? {
        return Err(AppError::NotFound(format!(
            "organization {:?} not found",
            organization_id
        )));
    }
    let removed = queries::delete_organization_users(&tx, &org.id)?;
    tx.commit()?;

    tracing::info!("Deleted organization {} and {} user binding(s)", org.id, removed);
    Ok(())
}

pub fn list_organizations(
    state: &AppState,
    caller: &Caller,
    include_summary: bool,
) -> Result<Vec<OrganizationWithSummary>> {
    let conn = state.db.get()?;

    let mut result = Vec::new();
    for org in queries::list_organizations_by_tenant(&conn, &caller.tenant_id)? {
        let Some(role) = state
            .auth
            .organization_role(&conn, &org.id, &caller.user_id)?
        else {
            continue;
        };

        let summary = if include_summary {
            Some(summarize(state, &conn, caller, &org, role)?)
        } else {
            None
        };
        result.push(OrganizationWithSummary {
            organization: org,
            summary,
        });
    }
    Ok(result)
}

fn summarize(
    state: &AppState,
    conn: &Connection,
    caller: &Caller,
    org: &Organization,
    role: OrganizationRole,
) -> Result<OrganizationSummary> {
    let mut project_count = 0;
    for project in queries::list_projects_for_organization(conn, &org.id)? {
        if state
            .auth
            .is_project_member(conn, &project.id, &org.id, &caller.user_id)?
        {
            project_count += 1;
        }
    }

    let user_count = if role.is_owner() {
        queries::count_organization_users(conn, &org.id)?
    } else {
        0
    };

    Ok(OrganizationSummary {
        project_count,
        user_count,
    })
}

// ============ Organization Users ============

pub fn create_organization_user(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    input: &CreateOrganizationUser,
) -> Result<OrganizationUser> {
    let user_id = normalize_user_id(required(&input.user_id, "user id")?);
    if !input.role.is_assignable() {
        return Err(AppError::BadRequest(format!(
            "role {:?} cannot be granted",
            input.role.as_ref()
        )));
    }

    let mut conn = state.db.get()?;
    let org = organization_in_tenant(&conn, caller, organization_id)?;
    state
        .auth
        .validate_organization_owner(&conn, &org.id, &caller.user_id)?;

    let tx = begin(&mut conn)?;
    queries::find_or_create_user(&tx, &user_id)?;
    let binding = queries::create_organization_user(&tx, &org.id, &user_id, input.role, false)
        .map_err(|e| {
            e.or_conflict(format!(
                "user {:?} is already a member of organization {:?}",
                user_id, org.id
            ))
        })?;
    tx.commit()?;

    tracing::info!(
        "Granted {} on organization {} to {}",
        binding.role.as_ref(),
        org.id,
        user_id
    );
    Ok(binding)
}

pub fn list_organization_users(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
) -> Result<Vec<OrganizationUser>> {
    let conn = state.db.get()?;
    let org = organization_in_tenant(&conn, caller, organization_id)?;
    state
        .auth
        .validate_organization_owner(&conn, &org.id, &caller.user_id)?;
    queries::list_organization_users(&conn, &org.id)
}

/// Removes the user's binding and every project binding it holds in the organization.
pub fn delete_organization_user(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    user_id: &str,
) -> Result<()> {
    let user_id = normalize_user_id(required(user_id, "user id")?);

    let mut conn = state.db.get()?;
    let org = organization_in_tenant(&conn, caller, organization_id)?;
    state
        .auth
        .validate_organization_owner(&conn, &org.id, &caller.user_id)?;

    let tx = begin(&mut conn)?;
    if queries::get_organization_user(&tx, &org.id, &user_id)?.is_none() {
        return Err(AppError::NotFound("organization user not found".into()));
    }
    let removed = queries::delete_project_users_in_organization(&tx, &org.id, &user_id)?;
    queries::delete_organization_user(&tx, &org.id, &user_id)?;
    tx.commit()?;

    tracing::info!(
        "Removed {} from organization {} and {} project(s)",
        user_id,
        org.id,
        removed
    );
    Ok(())
}
