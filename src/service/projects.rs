use std::collections::HashSet;

use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::*;
use crate::rbac::Caller;
use crate::util::{is_valid_namespace, normalize_user_id};

use super::{begin, organization_in_tenant, project_in_organization, required};

const UPDATABLE_FIELDS: &[&str] = &["title"];

/// Accept either a bare namespace or an explicit assignment list.
pub(crate) fn resolve_assignments(
    kubernetes_namespace: Option<&str>,
    assignments: &[ProjectAssignment],
) -> Result<Vec<ProjectAssignment>> {
    let namespace = kubernetes_namespace.map(str::trim).filter(|ns| !ns.is_empty());

    let resolved = match (namespace, assignments.is_empty()) {
        (Some(_), false) => {
            return Err(AppError::BadRequest(
                "only one of kubernetes_namespace and assignments may be set".into(),
            ));
        }
        (Some(ns), true) => vec![ProjectAssignment {
            cluster_id: String::new(),
            namespace: ns.to_string(),
        }],
        (None, false) => assignments.to_vec(),
        (None, true) => {
            return Err(AppError::BadRequest(
                "kubernetes_namespace or assignments is required".into(),
            ));
        }
    };

    let mut seen = HashSet::new();
    for assignment in &resolved {
        if assignment.namespace.is_empty() {
            return Err(AppError::BadRequest("assignment namespace is required".into()));
        }
        if !is_valid_namespace(&assignment.namespace) {
            return Err(AppError::BadRequest(format!(
                "invalid namespace {:?}",
                assignment.namespace
            )));
        }
        if !seen.insert((assignment.cluster_id.as_str(), assignment.namespace.as_str())) {
            return Err(AppError::BadRequest(format!(
                "duplicate assignment for namespace {:?}",
                assignment.namespace
            )));
        }
    }
    Ok(resolved)
}

/// Insert a project and copy the organization's current owners into it.
///
/// Owners granted later are not copied; they reach the project through
/// implicit organization-owner access instead.
pub(crate) fn create_project_in_tx(
    tx: &Connection,
    org: &Organization,
    title: &str,
    assignments: &[ProjectAssignment],
    is_default: bool,
) -> Result<Project> {
    let project = queries::create_project(tx, &org.id, &org.tenant_id, title, assignments, is_default)
        .map_err(|e| e.or_conflict(format!("project {:?} already exists", title)))?;

    for owner in queries::list_organization_owners(tx, &org.id)? {
        queries::create_project_user(
            tx,
            &project.id,
            &org.id,
            &owner.user_id,
            ProjectRole::Owner,
            owner.hidden,
        )?;
    }

    Ok(project)
}

pub fn create_project(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    input: &CreateProject,
) -> Result<Project> {
    let title = required(&input.title, "title")?;
    let assignments = resolve_assignments(input.kubernetes_namespace.as_deref(), &input.assignments)?;

    let mut conn = state.db.get()?;
    let org = organization_in_tenant(&conn, caller, organization_id)?;
    state
        .auth
        .validate_organization_owner(&conn, &org.id, &caller.user_id)?;

    let tx = begin(&mut conn)?;
    let project = create_project_in_tx(&tx, &org, title, &assignments, false)?;
    tx.commit()?;

    tracing::info!("Created project {} ({:?}) in organization {}", project.id, project.title, org.id);
    Ok(project)
}

pub fn delete_project(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    project_id: &str,
) -> Result<()> {
    let mut conn = state.db.get()?;
    let project = project_in_organization(&conn, caller, organization_id, project_id)?;
    state.auth.validate_project_owner(
        &conn,
        &project.id,
        &project.organization_id,
        &caller.user_id,
    )?;

    if project.is_default {
        return Err(AppError::BadRequest(
            "the default project cannot be deleted".into(),
        ));
    }

    let tx = begin(&mut conn)?;
    if !queries::delete_project(&tx, &project.id)? {
        return Err(AppError::NotFound(format!("project {:?} not found", project_id)));
    }
    let removed = queries::delete_project_users(&tx, &project.id)?;
    tx.commit()?;

    tracing::info!("Deleted project {} and {} user binding(s)", project.id, removed);
    Ok(())
}

pub fn update_project(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    project_id: &str,
    input: &UpdateProject,
) -> Result<Project> {
    if input.update_mask.is_empty() {
        return Err(AppError::BadRequest("update mask is required".into()));
    }
    for path in &input.update_mask {
        if !UPDATABLE_FIELDS.contains(&path.as_str()) {
            return Err(AppError::BadRequest(format!(
                "field {:?} cannot be updated",
                path
            )));
        }
    }
    let title = required(input.title.as_deref().unwrap_or_default(), "title")?;

    let conn = state.db.get()?;
    let project = project_in_organization(&conn, caller, organization_id, project_id)?;
    state.auth.validate_project_owner(
        &conn,
        &project.id,
        &project.organization_id,
        &caller.user_id,
    )?;

    queries::update_project_title(&conn, &project.id, title)
        .map_err(|e| e.or_conflict(format!("project {:?} already exists", title)))?;

    Ok(Project {
        title: title.to_string(),
        ..project
    })
}

pub fn list_projects(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    include_summary: bool,
) -> Result<Vec<ProjectWithSummary>> {
    let conn = state.db.get()?;
    let org = organization_in_tenant(&conn, caller, organization_id)?;

    let mut result = Vec::new();
    for project in queries::list_projects_for_organization(&conn, &org.id)? {
        if !state
            .auth
            .is_project_member(&conn, &project.id, &org.id, &caller.user_id)?
        {
            continue;
        }
        let summary = if include_summary {
            Some(ProjectSummary {
                user_count: queries::count_project_users(&conn, &project.id)?,
            })
        } else {
            None
        };
        result.push(ProjectWithSummary { project, summary });
    }

    // Outsiders get the same answer as for a missing organization.
    if result.is_empty()
        && state
            .auth
            .organization_role(&conn, &org.id, &caller.user_id)?
            .is_none()
    {
        return Err(AppError::NotFound(format!(
            "organization {:?} not found",
            organization_id
        )));
    }
    Ok(result)
}

// ============ Project Users ============

pub fn create_project_user(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    project_id: &str,
    input: &CreateProjectUser,
) -> Result<ProjectUser> {
    let user_id = normalize_user_id(required(&input.user_id, "user id")?);

    let mut conn = state.db.get()?;
    let project = project_in_organization(&conn, caller, organization_id, project_id)?;
    state.auth.validate_project_owner(
        &conn,
        &project.id,
        &project.organization_id,
        &caller.user_id,
    )?;

    let tx = begin(&mut conn)?;
    if queries::get_organization_user(&tx, &project.organization_id, &user_id)?.is_none() {
        return Err(AppError::FailedPrecondition(format!(
            "user {:?} is not a member of the organization",
            user_id
        )));
    }
    queries::find_or_create_user(&tx, &user_id)?;
    let binding = queries::create_project_user(
        &tx,
        &project.id,
        &project.organization_id,
        &user_id,
        input.role,
        false,
    )
    .map_err(|e| {
        e.or_conflict(format!(
            "user {:?} is already a member of project {:?}",
            user_id, project.id
        ))
    })?;
    tx.commit()?;

    tracing::info!(
        "Granted {} on project {} to {}",
        binding.role.as_ref(),
        project.id,
        user_id
    );
    Ok(binding)
}

pub fn list_project_users(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    project_id: &str,
) -> Result<Vec<ProjectUser>> {
    let conn = state.db.get()?;
    let project = project_in_organization(&conn, caller, organization_id, project_id)?;
    state.auth.validate_project_member(
        &conn,
        &project.id,
        &project.organization_id,
        &caller.user_id,
    )?;
    queries::list_project_users(&conn, &project.id)
}

pub fn delete_project_user(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    project_id: &str,
    user_id: &str,
) -> Result<()> {
    let user_id = normalize_user_id(required(user_id, "user id")?);

    let conn = state.db.get()?;
    let project = project_in_organization(&conn, caller, organization_id, project_id)?;
    state.auth.validate_project_owner(
        &conn,
        &project.id,
        &project.organization_id,
        &caller.user_id,
    )?;

    if !queries::delete_project_user(&conn, &project.id, &user_id)? {
        return Err(AppError::NotFound("project user not found".into()));
    }

    tracing::info!("Removed {} from project {}", user_id, project.id);
    Ok(())
}
