//! Idempotent provisioning of the default organization, project and keys.
//!
//! These run at startup with no caller, so no authorization checks apply.

use crate::config::{DefaultApiKey, DefaultOrganization, DefaultProject, Defaults};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::*;
use crate::util::normalize_user_id;

use super::api_keys::create_default_api_key;
use super::organizations::create_organization_in_tx;
use super::projects::{create_project_in_tx, resolve_assignments};
use super::{begin, required};

/// Return the default organization, creating it on first boot. Configured
/// owners missing from an existing organization are bound again.
pub fn create_default_organization(state: &AppState, spec: &DefaultOrganization) -> Result<Organization> {
    let title = required(&spec.title, "default organization title")?;
    let tenant_id = required(&spec.tenant_id, "default tenant id")?;
    let owners: Vec<String> = spec.user_ids.iter().map(|id| normalize_user_id(id)).collect();
    if owners.is_empty() {
        return Err(AppError::BadRequest(
            "the default organization needs at least one owner".into(),
        ));
    }

    let mut conn = state.db.get()?;
    let tx = begin(&mut conn)?;

    let org = match queries::get_organization_by_title(&tx, tenant_id, title)? {
        Some(org) => {
            for user_id in &owners {
                if queries::get_organization_user(&tx, &org.id, user_id)?.is_none() {
                    queries::find_or_create_user(&tx, user_id)?;
                    queries::create_organization_user(
                        &tx,
                        &org.id,
                        user_id,
                        OrganizationRole::Owner,
                        false,
                    )?;
                    tracing::info!("Added {} as owner of default organization {}", user_id, org.id);
                }
            }
            org
        }
        None => {
            let org = create_organization_in_tx(&tx, tenant_id, title, true, &owners)?;
            tracing::info!("Created default organization {} ({:?})", org.id, org.title);
            org
        }
    };

    tx.commit()?;
    Ok(org)
}

pub fn create_default_project(
    state: &AppState,
    spec: &DefaultProject,
    org: &Organization,
) -> Result<Project> {
    let title = required(&spec.title, "default project title")?;
    let assignments = resolve_assignments(Some(spec.kubernetes_namespace.as_str()), &[])?;

    let mut conn = state.db.get()?;
    let tx = begin(&mut conn)?;

    if let Some(project) = queries::get_default_project(&tx, &org.tenant_id)? {
        return Ok(project);
    }
    let project = create_project_in_tx(&tx, org, title, &assignments, true)?;
    tx.commit()?;

    tracing::info!("Created default project {} ({:?})", project.id, project.title);
    Ok(project)
}

pub fn create_default_api_keys(
    state: &AppState,
    keys: &[DefaultApiKey],
    org: &Organization,
    project: &Project,
) -> Result<()> {
    let mut conn = state.db.get()?;
    for spec in keys {
        match create_default_api_key(&mut conn, state.data_key.as_ref(), org, project, spec)? {
            Some(key) => tracing::info!("Created default API key {} ({:?})", key.id, key.name),
            None => tracing::debug!("Default API key {:?} already exists", spec.name),
        }
    }
    Ok(())
}

/// Provision everything configured in `defaults`. Safe to call on every boot.
pub fn bootstrap_defaults(state: &AppState, defaults: &Defaults) -> Result<()> {
    let Some(org_spec) = &defaults.organization else {
        return Ok(());
    };
    let org = create_default_organization(state, org_spec)?;

    let Some(project_spec) = &defaults.project else {
        return Ok(());
    };
    let project = create_default_project(state, project_spec, &org)?;

    create_default_api_keys(state, &defaults.api_keys, &org, &project)
}
