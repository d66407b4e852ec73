use rusqlite::Connection;

use crate::config::DefaultApiKey;
use crate::crypto::DataKey;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::*;
use crate::rbac::{self, Caller};
use crate::util::{
    generate_api_key_id, generate_secret, normalize_user_id, obfuscate_secret,
    service_account_user_id,
};

use super::{begin, project_in_organization, required};

/// Everything needed to persist one key. `service_account_role` switches the
/// owner to a synthetic `system:serviceaccount:<name>` identity.
pub(crate) struct NewApiKey<'a> {
    pub tenant_id: &'a str,
    pub organization_id: &'a str,
    pub project_id: &'a str,
    pub name: &'a str,
    pub user_id: &'a str,
    pub service_account_role: Option<OrganizationRole>,
    /// Pre-provisioned secret; generated when absent.
    pub secret: Option<&'a str>,
    pub excluded_from_rate_limiting: bool,
}

/// Insert the key row and, for service accounts, the synthetic user and its
/// bindings. Returns the stored row and the plaintext secret.
pub(crate) fn create_api_key_in_tx(
    tx: &Connection,
    data_key: Option<&DataKey>,
    new: &NewApiKey,
) -> Result<(ApiKey, String)> {
    let user_id = match new.service_account_role {
        Some(role) => {
            let user_id = service_account_user_id(new.name);
            queries::find_or_create_user(tx, &user_id)?;
            queries::create_organization_user(tx, new.organization_id, &user_id, role, true)
                .map_err(|e| {
                    e.or_conflict(format!("service account {:?} already exists", new.name))
                })?;
            queries::create_project_user(
                tx,
                new.project_id,
                new.organization_id,
                &user_id,
                ProjectRole::Owner,
                true,
            )
            .map_err(|e| e.or_conflict(format!("service account {:?} already exists", new.name)))?;
            user_id
        }
        None => {
            queries::find_or_create_user(tx, new.user_id)?;
            new.user_id.to_string()
        }
    };

    let id = generate_api_key_id();
    let secret = new.secret.map(String::from).unwrap_or_else(generate_secret);
    let (stored_secret, encrypted_secret) = match data_key {
        Some(key) => (None, Some(key.encrypt_secret(&secret, &id)?)),
        None => (Some(secret.clone()), None),
    };

    let key = ApiKey {
        id,
        tenant_id: new.tenant_id.to_string(),
        organization_id: new.organization_id.to_string(),
        project_id: new.project_id.to_string(),
        user_id,
        name: new.name.to_string(),
        secret: stored_secret,
        encrypted_secret,
        is_service_account: new.service_account_role.is_some(),
        excluded_from_rate_limiting: new.excluded_from_rate_limiting,
        created_at: queries::now(),
    };
    queries::create_api_key(tx, &key)
        .map_err(|e| e.or_conflict(format!("API key {:?} already exists", new.name)))?;

    Ok((key, secret))
}

/// Remove the synthetic identity behind a service-account key. Parts that are
/// already gone are logged and skipped.
///
/// Project bindings go from every project of the organization: an owner-role
/// service account is copied into projects created after it.
fn remove_service_account_in_tx(tx: &Connection, key: &ApiKey) -> Result<()> {
    let removed = queries::delete_project_users_in_organization(tx, &key.organization_id, &key.user_id)?;
    if removed == 0 {
        tracing::warn!(
            "Project bindings for service account {} in {} already absent",
            key.user_id,
            key.organization_id
        );
    }
    if !queries::delete_organization_user(tx, &key.organization_id, &key.user_id)? {
        tracing::warn!(
            "Organization binding for service account {} in {} already absent",
            key.user_id,
            key.organization_id
        );
    }
    if !queries::delete_user(tx, &key.user_id)? {
        tracing::warn!("Service account user {} already absent", key.user_id);
    }
    Ok(())
}

/// Plaintext secret of a stored key.
pub(crate) fn reveal_secret(data_key: Option<&DataKey>, key: &ApiKey) -> Result<String> {
    match (&key.encrypted_secret, &key.secret) {
        (Some(ciphertext), _) => {
            let data_key = data_key.ok_or_else(|| {
                AppError::Internal(format!(
                    "API key {} is encrypted but no data key is loaded",
                    key.id
                ))
            })?;
            data_key.decrypt_secret(ciphertext, &key.id)
        }
        (None, Some(secret)) => Ok(secret.clone()),
        (None, None) => Err(AppError::Internal(format!("API key {} has no secret", key.id))),
    }
}

/// Join a key with titles and its owner's roles. Resources that no longer
/// exist show up with an empty title.
pub(crate) fn to_view(
    conn: &Connection,
    key: &ApiKey,
    secret: String,
    internal: bool,
) -> Result<ApiKeyView> {
    let org_title = queries::get_organization(conn, &key.organization_id)?
        .map(|o| o.title)
        .unwrap_or_default();
    let project_title = queries::get_project(conn, &key.project_id)?
        .map(|p| p.title)
        .unwrap_or_default();

    let (internal_user_id, tenant_id) = if internal {
        (
            queries::get_user(conn, &key.user_id)?.map(|u| u.internal_user_id),
            Some(key.tenant_id.clone()),
        )
    } else {
        (None, None)
    };

    Ok(ApiKeyView {
        id: key.id.clone(),
        name: key.name.clone(),
        secret,
        created_at: key.created_at,
        user_id: key.user_id.clone(),
        internal_user_id,
        tenant_id,
        organization: ResourceRef {
            id: key.organization_id.clone(),
            title: org_title,
        },
        project: ResourceRef {
            id: key.project_id.clone(),
            title: project_title,
        },
        organization_role: rbac::organization_role(conn, &key.organization_id, &key.user_id)?,
        project_role: rbac::project_role(conn, &key.project_id, &key.user_id)?,
        is_service_account: key.is_service_account,
        excluded_from_rate_limiting: key.excluded_from_rate_limiting,
    })
}

fn obfuscated_view(state: &AppState, conn: &Connection, key: &ApiKey) -> Result<ApiKeyView> {
    let secret = reveal_secret(state.data_key.as_ref(), key)?;
    to_view(conn, key, obfuscate_secret(&secret), false)
}

/// A key is visible to its owner and to owners of its project.
fn can_manage(state: &AppState, conn: &Connection, caller: &Caller, key: &ApiKey) -> Result<bool> {
    if key.user_id == caller.user_id {
        return Ok(true);
    }
    state
        .auth
        .is_project_owner(conn, &key.project_id, &key.organization_id, &caller.user_id)
}

fn key_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("API key {:?} not found", id))
}

fn manageable_key(state: &AppState, conn: &Connection, caller: &Caller, id: &str) -> Result<ApiKey> {
    let key = queries::get_api_key(conn, required(id, "API key id")?)?
        .filter(|k| k.tenant_id == caller.tenant_id)
        .ok_or_else(|| key_not_found(id))?;
    if !can_manage(state, conn, caller, &key)? {
        return Err(key_not_found(id));
    }
    Ok(key)
}

// ============ Operations ============

/// The returned view carries the plaintext secret; it is never shown again.
pub fn create_api_key(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    project_id: &str,
    input: &CreateApiKey,
) -> Result<ApiKeyView> {
    let name = required(&input.name, "name")?;

    let mut conn = state.db.get()?;
    let project = project_in_organization(&conn, caller, organization_id, project_id)?;

    let service_account_role = if input.is_service_account {
        state
            .auth
            .validate_organization_owner(&conn, &project.organization_id, &caller.user_id)?;
        let role = input.role.ok_or_else(|| {
            AppError::BadRequest("role is required for service accounts".into())
        })?;
        if !role.is_assignable() {
            return Err(AppError::BadRequest(format!(
                "role {:?} cannot be granted",
                role.as_ref()
            )));
        }
        Some(role)
    } else {
        state.auth.validate_project_member(
            &conn,
            &project.id,
            &project.organization_id,
            &caller.user_id,
        )?;
        None
    };

    let tx = begin(&mut conn)?;
    let (key, secret) = create_api_key_in_tx(
        &tx,
        state.data_key.as_ref(),
        &NewApiKey {
            tenant_id: &caller.tenant_id,
            organization_id: &project.organization_id,
            project_id: &project.id,
            name,
            user_id: &caller.user_id,
            service_account_role,
            secret: None,
            excluded_from_rate_limiting: input.excluded_from_rate_limiting,
        },
    )?;
    tx.commit()?;

    tracing::info!(
        "Created API key {} ({:?}) for {} in project {}",
        key.id,
        key.name,
        key.user_id,
        key.project_id
    );
    to_view(&conn, &key, secret, false)
}

/// Keys of the caller's tenant that the caller owns or whose project it owns.
pub fn list_api_keys(state: &AppState, caller: &Caller) -> Result<Vec<ApiKeyView>> {
    let conn = state.db.get()?;
    let mut views = Vec::new();
    for key in queries::list_api_keys_by_tenant(&conn, &caller.tenant_id)? {
        if can_manage(state, &conn, caller, &key)? {
            views.push(obfuscated_view(state, &conn, &key)?);
        }
    }
    Ok(views)
}

pub fn list_project_api_keys(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    project_id: &str,
) -> Result<Vec<ApiKeyView>> {
    let conn = state.db.get()?;
    let project = project_in_organization(&conn, caller, organization_id, project_id)?;
    state.auth.validate_project_member(
        &conn,
        &project.id,
        &project.organization_id,
        &caller.user_id,
    )?;

    let mut views = Vec::new();
    for key in queries::list_api_keys_by_project(&conn, &project.id)? {
        if can_manage(state, &conn, caller, &key)? {
            views.push(obfuscated_view(state, &conn, &key)?);
        }
    }
    Ok(views)
}

pub fn delete_api_key(state: &AppState, caller: &Caller, id: &str) -> Result<()> {
    let mut conn = state.db.get()?;
    let key = manageable_key(state, &conn, caller, id)?;
    remove_api_key(&mut conn, &key)
}

pub fn delete_project_api_key(
    state: &AppState,
    caller: &Caller,
    organization_id: &str,
    project_id: &str,
    id: &str,
) -> Result<()> {
    let mut conn = state.db.get()?;
    let project = project_in_organization(&conn, caller, organization_id, project_id)?;
    state.auth.validate_project_member(
        &conn,
        &project.id,
        &project.organization_id,
        &caller.user_id,
    )?;

    let key = manageable_key(state, &conn, caller, id)?;
    if key.project_id != project.id {
        return Err(key_not_found(id));
    }
    remove_api_key(&mut conn, &key)
}

fn remove_api_key(conn: &mut Connection, key: &ApiKey) -> Result<()> {
    let tx = begin(conn)?;
    if key.is_service_account {
        remove_service_account_in_tx(&tx, key)?;
        if !queries::delete_api_key(&tx, &key.id)? {
            tracing::warn!("API key {} already absent", key.id);
        }
    } else if !queries::delete_api_key(&tx, &key.id)? {
        return Err(key_not_found(&key.id));
    }
    tx.commit()?;

    tracing::info!("Deleted API key {} ({:?})", key.id, key.name);
    Ok(())
}

/// Only the name can change.
pub fn update_api_key(
    state: &AppState,
    caller: &Caller,
    id: &str,
    input: &UpdateApiKey,
) -> Result<ApiKeyView> {
    if input.update_mask.is_empty() {
        return Err(AppError::BadRequest("update mask is required".into()));
    }
    if let Some(path) = input.update_mask.iter().find(|p| p.as_str() != "name") {
        return Err(AppError::BadRequest(format!(
            "field {:?} cannot be updated",
            path
        )));
    }
    let name = required(input.name.as_deref().unwrap_or_default(), "name")?;

    let conn = state.db.get()?;
    let key = manageable_key(state, &conn, caller, id)?;
    queries::update_api_key_name(&conn, &key.id, name)
        .map_err(|e| e.or_conflict(format!("API key {:?} already exists", name)))?;

    let key = ApiKey {
        name: name.to_string(),
        ..key
    };
    obfuscated_view(state, &conn, &key)
}

/// Create a provisioned key unless one with the same name already exists for
/// its owner. Service accounts get the `tenant-system` role.
pub fn create_default_api_key(
    conn: &mut Connection,
    data_key: Option<&DataKey>,
    org: &Organization,
    project: &Project,
    spec: &DefaultApiKey,
) -> Result<Option<ApiKey>> {
    let name = required(&spec.name, "default API key name")?;
    let owner = if spec.is_service_account {
        service_account_user_id(name)
    } else {
        normalize_user_id(required(&spec.user_id, "default API key user id")?)
    };

    let tx = begin(conn)?;
    if queries::get_api_key_by_name_and_user(&tx, name, &owner)?.is_some() {
        return Ok(None);
    }
    let (key, _) = create_api_key_in_tx(
        &tx,
        data_key,
        &NewApiKey {
            tenant_id: &org.tenant_id,
            organization_id: &org.id,
            project_id: &project.id,
            name,
            user_id: &owner,
            service_account_role: spec
                .is_service_account
                .then_some(OrganizationRole::TenantSystem),
            secret: spec.secret.as_deref(),
            excluded_from_rate_limiting: spec.excluded_from_rate_limiting,
        },
    )?;
    tx.commit()?;
    Ok(Some(key))
}
