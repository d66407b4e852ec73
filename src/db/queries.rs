use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::*;
use crate::util::{generate_organization_id, generate_project_id};

use super::from_row::{
    API_KEY_COLS, ORGANIZATION_COLS, ORGANIZATION_USER_COLS, PROJECT_COLS, PROJECT_USER_COLS,
    USER_COLS, query_all, query_one,
};

pub(crate) fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_internal_user_id() -> String {
    format!("user-{}", Uuid::new_v4().simple())
}

// ============ Users ============

pub fn get_user(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLS),
        &[&user_id],
    )
}

/// Return the user row for `user_id`, inserting it on first reference.
pub fn find_or_create_user(conn: &Connection, user_id: &str) -> Result<User> {
    conn.execute(
        "INSERT OR IGNORE INTO users (user_id, internal_user_id, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, gen_internal_user_id(), now()],
    )?;
    get_user(conn, user_id)?
        .ok_or_else(|| AppError::Internal(format!("user {:?} vanished after insert", user_id)))
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    query_all(
        conn,
        &format!("SELECT {} FROM users ORDER BY created_at, user_id", USER_COLS),
        &[],
    )
}

pub fn delete_user(conn: &Connection, user_id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
    Ok(deleted > 0)
}

// ============ Organizations ============

pub fn create_organization(
    conn: &Connection,
    tenant_id: &str,
    title: &str,
    is_default: bool,
) -> Result<Organization> {
    let id = generate_organization_id();
    let now = now();

    conn.execute(
        "INSERT INTO organizations (id, tenant_id, title, is_default, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, tenant_id, title, is_default, now],
    )?;

    Ok(Organization {
        id,
        tenant_id: tenant_id.to_string(),
        title: title.to_string(),
        is_default,
        created_at: now,
    })
}

pub fn get_organization(conn: &Connection, id: &str) -> Result<Option<Organization>> {
    query_one(
        conn,
        &format!("SELECT {} FROM organizations WHERE id = ?1", ORGANIZATION_COLS),
        &[&id],
    )
}

/// Organizations of other tenants are treated as absent.
pub fn get_organization_in_tenant(
    conn: &Connection,
    id: &str,
    tenant_id: &str,
) -> Result<Option<Organization>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM organizations WHERE id = ?1 AND tenant_id = ?2",
            ORGANIZATION_COLS
        ),
        &[&id, &tenant_id],
    )
}

pub fn get_organization_by_title(
    conn: &Connection,
    tenant_id: &str,
    title: &str,
) -> Result<Option<Organization>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM organizations WHERE tenant_id = ?1 AND title = ?2",
            ORGANIZATION_COLS
        ),
        &[&tenant_id, &title],
    )
}

pub fn get_default_organization(conn: &Connection, tenant_id: &str) -> Result<Option<Organization>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM organizations WHERE tenant_id = ?1 AND is_default = 1 ORDER BY created_at LIMIT 1",
            ORGANIZATION_COLS
        ),
        &[&tenant_id],
    )
}

pub fn list_organizations_by_tenant(conn: &Connection, tenant_id: &str) -> Result<Vec<Organization>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM organizations WHERE tenant_id = ?1 ORDER BY created_at, id",
            ORGANIZATION_COLS
        ),
        &[&tenant_id],
    )
}

pub fn list_all_organizations(conn: &Connection) -> Result<Vec<Organization>> {
    query_all(
        conn,
        &format!("SELECT {} FROM organizations ORDER BY created_at, id", ORGANIZATION_COLS),
        &[],
    )
}

pub fn delete_organization(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM organizations WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ============ Organization Users ============

pub fn create_organization_user(
    conn: &Connection,
    organization_id: &str,
    user_id: &str,
    role: OrganizationRole,
    hidden: bool,
) -> Result<OrganizationUser> {
    let now = now();

    conn.execute(
        "INSERT INTO organization_users (organization_id, user_id, role, hidden, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![organization_id, user_id, role.as_ref(), hidden, now],
    )?;

    Ok(OrganizationUser {
        organization_id: organization_id.to_string(),
        user_id: user_id.to_string(),
        role,
        hidden,
        created_at: now,
    })
}

pub fn get_organization_user(
    conn: &Connection,
    organization_id: &str,
    user_id: &str,
) -> Result<Option<OrganizationUser>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM organization_users WHERE organization_id = ?1 AND user_id = ?2",
            ORGANIZATION_USER_COLS
        ),
        &[&organization_id, &user_id],
    )
}

/// Visible (non-hidden) bindings of one organization.
pub fn list_organization_users(
    conn: &Connection,
    organization_id: &str,
) -> Result<Vec<OrganizationUser>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM organization_users WHERE organization_id = ?1 AND hidden = 0 ORDER BY created_at, user_id",
            ORGANIZATION_USER_COLS
        ),
        &[&organization_id],
    )
}

pub fn list_all_organization_users(conn: &Connection) -> Result<Vec<OrganizationUser>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM organization_users WHERE hidden = 0 ORDER BY created_at, organization_id, user_id",
            ORGANIZATION_USER_COLS
        ),
        &[],
    )
}

pub fn list_organization_users_by_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<OrganizationUser>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM organization_users WHERE user_id = ?1 ORDER BY created_at, organization_id",
            ORGANIZATION_USER_COLS
        ),
        &[&user_id],
    )
}

/// Every owner binding, hidden or not.
pub fn list_organization_owners(
    conn: &Connection,
    organization_id: &str,
) -> Result<Vec<OrganizationUser>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM organization_users WHERE organization_id = ?1 AND role = ?2 ORDER BY created_at, user_id",
            ORGANIZATION_USER_COLS
        ),
        &[&organization_id, &OrganizationRole::Owner.as_ref()],
    )
}

pub fn count_organization_users(conn: &Connection, organization_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM organization_users WHERE organization_id = ?1 AND hidden = 0",
        params![organization_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn delete_organization_user(
    conn: &Connection,
    organization_id: &str,
    user_id: &str,
) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM organization_users WHERE organization_id = ?1 AND user_id = ?2",
        params![organization_id, user_id],
    )?;
    Ok(deleted > 0)
}

pub fn delete_organization_users(conn: &Connection, organization_id: &str) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM organization_users WHERE organization_id = ?1",
        params![organization_id],
    )?;
    Ok(deleted)
}

// ============ Projects ============

pub fn create_project(
    conn: &Connection,
    organization_id: &str,
    tenant_id: &str,
    title: &str,
    assignments: &[ProjectAssignment],
    is_default: bool,
) -> Result<Project> {
    let id = generate_project_id();
    let now = now();
    let encoded = serde_json::to_string(assignments)?;

    conn.execute(
        "INSERT INTO projects (id, organization_id, tenant_id, title, is_default, assignments, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![&id, organization_id, tenant_id, title, is_default, &encoded, now],
    )?;

    Ok(Project {
        id,
        organization_id: organization_id.to_string(),
        tenant_id: tenant_id.to_string(),
        title: title.to_string(),
        is_default,
        assignments: assignments.to_vec(),
        created_at: now,
    })
}

pub fn get_project(conn: &Connection, id: &str) -> Result<Option<Project>> {
    query_one(
        conn,
        &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLS),
        &[&id],
    )
}

/// Only matches when the project sits under `organization_id` in `tenant_id`.
pub fn get_project_in_organization(
    conn: &Connection,
    id: &str,
    organization_id: &str,
    tenant_id: &str,
) -> Result<Option<Project>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM projects WHERE id = ?1 AND organization_id = ?2 AND tenant_id = ?3",
            PROJECT_COLS
        ),
        &[&id, &organization_id, &tenant_id],
    )
}

pub fn get_default_project(conn: &Connection, tenant_id: &str) -> Result<Option<Project>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM projects WHERE tenant_id = ?1 AND is_default = 1 ORDER BY created_at LIMIT 1",
            PROJECT_COLS
        ),
        &[&tenant_id],
    )
}

pub fn list_projects_for_organization(
    conn: &Connection,
    organization_id: &str,
) -> Result<Vec<Project>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM projects WHERE organization_id = ?1 ORDER BY created_at, id",
            PROJECT_COLS
        ),
        &[&organization_id],
    )
}

pub fn list_all_projects(conn: &Connection) -> Result<Vec<Project>> {
    query_all(
        conn,
        &format!("SELECT {} FROM projects ORDER BY created_at, id", PROJECT_COLS),
        &[],
    )
}

pub fn update_project_title(conn: &Connection, id: &str, title: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE projects SET title = ?1 WHERE id = ?2",
        params![title, id],
    )?;
    Ok(updated > 0)
}

pub fn delete_project(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ============ Project Users ============

pub fn create_project_user(
    conn: &Connection,
    project_id: &str,
    organization_id: &str,
    user_id: &str,
    role: ProjectRole,
    hidden: bool,
) -> Result<ProjectUser> {
    let now = now();

    conn.execute(
        "INSERT INTO project_users (project_id, organization_id, user_id, role, hidden, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![project_id, organization_id, user_id, role.as_ref(), hidden, now],
    )?;

    Ok(ProjectUser {
        project_id: project_id.to_string(),
        organization_id: organization_id.to_string(),
        user_id: user_id.to_string(),
        role,
        hidden,
        created_at: now,
    })
}

pub fn get_project_user(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
) -> Result<Option<ProjectUser>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM project_users WHERE project_id = ?1 AND user_id = ?2",
            PROJECT_USER_COLS
        ),
        &[&project_id, &user_id],
    )
}

pub fn list_project_users(conn: &Connection, project_id: &str) -> Result<Vec<ProjectUser>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM project_users WHERE project_id = ?1 AND hidden = 0 ORDER BY created_at, user_id",
            PROJECT_USER_COLS
        ),
        &[&project_id],
    )
}

pub fn list_all_project_users(conn: &Connection) -> Result<Vec<ProjectUser>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM project_users WHERE hidden = 0 ORDER BY created_at, project_id, user_id",
            PROJECT_USER_COLS
        ),
        &[],
    )
}

pub fn list_project_users_by_user(conn: &Connection, user_id: &str) -> Result<Vec<ProjectUser>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM project_users WHERE user_id = ?1 ORDER BY created_at, project_id",
            PROJECT_USER_COLS
        ),
        &[&user_id],
    )
}

pub fn count_project_users(conn: &Connection, project_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM project_users WHERE project_id = ?1 AND hidden = 0",
        params![project_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn delete_project_user(conn: &Connection, project_id: &str, user_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM project_users WHERE project_id = ?1 AND user_id = ?2",
        params![project_id, user_id],
    )?;
    Ok(deleted > 0)
}

pub fn delete_project_users(conn: &Connection, project_id: &str) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM project_users WHERE project_id = ?1",
        params![project_id],
    )?;
    Ok(deleted)
}

/// Remove a user from every project of one organization.
pub fn delete_project_users_in_organization(
    conn: &Connection,
    organization_id: &str,
    user_id: &str,
) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM project_users WHERE organization_id = ?1 AND user_id = ?2",
        params![organization_id, user_id],
    )?;
    Ok(deleted)
}

// ============ API Keys ============

pub fn create_api_key(conn: &Connection, key: &ApiKey) -> Result<()> {
    conn.execute(
        "INSERT INTO api_keys (id, tenant_id, organization_id, project_id, user_id, name, secret, encrypted_secret, is_service_account, excluded_from_rate_limiting, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &key.id,
            &key.tenant_id,
            &key.organization_id,
            &key.project_id,
            &key.user_id,
            &key.name,
            &key.secret,
            &key.encrypted_secret,
            key.is_service_account,
            key.excluded_from_rate_limiting,
            key.created_at
        ],
    )?;
    Ok(())
}

pub fn get_api_key(conn: &Connection, id: &str) -> Result<Option<ApiKey>> {
    query_one(
        conn,
        &format!("SELECT {} FROM api_keys WHERE id = ?1", API_KEY_COLS),
        &[&id],
    )
}

pub fn get_api_key_by_name_and_user(
    conn: &Connection,
    name: &str,
    user_id: &str,
) -> Result<Option<ApiKey>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM api_keys WHERE name = ?1 AND user_id = ?2",
            API_KEY_COLS
        ),
        &[&name, &user_id],
    )
}

pub fn list_api_keys_by_tenant(conn: &Connection, tenant_id: &str) -> Result<Vec<ApiKey>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM api_keys WHERE tenant_id = ?1 ORDER BY created_at, id",
            API_KEY_COLS
        ),
        &[&tenant_id],
    )
}

pub fn list_api_keys_by_project(conn: &Connection, project_id: &str) -> Result<Vec<ApiKey>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM api_keys WHERE project_id = ?1 ORDER BY created_at, id",
            API_KEY_COLS
        ),
        &[&project_id],
    )
}

pub fn list_all_api_keys(conn: &Connection) -> Result<Vec<ApiKey>> {
    query_all(
        conn,
        &format!("SELECT {} FROM api_keys ORDER BY created_at, id", API_KEY_COLS),
        &[],
    )
}

pub fn update_api_key_name(conn: &Connection, id: &str, name: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE api_keys SET name = ?1 WHERE id = ?2",
        params![name, id],
    )?;
    Ok(updated > 0)
}

pub fn delete_api_key(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM api_keys WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ============ Data Keys ============

pub fn get_data_key(conn: &Connection) -> Result<Option<Vec<u8>>> {
    let key = conn
        .query_row("SELECT encrypted_key FROM data_keys WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(key)
}

/// Fails with a uniqueness violation if a data key already exists.
pub fn create_data_key(conn: &Connection, encrypted_key: &[u8]) -> Result<()> {
    conn.execute(
        "INSERT INTO data_keys (id, encrypted_key, created_at) VALUES (1, ?1, ?2)",
        params![encrypted_key, now()],
    )?;
    Ok(())
}
