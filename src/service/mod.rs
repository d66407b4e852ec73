//! Operations behind the public and internal surfaces.
//!
//! Each operation checks authorization and cross-entity invariants first,
//! then applies every row change inside a single IMMEDIATE transaction.
//! Multi-step builders (`*_in_tx`) take an open transaction and never commit.

pub mod api_keys;
pub mod bootstrap;
pub mod data_key;
pub mod internal;
pub mod organizations;
pub mod projects;
pub mod users;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{Organization, Project};
use crate::rbac::Caller;

pub(crate) fn begin(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// Organizations outside the caller's tenant are reported as absent.
pub(crate) fn organization_in_tenant(
    conn: &Connection,
    caller: &Caller,
    organization_id: &str,
) -> Result<Organization> {
    if organization_id.is_empty() {
        return Err(AppError::BadRequest("organization id is required".into()));
    }
    queries::get_organization_in_tenant(conn, organization_id, &caller.tenant_id)?
        .ok_or_else(|| AppError::NotFound(format!("organization {:?} not found", organization_id)))
}

pub(crate) fn project_in_organization(
    conn: &Connection,
    caller: &Caller,
    organization_id: &str,
    project_id: &str,
) -> Result<Project> {
    if organization_id.is_empty() {
        return Err(AppError::BadRequest("organization id is required".into()));
    }
    if project_id.is_empty() {
        return Err(AppError::BadRequest("project id is required".into()));
    }
    queries::get_project_in_organization(conn, project_id, organization_id, &caller.tenant_id)?
        .ok_or_else(|| AppError::NotFound(format!("project {:?} not found", project_id)))
}

pub(crate) fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    Ok(value)
}
