use std::str::FromStr;

use rusqlite::{Connection, OptionalExtension, Row, ToSql, types::Type};

use crate::error::Result;
use crate::models::*;

pub const USER_COLS: &str = "user_id, internal_user_id, created_at";

pub const ORGANIZATION_COLS: &str = "id, tenant_id, title, is_default, created_at";

pub const ORGANIZATION_USER_COLS: &str = "organization_id, user_id, role, hidden, created_at";

pub const PROJECT_COLS: &str =
    "id, organization_id, tenant_id, title, is_default, assignments, created_at";

pub const PROJECT_USER_COLS: &str =
    "project_id, organization_id, user_id, role, hidden, created_at";

pub const API_KEY_COLS: &str = "id, tenant_id, organization_id, project_id, user_id, name, secret, encrypted_secret, is_service_account, excluded_from_rate_limiting, created_at";

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

fn parse_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            user_id: row.get(0)?,
            internal_user_id: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

impl FromRow for Organization {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Organization {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            title: row.get(2)?,
            is_default: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for OrganizationUser {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrganizationUser {
            organization_id: row.get(0)?,
            user_id: row.get(1)?,
            role: parse_enum(row, 2)?,
            hidden: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for Project {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let raw: String = row.get(5)?;
        let assignments: Vec<ProjectAssignment> = serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
        Ok(Project {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            tenant_id: row.get(2)?,
            title: row.get(3)?,
            is_default: row.get(4)?,
            assignments,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for ProjectUser {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ProjectUser {
            project_id: row.get(0)?,
            organization_id: row.get(1)?,
            user_id: row.get(2)?,
            role: parse_enum(row, 3)?,
            hidden: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for ApiKey {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ApiKey {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            organization_id: row.get(2)?,
            project_id: row.get(3)?,
            user_id: row.get(4)?,
            name: row.get(5)?,
            secret: row.get(6)?,
            encrypted_secret: row.get(7)?,
            is_service_account: row.get(8)?,
            excluded_from_rate_limiting: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Option<T>> {
    let row = conn.query_row(sql, params, |row| T::from_row(row)).optional()?;
    Ok(row)
}

pub fn query_all<T: FromRow>(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
