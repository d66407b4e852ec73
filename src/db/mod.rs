mod from_row;
pub mod queries;

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::crypto::DataKey;
use crate::error::Result;
use crate::rbac::Authorizer;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared state handed to every operation.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub auth: Authorizer,
    /// Present when envelope encryption is enabled. Immutable after boot.
    pub data_key: Option<DataKey>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
    });
    let pool = Pool::builder().max_size(8).build(manager)?;
    Ok(pool)
}

/// Create tables if they do not exist yet.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            internal_user_id TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            title TEXT NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            UNIQUE (tenant_id, title)
        );

        CREATE TABLE IF NOT EXISTS organization_users (
            organization_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL,
            hidden INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (organization_id, user_id)
        );
        CREATE INDEX IF NOT EXISTS idx_organization_users_user ON organization_users(user_id);

        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            tenant_id TEXT NOT NULL,
            title TEXT NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            assignments TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            UNIQUE (tenant_id, title)
        );
        CREATE INDEX IF NOT EXISTS idx_projects_organization ON projects(organization_id);

        CREATE TABLE IF NOT EXISTS project_users (
            project_id TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL,
            hidden INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (project_id, user_id)
        );
        CREATE INDEX IF NOT EXISTS idx_project_users_org_user ON project_users(organization_id, user_id);

        CREATE TABLE IF NOT EXISTS api_keys (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            project_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            secret TEXT,
            encrypted_secret BLOB,
            is_service_account INTEGER NOT NULL DEFAULT 0,
            excluded_from_rate_limiting INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            UNIQUE (user_id, name),
            CHECK ((secret IS NULL) <> (encrypted_secret IS NULL))
        );
        CREATE INDEX IF NOT EXISTS idx_api_keys_tenant ON api_keys(tenant_id);
        CREATE INDEX IF NOT EXISTS idx_api_keys_project ON api_keys(project_id);

        -- At most one data key per deployment.
        CREATE TABLE IF NOT EXISTS data_keys (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            encrypted_key BLOB NOT NULL,
            created_at INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}
