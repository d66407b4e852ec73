#![allow(dead_code)]

use std::sync::Mutex;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use tempfile::TempDir;

use tenancy::crypto::DataKey;
use tenancy::db::{self, AppState};
use tenancy::error::{AppError, Result};
use tenancy::kms::KeyManagementClient;
use tenancy::models::*;
use tenancy::rbac::{Authorizer, Caller, OrgCreationPolicy};
use tenancy::service::{organizations, projects};

pub const TENANT: &str = "tenant-1";
pub const OTHER_TENANT: &str = "tenant-2";

/// Service state over a throwaway file-backed database.
pub struct TestEnv {
    pub state: AppState,
    _dir: TempDir,
}

impl TestEnv {
    pub fn conn(&self) -> PooledConnection<SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }
}

pub fn setup_with(auth: Authorizer, data_key: Option<DataKey>) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let pool = db::create_pool(path.to_str().unwrap()).unwrap();
    db::init_db(&pool.get().unwrap()).unwrap();

    TestEnv {
        state: AppState {
            db: pool,
            auth,
            data_key,
        },
        _dir: dir,
    }
}

/// Authorization on, anyone may create organizations, secrets in plaintext.
pub fn setup() -> TestEnv {
    setup_with(Authorizer::new(true, OrgCreationPolicy::Anyone), None)
}

pub fn setup_encrypted() -> TestEnv {
    setup_with(
        Authorizer::new(true, OrgCreationPolicy::Anyone),
        Some(DataKey::generate()),
    )
}

pub fn caller(user_id: &str) -> Caller {
    Caller::new(user_id, TENANT)
}

pub fn create_org(env: &TestEnv, owner: &str, title: &str) -> Organization {
    organizations::create_organization(
        &env.state,
        &caller(owner),
        &CreateOrganization {
            title: title.to_string(),
        },
    )
    .unwrap()
}

pub fn create_project(env: &TestEnv, owner: &str, org_id: &str, title: &str, namespace: &str) -> Project {
    projects::create_project(
        &env.state,
        &caller(owner),
        org_id,
        &CreateProject {
            title: title.to_string(),
            kubernetes_namespace: Some(namespace.to_string()),
            assignments: vec![],
        },
    )
    .unwrap()
}

pub fn add_org_user(env: &TestEnv, owner: &str, org_id: &str, user_id: &str, role: OrganizationRole) {
    organizations::create_organization_user(
        &env.state,
        &caller(owner),
        org_id,
        &CreateOrganizationUser {
            user_id: user_id.to_string(),
            role,
        },
    )
    .unwrap();
}

pub fn add_project_user(
    env: &TestEnv,
    owner: &str,
    org_id: &str,
    project_id: &str,
    user_id: &str,
    role: ProjectRole,
) {
    projects::create_project_user(
        &env.state,
        &caller(owner),
        org_id,
        project_id,
        &CreateProjectUser {
            user_id: user_id.to_string(),
            role,
        },
    )
    .unwrap();
}

/// Organization "Acme" owned by alice with project "Core" in namespace "core".
pub fn acme(env: &TestEnv) -> (Organization, Project) {
    let org = create_org(env, "alice", "Acme");
    let project = create_project(env, "alice", &org.id, "Core", "core");
    (org, project)
}

/// KMS double that fails the first `failures` unwrap calls.
pub struct FlakyKms {
    remaining_failures: Mutex<u32>,
    pub decrypt_calls: Mutex<u32>,
    pub create_calls: Mutex<u32>,
}

impl FlakyKms {
    pub fn new(failures: u32) -> Self {
        Self {
            remaining_failures: Mutex::new(failures),
            decrypt_calls: Mutex::new(0),
            create_calls: Mutex::new(0),
        }
    }
}

impl KeyManagementClient for FlakyKms {
    fn create_data_key(&self) -> Result<(DataKey, Vec<u8>)> {
        *self.create_calls.lock().unwrap() += 1;
        let key = DataKey::from_bytes(&[42u8; 32])?;
        Ok((key, b"wrapped-key".to_vec()))
    }

    fn decrypt_data_key(&self, encrypted: &[u8]) -> Result<DataKey> {
        *self.decrypt_calls.lock().unwrap() += 1;
        let mut remaining = self.remaining_failures.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(AppError::Kms("transient KMS failure".into()));
        }
        assert_eq!(encrypted, b"wrapped-key");
        DataKey::from_bytes(&[42u8; 32])
    }
}
