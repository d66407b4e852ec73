use serde::{Deserialize, Serialize};

use super::{OrganizationUser, ProjectUser};

/// Maps an external (normalized) user id to an opaque internal id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub internal_user_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSelf {
    pub user_id: String,
    pub internal_user_id: String,
    pub organization_users: Vec<OrganizationUser>,
    pub project_users: Vec<ProjectUser>,
}

/// Attach an external identity to the organization and project matched by
/// (tenant, title, namespace), creating both when no organization matches.
#[derive(Debug, Deserialize)]
pub struct CreateUserInternal {
    pub tenant_id: String,
    pub title: String,
    pub user_id: String,
    pub kubernetes_namespace: String,
}
