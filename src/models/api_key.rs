use serde::{Deserialize, Serialize};

use super::{OrganizationRole, ProjectRole};

/// Stored API key. Exactly one of `secret` / `encrypted_secret` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub tenant_id: String,
    pub organization_id: String,
    pub project_id: String,
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    #[serde(skip_serializing)]
    pub encrypted_secret: Option<Vec<u8>>,
    pub is_service_account: bool,
    pub excluded_from_rate_limiting: bool,
    pub created_at: i64,
}

/// Input for creating an API key. Organization and project come from the path.
#[derive(Debug, Default, Deserialize)]
pub struct CreateApiKey {
    pub name: String,
    #[serde(default)]
    pub is_service_account: bool,
    /// Required for service accounts; the role bound in the organization.
    #[serde(default)]
    pub role: Option<OrganizationRole>,
    #[serde(default)]
    pub excluded_from_rate_limiting: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateApiKey {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub update_mask: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRef {
    pub id: String,
    pub title: String,
}

/// API key as returned to callers, joined with titles and the owner's roles.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyView {
    pub id: String,
    pub name: String,
    /// Verbatim at creation and on the internal surface, obfuscated elsewhere.
    pub secret: String,
    pub created_at: i64,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub organization: ResourceRef,
    pub project: ResourceRef,
    pub organization_role: Option<OrganizationRole>,
    pub project_role: Option<ProjectRole>,
    pub is_service_account: bool,
    pub excluded_from_rate_limiting: bool,
}
