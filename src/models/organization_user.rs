use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OrganizationRole {
    Owner,
    Reader,
    /// Held only by service accounts provisioned for platform components.
    TenantSystem,
}

impl OrganizationRole {
    pub fn is_owner(&self) -> bool {
        matches!(self, OrganizationRole::Owner)
    }

    /// Organization owners act as owners of every project in the organization.
    pub fn has_implicit_project_access(&self) -> bool {
        self.is_owner()
    }

    /// Roles that can be granted through the public surface.
    pub fn is_assignable(&self) -> bool {
        matches!(self, OrganizationRole::Owner | OrganizationRole::Reader)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationUser {
    pub organization_id: String,
    pub user_id: String,
    pub role: OrganizationRole,
    #[serde(skip_serializing)]
    pub hidden: bool,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationUser {
    pub user_id: String,
    pub role: OrganizationRole,
}
