use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub tenant_id: String,
    pub title: String,
    /// Default organizations are provisioned at bootstrap and can never be deleted.
    pub is_default: bool,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrganization {
    pub title: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSummary {
    pub project_count: i64,
    /// Zero unless the caller owns the organization.
    pub user_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationWithSummary {
    #[serde(flatten)]
    pub organization: Organization,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<OrganizationSummary>,
}
