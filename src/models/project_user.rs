use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Member,
}

impl ProjectRole {
    pub fn is_owner(&self) -> bool {
        matches!(self, ProjectRole::Owner)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectUser {
    pub project_id: String,
    pub organization_id: String,
    pub user_id: String,
    pub role: ProjectRole,
    #[serde(skip_serializing)]
    pub hidden: bool,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectUser {
    pub user_id: String,
    pub role: ProjectRole,
}
