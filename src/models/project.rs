use serde::{Deserialize, Serialize};

/// A deployment target for the project's workloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAssignment {
    /// Empty means the assignment applies to every cluster.
    #[serde(default)]
    pub cluster_id: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub organization_id: String,
    pub tenant_id: String,
    pub title: String,
    pub is_default: bool,
    pub assignments: Vec<ProjectAssignment>,
    pub created_at: i64,
}

impl Project {
    /// Namespace of the first cluster-independent assignment.
    pub fn kubernetes_namespace(&self) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.cluster_id.is_empty())
            .map(|a| a.namespace.as_str())
    }
}

/// Either `kubernetes_namespace` or `assignments` must be given, not both.
#[derive(Debug, Default, Deserialize)]
pub struct CreateProject {
    pub title: String,
    #[serde(default)]
    pub kubernetes_namespace: Option<String>,
    #[serde(default)]
    pub assignments: Vec<ProjectAssignment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProject {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub update_mask: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub user_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectWithSummary {
    #[serde(flatten)]
    pub project: Project,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ProjectSummary>,
}
