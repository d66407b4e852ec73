//! Role resolution and authorization guards.
//!
//! Callers with no relationship to a resource get `NotFound`, never
//! `Forbidden`, so existence is not confirmed to outsiders. Organization
//! owners are treated as owners of every project in the organization
//! without needing a project binding.

use rusqlite::Connection;
use strum::{AsRefStr, EnumString};

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{OrganizationRole, ProjectRole};

/// Identity used for every call when authorization is disabled.
pub const DEFAULT_USER_ID: &str = "defaultUser";
pub const DEFAULT_TENANT_ID: &str = "default-tenant-id";

/// Authenticated identity of the caller, supplied by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub tenant_id: String,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
        }
    }

    pub fn pseudo() -> Self {
        Self::new(DEFAULT_USER_ID, DEFAULT_TENANT_ID)
    }
}

/// Who may create new organizations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, EnumString)]
pub enum OrgCreationPolicy {
    /// Owners of the tenant's default organization.
    #[default]
    #[strum(serialize = "default-org-owner")]
    DefaultOrganizationOwner,
    #[strum(serialize = "any")]
    Anyone,
}

// ============ Role Resolution ============

/// `None` when the user has no binding in the organization.
pub fn organization_role(
    conn: &Connection,
    organization_id: &str,
    user_id: &str,
) -> Result<Option<OrganizationRole>> {
    Ok(queries::get_organization_user(conn, organization_id, user_id)?.map(|ou| ou.role))
}

/// `None` when the user has no explicit binding in the project.
pub fn project_role(conn: &Connection, project_id: &str, user_id: &str) -> Result<Option<ProjectRole>> {
    Ok(queries::get_project_user(conn, project_id, user_id)?.map(|pu| pu.role))
}

fn organization_not_found(organization_id: &str) -> AppError {
    AppError::NotFound(format!("organization {:?} not found", organization_id))
}

fn project_not_found(project_id: &str) -> AppError {
    AppError::NotFound(format!("project {:?} not found", project_id))
}

// ============ Guards ============

#[derive(Debug, Clone, Copy)]
pub struct Authorizer {
    enabled: bool,
    org_creation: OrgCreationPolicy,
}

impl Authorizer {
    pub fn new(enabled: bool, org_creation: OrgCreationPolicy) -> Self {
        Self {
            enabled,
            org_creation,
        }
    }

    /// Trusted mode: every guard passes and lists are not filtered.
    pub fn disabled() -> Self {
        Self::new(false, OrgCreationPolicy::Anyone)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn organization_role(
        &self,
        conn: &Connection,
        organization_id: &str,
        user_id: &str,
    ) -> Result<Option<OrganizationRole>> {
        if !self.enabled {
            return Ok(Some(OrganizationRole::Owner));
        }
        organization_role(conn, organization_id, user_id)
    }

    pub fn project_role(
        &self,
        conn: &Connection,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<ProjectRole>> {
        if !self.enabled {
            return Ok(Some(ProjectRole::Owner));
        }
        project_role(conn, project_id, user_id)
    }

    pub fn validate_organization_owner(
        &self,
        conn: &Connection,
        organization_id: &str,
        user_id: &str,
    ) -> Result<()> {
        match self.organization_role(conn, organization_id, user_id)? {
            Some(OrganizationRole::Owner) => Ok(()),
            None => Err(organization_not_found(organization_id)),
            Some(_) => Err(AppError::Forbidden(format!(
                "user {:?} is not an owner of organization {:?}",
                user_id, organization_id
            ))),
        }
    }

    /// Any role in the organization makes it visible.
    pub fn validate_organization_member(
        &self,
        conn: &Connection,
        organization_id: &str,
        user_id: &str,
    ) -> Result<OrganizationRole> {
        self.organization_role(conn, organization_id, user_id)?
            .ok_or_else(|| organization_not_found(organization_id))
    }

    fn is_organization_owner(
        &self,
        conn: &Connection,
        organization_id: &str,
        user_id: &str,
    ) -> Result<bool> {
        Ok(self
            .organization_role(conn, organization_id, user_id)?
            .is_some_and(|role| role.has_implicit_project_access()))
    }

    pub fn validate_project_owner(
        &self,
        conn: &Connection,
        project_id: &str,
        organization_id: &str,
        user_id: &str,
    ) -> Result<()> {
        if self.is_organization_owner(conn, organization_id, user_id)? {
            return Ok(());
        }
        match self.project_role(conn, project_id, user_id)? {
            Some(ProjectRole::Owner) => Ok(()),
            Some(ProjectRole::Member) => Err(AppError::Forbidden(format!(
                "user {:?} is not an owner of project {:?}",
                user_id, project_id
            ))),
            None => Err(project_not_found(project_id)),
        }
    }

    pub fn validate_project_member(
        &self,
        conn: &Connection,
        project_id: &str,
        organization_id: &str,
        user_id: &str,
    ) -> Result<()> {
        if self.is_organization_owner(conn, organization_id, user_id)? {
            return Ok(());
        }
        match self.project_role(conn, project_id, user_id)? {
            Some(_) => Ok(()),
            None => Err(project_not_found(project_id)),
        }
    }

    pub fn is_project_owner(
        &self,
        conn: &Connection,
        project_id: &str,
        organization_id: &str,
        user_id: &str,
    ) -> Result<bool> {
        if self.is_organization_owner(conn, organization_id, user_id)? {
            return Ok(true);
        }
        Ok(self
            .project_role(conn, project_id, user_id)?
            .is_some_and(|role| role.is_owner()))
    }

    pub fn is_project_member(
        &self,
        conn: &Connection,
        project_id: &str,
        organization_id: &str,
        user_id: &str,
    ) -> Result<bool> {
        match self.validate_project_member(conn, project_id, organization_id, user_id) {
            Ok(()) => Ok(true),
            Err(AppError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Policy gate for creating organizations in the caller's tenant.
    pub fn validate_organization_creation(&self, conn: &Connection, user_id: &str, tenant_id: &str) -> Result<()> {
        if !self.enabled || self.org_creation == OrgCreationPolicy::Anyone {
            return Ok(());
        }
        let allowed = match queries::get_default_organization(conn, tenant_id)? {
            Some(org) => organization_role(conn, &org.id, user_id)?.is_some_and(|r| r.is_owner()),
            None => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "user {:?} is not allowed to create organizations",
                user_id
            )))
        }
    }
}
