use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::UserSelf;
use crate::rbac::Caller;

/// The caller's internal id and every binding it holds in its tenant.
pub fn get_user_self(state: &AppState, caller: &Caller) -> Result<UserSelf> {
    let conn = state.db.get()?;
    let user = queries::get_user(&conn, &caller.user_id)?
        .ok_or_else(|| AppError::NotFound(format!("user {:?} not found", caller.user_id)))?;

    let mut organization_users = Vec::new();
    for binding in queries::list_organization_users_by_user(&conn, &user.user_id)? {
        if queries::get_organization_in_tenant(&conn, &binding.organization_id, &caller.tenant_id)?
            .is_some()
        {
            organization_users.push(binding);
        }
    }

    let mut project_users = Vec::new();
    for binding in queries::list_project_users_by_user(&conn, &user.user_id)? {
        if organization_users
            .iter()
            .any(|ou| ou.organization_id == binding.organization_id)
        {
            project_users.push(binding);
        }
    }

    Ok(UserSelf {
        user_id: user.user_id,
        internal_user_id: user.internal_user_id,
        organization_users,
        project_users,
    })
}
