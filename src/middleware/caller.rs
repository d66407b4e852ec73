use axum::{extract::FromRequestParts, http::request::Parts};

use crate::db::AppState;
use crate::error::AppError;
use crate::rbac::Caller;
use crate::util::{extract_header, normalize_user_id};

/// Headers set by the upstream authentication layer.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        if !state.auth.is_enabled() {
            return Ok(Caller::pseudo());
        }

        let user_id = extract_header(&parts.headers, USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing caller user id".into()))?;
        let tenant_id = extract_header(&parts.headers, TENANT_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing caller tenant id".into()))?;

        Ok(Caller::new(normalize_user_id(user_id), tenant_id))
    }
}
