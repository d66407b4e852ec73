use axum::{Json, extract::State};

use crate::db::AppState;
use crate::error::Result;
use crate::models::UserSelf;
use crate::rbac::Caller;
use crate::service::users;

pub async fn get_user_self(State(state): State<AppState>, caller: Caller) -> Result<Json<UserSelf>> {
    Ok(Json(users::get_user_self(&state, &caller)?))
}
