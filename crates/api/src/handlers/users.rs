use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use portal_domain::model::{CascadeStep, Role, User, UserUpdate};
use portal_domain::storage::UserStore;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

use super::{observe, ApiError, Endpoint};

/// A user as returned over HTTP. The stored password is never echoed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub role: Role,
    pub invite_code: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            phone: user.phone,
            created_at: user.created_at,
            role: user.role,
            invite_code: user.invite_code,
        }
    }
}

pub async fn list_users_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let users: Vec<UserView> = state
        .storage()
        .list_users()
        .await
        .into_iter()
        .map(UserView::from)
        .collect();
    observe(Endpoint::ListUsers, Ok(HttpResponse::Ok().json(users)))
}

pub async fn get_user_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let result = match state.storage().find_user(&path).await {
        Some(user) => Ok(HttpResponse::Ok().json(UserView::from(user))),
        None => Err(ApiError::NotFound("user")),
    };
    observe(Endpoint::GetUser, result)
}

pub async fn patch_user_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UserUpdate>,
) -> Result<HttpResponse, ApiError> {
    observe(
        Endpoint::PatchUser,
        patch_user(&state, &path, payload.into_inner()).await,
    )
}

async fn patch_user(
    state: &AppState,
    username: &str,
    update: UserUpdate,
) -> Result<HttpResponse, ApiError> {
    let updated = state
        .storage()
        .update_user(username, update)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(HttpResponse::Ok().json(UserView::from(updated)))
}

/// Responds with the per-collection report. A partial failure answers 503
/// with the same body so the caller can see which collections still hold
/// the user.
pub async fn delete_user_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let report = state.storage().delete_user(&path).await;
    let result = if !report.is_complete() {
        Ok(HttpResponse::ServiceUnavailable().json(report))
    } else if report.user == CascadeStep::Absent {
        Err(ApiError::NotFound("user"))
    } else {
        Ok(HttpResponse::Ok().json(report))
    };
    observe(Endpoint::DeleteUser, result)
}
