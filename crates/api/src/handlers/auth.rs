use actix_web::{web, HttpResponse};
use portal_domain::model::NewUser;
use portal_domain::storage::UserStore;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

use super::{observe, users::UserView, ApiError, Endpoint};

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    /// Username, email or phone number.
    #[serde(alias = "identifier")]
    pub username: String,
    pub password: String,
}

pub async fn register_handler(
    state: web::Data<AppState>,
    payload: web::Json<NewUser>,
) -> Result<HttpResponse, ApiError> {
    observe(Endpoint::Register, register(&state, payload.into_inner()).await)
}

async fn register(state: &AppState, new_user: NewUser) -> Result<HttpResponse, ApiError> {
    let user = state.storage().register_user(new_user).await?;
    Ok(HttpResponse::Created().json(UserView::from(user)))
}

pub async fn login_handler(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let result = match state
        .storage()
        .authenticate(&payload.username, &payload.password)
        .await
    {
        Some(user) => Ok(HttpResponse::Ok().json(UserView::from(user))),
        None => Err(ApiError::Unauthorized),
    };
    observe(Endpoint::Login, result)
}
