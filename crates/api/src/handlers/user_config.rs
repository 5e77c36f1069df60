use actix_web::{web, HttpResponse};
use portal_domain::storage::UserConfigStore;
use serde_json::{Map, Value};

use crate::state::AppState;

use super::{observe, ApiError, Endpoint};

pub async fn get_user_config_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let result = match state.storage().get_user_config(&path).await {
        Some(config) => Ok(HttpResponse::Ok().json(config)),
        None => Err(ApiError::NotFound("user config")),
    };
    observe(Endpoint::GetUserConfig, result)
}

/// The body replaces the stored settings object.
pub async fn put_user_config_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, ApiError> {
    let result = state
        .storage()
        .save_user_config(&path, payload.into_inner())
        .await
        .map(|saved| HttpResponse::Ok().json(saved))
        .map_err(ApiError::from);
    observe(Endpoint::PutUserConfig, result)
}
