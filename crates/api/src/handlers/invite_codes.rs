use actix_web::{web, HttpResponse};
use portal_domain::storage::InviteCodeStore;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

use super::{observe, ApiError, Endpoint};

#[derive(Debug, Deserialize, Serialize)]
pub struct AddInviteCodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GenerateRequest {
    pub count: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CheckResponse {
    pub code: String,
    pub valid: bool,
}

pub async fn check_invite_code_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let code = path.into_inner();
    let valid = state.storage().check_invite_code(&code).await;
    observe(
        Endpoint::CheckInviteCode,
        Ok(HttpResponse::Ok().json(CheckResponse { code, valid })),
    )
}

pub async fn list_invite_codes_handler(
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let codes = state.storage().list_invite_codes().await;
    observe(Endpoint::ListInviteCodes, Ok(HttpResponse::Ok().json(codes)))
}

pub async fn add_invite_code_handler(
    state: web::Data<AppState>,
    payload: web::Json<AddInviteCodeRequest>,
) -> Result<HttpResponse, ApiError> {
    observe(
        Endpoint::AddInviteCode,
        add_invite_code(&state, &payload.code).await,
    )
}

async fn add_invite_code(state: &AppState, code: &str) -> Result<HttpResponse, ApiError> {
    match state.storage().add_invite_code(code).await? {
        Some(created) => Ok(HttpResponse::Created().json(created)),
        None => Err(ApiError::Conflict(format!(
            "invite code `{code}` already exists"
        ))),
    }
}

pub async fn generate_invite_codes_handler(
    state: web::Data<AppState>,
    payload: web::Json<GenerateRequest>,
) -> Result<HttpResponse, ApiError> {
    observe(
        Endpoint::GenerateInviteCodes,
        generate_invite_codes(&state, payload.count).await,
    )
}

/// Batch sizes outside `1..=MAX_GENERATED_CODES` are rejected by storage and
/// answer 400.
async fn generate_invite_codes(state: &AppState, count: usize) -> Result<HttpResponse, ApiError> {
    let generated = state.storage().generate_invite_codes(count).await?;
    Ok(HttpResponse::Created().json(generated))
}

/// Used codes answer 409, unknown codes 404.
pub async fn delete_invite_code_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    observe(
        Endpoint::DeleteInviteCode,
        delete_invite_code(&state, &path).await,
    )
}

async fn delete_invite_code(state: &AppState, code: &str) -> Result<HttpResponse, ApiError> {
    if state.storage().delete_invite_code(code).await? {
        return Ok(HttpResponse::NoContent().finish());
    }
    let exists = state
        .storage()
        .list_invite_codes()
        .await
        .iter()
        .any(|existing| existing.code == code);
    if exists {
        Err(ApiError::Conflict(format!(
            "invite code `{code}` has been used and cannot be deleted"
        )))
    } else {
        Err(ApiError::NotFound("invite code"))
    }
}
