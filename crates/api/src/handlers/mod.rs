pub mod auth;
pub mod invite_codes;
pub mod metrics;
pub mod servers;
pub mod user_config;
pub mod users;

pub use auth::{login_handler, register_handler};
pub use invite_codes::{
    add_invite_code_handler, check_invite_code_handler, delete_invite_code_handler,
    generate_invite_codes_handler, list_invite_codes_handler,
};
pub use metrics::metrics_handler;
pub use servers::{
    add_server_handler, add_user_server_handler, list_servers_handler,
    list_user_servers_handler, remove_server_handler, remove_user_server_handler,
    update_server_handler, update_user_server_handler,
};
pub use user_config::{get_user_config_handler, put_user_config_handler};
pub use users::{delete_user_handler, get_user_handler, list_users_handler, patch_user_handler};

use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use ::metrics::counter;
use serde::Serialize;
use strum_macros::AsRefStr;
use thiserror::Error;

use portal_domain::model::ValidationError;
use portal_domain::storage::{RegistrationError, StorageError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("invalid credentials")]
    Unauthorized,
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Registration(err) => match err {
                RegistrationError::Invalid(_) | RegistrationError::InviteCodeUnavailable => {
                    StatusCode::BAD_REQUEST
                }
                RegistrationError::UsernameTaken
                | RegistrationError::EmailTaken
                | RegistrationError::PhoneTaken => StatusCode::CONFLICT,
                RegistrationError::Storage(err) => storage_status(err),
            },
            ApiError::Storage(err) => storage_status(err),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::Unavailable { .. } | StorageError::Unconfirmed { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        StorageError::Invalid(_) => StatusCode::BAD_REQUEST,
        StorageError::Malformed { .. } | StorageError::Random(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Label values for `api_requests_total`.
#[derive(Debug, Clone, Copy, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Endpoint {
    Register,
    Login,
    CheckInviteCode,
    ListInviteCodes,
    AddInviteCode,
    GenerateInviteCodes,
    DeleteInviteCode,
    ListUsers,
    GetUser,
    PatchUser,
    DeleteUser,
    GetUserConfig,
    PutUserConfig,
    ListUserServers,
    AddUserServer,
    UpdateUserServer,
    RemoveUserServer,
    ListServers,
    AddServer,
    UpdateServer,
    RemoveServer,
}

/// Counts the request under its endpoint and final HTTP status.
pub(crate) fn observe(
    endpoint: Endpoint,
    result: Result<HttpResponse, ApiError>,
) -> Result<HttpResponse, ApiError> {
    let status = match &result {
        Ok(response) => response.status(),
        Err(err) => err.status_code(),
    };
    counter!(
        "api_requests_total",
        "endpoint" => endpoint.as_ref().to_owned(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    result
}

/// Routes reachable by portal users.
pub fn public_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/register", web::post().to(register_handler))
        .route("/api/v1/login", web::post().to(login_handler))
        .route(
            "/api/v1/invite-codes/{code}/check",
            web::get().to(check_invite_code_handler),
        );
}

/// Administrative routes. Served on the internal listener when one is
/// configured.
pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler))
        .service(
            web::resource("/api/v1/invite-codes")
                .route(web::get().to(list_invite_codes_handler))
                .route(web::post().to(add_invite_code_handler)),
        )
        .route(
            "/api/v1/invite-code-batches",
            web::post().to(generate_invite_codes_handler),
        )
        .route(
            "/api/v1/invite-codes/{code}",
            web::delete().to(delete_invite_code_handler),
        )
        .route("/api/v1/users", web::get().to(list_users_handler))
        .service(
            web::resource("/api/v1/users/{username}")
                .route(web::get().to(get_user_handler))
                .route(web::patch().to(patch_user_handler))
                .route(web::delete().to(delete_user_handler)),
        )
        .service(
            web::resource("/api/v1/users/{username}/config")
                .route(web::get().to(get_user_config_handler))
                .route(web::put().to(put_user_config_handler)),
        )
        .service(
            web::resource("/api/v1/users/{username}/servers")
                .route(web::get().to(list_user_servers_handler))
                .route(web::post().to(add_user_server_handler)),
        )
        .service(
            web::resource("/api/v1/users/{username}/servers/{id}")
                .route(web::put().to(update_user_server_handler))
                .route(web::delete().to(remove_user_server_handler)),
        )
        .service(
            web::resource("/api/v1/servers")
                .route(web::get().to(list_servers_handler))
                .route(web::post().to(add_server_handler)),
        )
        .service(
            web::resource("/api/v1/servers/{id}")
                .route(web::put().to(update_server_handler))
                .route(web::delete().to(remove_server_handler)),
        );
}
