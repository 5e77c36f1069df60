//! Per-user server inventories and the shared server catalog. On update the
//! id in the path wins over any id in the body.

use actix_web::{web, HttpResponse};
use portal_domain::model::ServerInfo;
use portal_domain::storage::{ServerCatalogStore, UserServerStore};

use crate::state::AppState;

use super::{observe, ApiError, Endpoint};

pub async fn list_user_servers_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let servers = state.storage().get_user_servers(&path).await;
    observe(Endpoint::ListUserServers, Ok(HttpResponse::Ok().json(servers)))
}

pub async fn add_user_server_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ServerInfo>,
) -> Result<HttpResponse, ApiError> {
    observe(
        Endpoint::AddUserServer,
        add_user_server(&state, &path, payload.into_inner()).await,
    )
}

async fn add_user_server(
    state: &AppState,
    username: &str,
    server: ServerInfo,
) -> Result<HttpResponse, ApiError> {
    let id = server.id.clone();
    if state
        .storage()
        .add_user_server(username, server.clone())
        .await?
    {
        Ok(HttpResponse::Created().json(server))
    } else {
        Err(ApiError::Conflict(format!(
            "server `{id}` already assigned to `{username}`"
        )))
    }
}

pub async fn update_user_server_handler(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    payload: web::Json<ServerInfo>,
) -> Result<HttpResponse, ApiError> {
    let (username, id) = path.into_inner();
    let server = ServerInfo {
        id,
        ..payload.into_inner()
    };
    let result = match state
        .storage()
        .update_user_server(&username, server.clone())
        .await
    {
        Ok(true) => Ok(HttpResponse::Ok().json(server)),
        Ok(false) => Err(ApiError::NotFound("server")),
        Err(err) => Err(err.into()),
    };
    observe(Endpoint::UpdateUserServer, result)
}

pub async fn remove_user_server_handler(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (username, id) = path.into_inner();
    let result = match state.storage().remove_user_server(&username, &id).await {
        Ok(true) => Ok(HttpResponse::NoContent().finish()),
        Ok(false) => Err(ApiError::NotFound("server")),
        Err(err) => Err(err.into()),
    };
    observe(Endpoint::RemoveUserServer, result)
}

pub async fn list_servers_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let servers = state.storage().list_servers().await;
    observe(Endpoint::ListServers, Ok(HttpResponse::Ok().json(servers)))
}

pub async fn add_server_handler(
    state: web::Data<AppState>,
    payload: web::Json<ServerInfo>,
) -> Result<HttpResponse, ApiError> {
    let server = payload.into_inner();
    let result = match state.storage().add_server(server.clone()).await {
        Ok(true) => Ok(HttpResponse::Created().json(server)),
        Ok(false) => Err(ApiError::Conflict(format!(
            "server `{}` already exists",
            server.id
        ))),
        Err(err) => Err(err.into()),
    };
    observe(Endpoint::AddServer, result)
}

pub async fn update_server_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ServerInfo>,
) -> Result<HttpResponse, ApiError> {
    let server = ServerInfo {
        id: path.into_inner(),
        ..payload.into_inner()
    };
    let result = match state.storage().update_server(server.clone()).await {
        Ok(true) => Ok(HttpResponse::Ok().json(server)),
        Ok(false) => Err(ApiError::NotFound("server")),
        Err(err) => Err(err.into()),
    };
    observe(Endpoint::UpdateServer, result)
}

pub async fn remove_server_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let result = match state.storage().remove_server(&path).await {
        Ok(true) => Ok(HttpResponse::NoContent().finish()),
        Ok(false) => Err(ApiError::NotFound("server")),
        Err(err) => Err(err.into()),
    };
    observe(Endpoint::RemoveServer, result)
}
