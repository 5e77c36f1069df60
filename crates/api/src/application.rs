#[cfg(unix)]
use std::{fs, path::Path};

use actix_web::{middleware::Logger, web, App, HttpServer};
use portal_domain::config::{ApiConfig, ConfigError, ConfigStoreConfig};
use portal_domain::services::telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
use portal_storage::{ConfigStorage, SourceError};
use thiserror::Error;
use tracing::info;

use crate::{
    handlers::{admin_routes, public_routes},
    state::AppState,
};

pub async fn run() -> Result<(), BootstrapError> {
    let config = ApiConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("API");
    let telemetry = init_telemetry(&telemetry_config)?;

    let store_config = ConfigStoreConfig::load_from_env()?;
    let storage = ConfigStorage::connect(&store_config)?;
    info!(
        server = store_config.server_url(),
        namespace = store_config.namespace().unwrap_or("public"),
        group = store_config.group(),
        cache_ttl_ms = store_config.cache_ttl().as_millis() as u64,
        "config store client ready"
    );

    let state = AppState::new(storage, telemetry);

    // Without an internal listener the admin routes share the public one.
    let admin_on_public = !config.has_internal_listener();

    let public_state = state.clone();
    let mut public_server = HttpServer::new(move || {
        let app = App::new()
            .app_data(web::Data::new(public_state.clone()))
            .wrap(Logger::default())
            .configure(public_routes);
        if admin_on_public {
            app.configure(admin_routes)
        } else {
            app
        }
    });

    #[cfg(unix)]
    {
        if let Some(socket) = config.api_unix_socket() {
            cleanup_socket(socket)?;
            public_server = public_server.bind_uds(socket)?;
        } else {
            public_server = public_server.bind(config.api_bind_address())?;
        }
    }

    #[cfg(not(unix))]
    {
        if let Some(socket) = config.api_unix_socket() {
            return Err(BootstrapError::Io(std::io::Error::other(format!(
                "unix socket '{socket}' requested but this platform does not support it"
            ))));
        }
        public_server = public_server.bind(config.api_bind_address())?;
    }

    info!(
        bind = config.api_unix_socket().unwrap_or(config.api_bind_address()),
        admin_on_public, "public listener bound"
    );
    let public_server = public_server.run();

    let internal_server = if config.has_internal_listener() {
        let internal_state = state.clone();
        let mut internal_server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(internal_state.clone()))
                .wrap(Logger::default())
                .configure(admin_routes)
        });

        #[cfg(unix)]
        {
            if let Some(socket) = config.internal_unix_socket() {
                cleanup_socket(socket)?;
                internal_server = internal_server.bind_uds(socket)?;
            } else if let Some(addr) = config.internal_bind_address() {
                internal_server = internal_server.bind(addr)?;
            } else {
                return Err(BootstrapError::Io(std::io::Error::other(
                    "internal listener configured but no bind target provided",
                )));
            }
        }

        #[cfg(not(unix))]
        {
            if let Some(socket) = config.internal_unix_socket() {
                return Err(BootstrapError::Io(std::io::Error::other(format!(
                    "internal unix socket '{socket}' requested but this platform does not support it"
                ))));
            }
            if let Some(addr) = config.internal_bind_address() {
                internal_server = internal_server.bind(addr)?;
            } else {
                return Err(BootstrapError::Io(std::io::Error::other(
                    "internal listener configured but no bind target provided",
                )));
            }
        }

        Some(internal_server.run())
    } else {
        None
    };

    if let Some(internal) = internal_server {
        tokio::try_join!(public_server, internal)?;
    } else {
        public_server.await?;
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("config store client error: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Removes a socket file left behind by an unclean shutdown.
#[cfg(unix)]
fn cleanup_socket(path: &str) -> std::io::Result<()> {
    let socket_path = Path::new(path);
    if socket_path.exists() {
        fs::remove_file(socket_path)?;
    }
    Ok(())
}
