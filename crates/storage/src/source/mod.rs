//! Access to the remote config store. `ConfigSource` is the seam the cache
//! layer talks to; `HttpConfigClient` speaks the store's REST API and
//! `MemoryConfigSource` keeps everything in process.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

mod http;
mod memory;
mod types;

pub use http::HttpConfigClient;
pub use memory::MemoryConfigSource;
pub use types::{ConfigQuery, LoginResponse, PublishForm};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("config store rejected the access token (HTTP {0})")]
    Unauthorized(u16),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("publish was not accepted: {0}")]
    Rejected(String),
    #[error("login failed: {0}")]
    Login(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Returns `Ok(None)` when the data id does not exist.
    async fn fetch(&self, data_id: &str) -> Result<Option<Value>, SourceError>;

    /// Replaces the whole value stored under `data_id`.
    async fn publish(&self, data_id: &str, content: &str) -> Result<(), SourceError>;
}

/// Interprets a raw config body: empty means absent, JSON is parsed, anything
/// else is kept as a plain string.
pub fn parse_payload(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(body.to_string())))
}
