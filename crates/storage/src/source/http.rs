use std::time::Duration;

use async_trait::async_trait;
use portal_domain::config::{ConfigStoreConfig, Credentials};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use super::{parse_payload, ConfigQuery, ConfigSource, LoginResponse, PublishForm, SourceError};

/// Lifetime assumed when the login response carries no `tokenTtl`.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(18_000);
/// Tokens are renewed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// REST client for the config store (`/configs` and `/auth/login` under the
/// configured server URL).
#[derive(Debug)]
pub struct HttpConfigClient {
    http: Client,
    server_url: String,
    group: String,
    namespace: Option<String>,
    credentials: Option<Credentials>,
    token: Mutex<Option<AccessToken>>,
}

impl HttpConfigClient {
    pub fn new(config: &ConfigStoreConfig) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            server_url: config.server_url().to_string(),
            group: config.group().to_string(),
            namespace: config.namespace().map(str::to_string),
            credentials: config.credentials().cloned(),
            token: Mutex::new(None),
        })
    }

    fn configs_url(&self) -> String {
        format!("{}/configs", self.server_url)
    }

    fn login_url(&self) -> String {
        format!("{}/auth/login", self.server_url)
    }

    fn fetch_request(&self, data_id: &str, token: Option<&str>) -> RequestBuilder {
        self.http.get(self.configs_url()).query(&ConfigQuery {
            data_id,
            group: &self.group,
            tenant: self.namespace.as_deref(),
            access_token: token,
        })
    }

    fn publish_request(&self, data_id: &str, content: &str, token: Option<&str>) -> RequestBuilder {
        self.http.post(self.configs_url()).form(&PublishForm {
            data_id,
            group: &self.group,
            content,
            tenant: self.namespace.as_deref(),
            access_token: token,
        })
    }

    /// Returns a cached token, logging in first when none is held or the held
    /// one is about to expire. `None` when auth is disabled.
    async fn access_token(&self) -> Result<Option<String>, SourceError> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };

        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(Some(token.value.clone()));
        }

        let response = self
            .http
            .post(self.login_url())
            .form(&[
                ("username", credentials.username()),
                ("password", credentials.password()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Login(format!("HTTP {}", status.as_u16())));
        }
        let body: LoginResponse = response
            .json()
            .await
            .map_err(|err| SourceError::Login(err.to_string()))?;

        let ttl = body
            .token_ttl
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        debug!(ttl_secs = ttl.as_secs(), "obtained config store access token");
        let value = body.access_token;
        *guard = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + ttl.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        Ok(Some(value))
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    async fn check_auth(&self, status: StatusCode) -> Result<(), SourceError> {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), "config store refused access token");
            self.forget_token().await;
            return Err(SourceError::Unauthorized(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigSource for HttpConfigClient {
    async fn fetch(&self, data_id: &str) -> Result<Option<Value>, SourceError> {
        let token = self.access_token().await?;
        let response = self.fetch_request(data_id, token.as_deref()).send().await?;
        let status = response.status();
        self.check_auth(status).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        Ok(parse_payload(&body))
    }

    async fn publish(&self, data_id: &str, content: &str) -> Result<(), SourceError> {
        let token = self.access_token().await?;
        let response = self
            .publish_request(data_id, content, token.as_deref())
            .send()
            .await?;
        let status = response.status();
        self.check_auth(status).await?;

        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        if body.trim().eq_ignore_ascii_case("true") {
            Ok(())
        } else {
            Err(SourceError::Rejected(body.trim().to_string()))
        }
    }
}
