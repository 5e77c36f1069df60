//! Environment-driven configuration structures shared by all binaries.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::services::retry::RetryPolicy;

pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(60_000);
pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_millis(2_000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

/// HTTP listener configuration. The internal listener, when present, carries
/// the admin routes and `/metrics`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    api_bind_address: String,
    api_unix_socket: Option<String>,
    internal_bind_address: Option<String>,
    internal_unix_socket: Option<String>,
}

impl ApiConfig {
    /// Loads only the environment variables required by the API binary.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            api_bind_address: get_required_var("API_BIND_ADDRESS")?,
            api_unix_socket: get_optional_var("API_UNIX_SOCKET"),
            internal_bind_address: get_optional_var("API_INTERNAL_BIND_ADDRESS"),
            internal_unix_socket: get_optional_var("API_INTERNAL_UNIX_SOCKET"),
        })
    }

    pub fn api_bind_address(&self) -> &str {
        &self.api_bind_address
    }

    pub fn api_unix_socket(&self) -> Option<&str> {
        self.api_unix_socket.as_deref()
    }

    pub fn internal_bind_address(&self) -> Option<&str> {
        self.internal_bind_address.as_deref()
    }

    pub fn internal_unix_socket(&self) -> Option<&str> {
        self.internal_unix_socket.as_deref()
    }

    pub fn has_internal_listener(&self) -> bool {
        self.internal_bind_address.is_some() || self.internal_unix_socket.is_some()
    }
}

/// Credentials used against the config store's login endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection and caching knobs for the config store. Read once at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStoreConfig {
    server_url: String,
    namespace: Option<String>,
    group: String,
    credentials: Option<Credentials>,
    cache_ttl: Duration,
    retry: RetryPolicy,
    verify_delay: Duration,
    request_timeout: Duration,
}

impl ConfigStoreConfig {
    /// Hydrates `.env` (if present) and reads the `CONFIG_STORE_*` variables.
    /// Credentials are only required when `CONFIG_STORE_AUTH_ENABLED` is set.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let server_url = get_required_var("CONFIG_STORE_SERVER_URL")?
            .trim_end_matches('/')
            .to_string();
        let credentials = if get_bool_var("CONFIG_STORE_AUTH_ENABLED")? {
            Some(Credentials::new(
                get_required_var("CONFIG_STORE_USERNAME")?,
                get_required_var("CONFIG_STORE_PASSWORD")?,
            ))
        } else {
            None
        };
        let retry = RetryPolicy::new(
            get_u32_var("CONFIG_STORE_RETRY_ATTEMPTS")?.unwrap_or(3),
            get_millis_var("CONFIG_STORE_RETRY_DELAY_MS")?.unwrap_or(Duration::from_secs(1)),
        );

        Ok(Self {
            server_url,
            namespace: get_optional_var("CONFIG_STORE_NAMESPACE"),
            group: get_optional_var("CONFIG_STORE_GROUP").unwrap_or_else(|| DEFAULT_GROUP.into()),
            credentials,
            cache_ttl: get_millis_var("CONFIG_STORE_CACHE_TTL_MS")?.unwrap_or(DEFAULT_CACHE_TTL),
            retry,
            verify_delay: get_millis_var("CONFIG_STORE_VERIFY_DELAY_MS")?
                .unwrap_or(DEFAULT_VERIFY_DELAY),
            request_timeout: get_millis_var("CONFIG_STORE_TIMEOUT_MS")?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }

    /// Builds a configuration with defaults for everything but the server URL.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            namespace: None,
            group: DEFAULT_GROUP.into(),
            credentials: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            retry: RetryPolicy::default(),
            verify_delay: DEFAULT_VERIFY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn auth_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn verify_delay(&self) -> Duration {
        self.verify_delay
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    get_optional_var(key).ok_or(ConfigError::MissingVar { key })
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_number_var(key: &'static str) -> Result<Option<u64>, ConfigError> {
    get_optional_var(key)
        .map(|raw| {
            raw.parse()
                .map_err(|source| ConfigError::InvalidNumber { key, source })
        })
        .transpose()
}

fn get_u32_var(key: &'static str) -> Result<Option<u32>, ConfigError> {
    get_number_var(key)?
        .map(|value| u32::try_from(value).map_err(|_| ConfigError::OutOfRange { key, value }))
        .transpose()
}

fn get_millis_var(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(get_number_var(key)?.map(Duration::from_millis))
}

fn get_bool_var(key: &'static str) -> Result<bool, ConfigError> {
    match get_optional_var(key) {
        None => Ok(false),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { key, value: raw }),
        },
    }
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("PORTAL_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("`{key}` value {value} is out of range")]
    OutOfRange { key: &'static str, value: u64 },
    #[error("invalid boolean `{value}` in `{key}`")]
    InvalidBool { key: &'static str, value: String },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    const STORE_VARS: &[&str] = &[
        "CONFIG_STORE_NAMESPACE",
        "CONFIG_STORE_GROUP",
        "CONFIG_STORE_AUTH_ENABLED",
        "CONFIG_STORE_USERNAME",
        "CONFIG_STORE_PASSWORD",
        "CONFIG_STORE_CACHE_TTL_MS",
        "CONFIG_STORE_RETRY_ATTEMPTS",
        "CONFIG_STORE_RETRY_DELAY_MS",
        "CONFIG_STORE_VERIFY_DELAY_MS",
        "CONFIG_STORE_TIMEOUT_MS",
    ];

    fn set_env() {
        std::env::set_var("PORTAL_SKIP_DOTENV", "1");
        std::env::set_var("CONFIG_STORE_SERVER_URL", "http://127.0.0.1:8848/nacos/v1/");
        std::env::set_var("API_BIND_ADDRESS", "127.0.0.1:8080");
        std::env::remove_var("API_UNIX_SOCKET");
        std::env::remove_var("API_INTERNAL_BIND_ADDRESS");
        std::env::remove_var("API_INTERNAL_UNIX_SOCKET");
        for key in STORE_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn store_config_uses_defaults() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();

        let config = ConfigStoreConfig::load_from_env().expect("config loads");
        assert_eq!(config.server_url(), "http://127.0.0.1:8848/nacos/v1");
        assert_eq!(config.group(), DEFAULT_GROUP);
        assert_eq!(config.namespace(), None);
        assert!(!config.auth_enabled());
        assert_eq!(config.cache_ttl(), DEFAULT_CACHE_TTL);
        assert_eq!(config.retry(), RetryPolicy::default());
        assert_eq!(config.verify_delay(), DEFAULT_VERIFY_DELAY);
    }

    #[test]
    fn store_config_reads_overrides() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("CONFIG_STORE_NAMESPACE", "tenant-a");
        std::env::set_var("CONFIG_STORE_GROUP", "PORTAL");
        std::env::set_var("CONFIG_STORE_CACHE_TTL_MS", "30000");
        std::env::set_var("CONFIG_STORE_RETRY_ATTEMPTS", "5");
        std::env::set_var("CONFIG_STORE_RETRY_DELAY_MS", "250");

        let config = ConfigStoreConfig::load_from_env().expect("config loads");
        assert_eq!(config.namespace(), Some("tenant-a"));
        assert_eq!(config.group(), "PORTAL");
        assert_eq!(config.cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.retry().max_attempts(), 5);
        assert_eq!(config.retry().initial_delay(), Duration::from_millis(250));

        set_env();
    }

    #[test]
    fn auth_toggle_requires_credentials() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("CONFIG_STORE_AUTH_ENABLED", "true");

        let err = ConfigStoreConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                key: "CONFIG_STORE_USERNAME"
            }
        ));

        std::env::set_var("CONFIG_STORE_USERNAME", "nacos");
        std::env::set_var("CONFIG_STORE_PASSWORD", "hunter2");
        let config = ConfigStoreConfig::load_from_env().expect("config loads");
        let credentials = config.credentials().expect("credentials present");
        assert_eq!(credentials.username(), "nacos");
        assert!(!format!("{credentials:?}").contains("hunter2"));

        set_env();
    }

    #[test]
    fn malformed_values_are_rejected() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("CONFIG_STORE_AUTH_ENABLED", "maybe");
        assert!(matches!(
            ConfigStoreConfig::load_from_env().unwrap_err(),
            ConfigError::InvalidBool { .. }
        ));

        set_env();
        std::env::set_var("CONFIG_STORE_CACHE_TTL_MS", "soon");
        assert!(matches!(
            ConfigStoreConfig::load_from_env().unwrap_err(),
            ConfigError::InvalidNumber {
                key: "CONFIG_STORE_CACHE_TTL_MS",
                ..
            }
        ));

        set_env();
    }

    #[test]
    fn retry_attempts_beyond_u32_are_rejected() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("CONFIG_STORE_RETRY_ATTEMPTS", "4294967296");

        assert!(matches!(
            ConfigStoreConfig::load_from_env().unwrap_err(),
            ConfigError::OutOfRange {
                key: "CONFIG_STORE_RETRY_ATTEMPTS",
                value: 4_294_967_296
            }
        ));

        set_env();
    }

    #[test]
    fn api_config_supports_unix_and_internal_listeners() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("API_UNIX_SOCKET", "/tmp/portal.sock");
        std::env::set_var("API_INTERNAL_BIND_ADDRESS", "127.0.0.1:9090");

        let config = ApiConfig::load_from_env().expect("config loads");
        assert_eq!(config.api_unix_socket(), Some("/tmp/portal.sock"));
        assert_eq!(config.internal_bind_address(), Some("127.0.0.1:9090"));
        assert!(config.has_internal_listener());

        set_env();
    }

    #[test]
    fn empty_required_env_var_is_treated_as_missing() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("API_BIND_ADDRESS", "   ");

        let err = ApiConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                key: "API_BIND_ADDRESS"
            }
        ));

        set_env();
    }
}
