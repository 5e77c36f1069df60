use std::{env, sync::Arc};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use strum_macros::{AsRefStr, EnumString};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::hydrate_env_file;

static SUBSCRIBER_INSTALLED: OnceCell<()> = OnceCell::new();
static METRICS_HANDLE: OnceCell<Arc<PrometheusHandle>> = OnceCell::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Shared observability options for binaries.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    log_filter: String,
    log_format: LogFormat,
}

impl TelemetryConfig {
    /// Loads `<PREFIX>_LOG_FILTER` and `<PREFIX>_LOG_FORMAT`. Missing or
    /// unparseable entries fall back to `info` and pretty output.
    pub fn from_env(prefix: &str) -> Self {
        let _ = hydrate_env_file();
        let upper = prefix.trim().to_ascii_uppercase();
        let log_filter = env::var(format!("{upper}_LOG_FILTER"))
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());
        let log_format = env::var(format!("{upper}_LOG_FORMAT"))
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or_default();

        Self {
            log_filter,
            log_format,
        }
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Guard returned after telemetry initialization.
#[derive(Clone)]
pub struct TelemetryGuard {
    metrics: Arc<PrometheusHandle>,
}

impl TelemetryGuard {
    pub fn render_metrics(&self) -> String {
        self.metrics.render()
    }
}

/// Wires up tracing and the Prometheus recorder once per process. Later calls
/// reuse what the first call installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    install_tracing(config)?;
    let metrics = install_metrics()?;

    Ok(TelemetryGuard { metrics })
}

fn install_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    if SUBSCRIBER_INSTALLED.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_new(config.log_filter())
        .map_err(|err| TelemetryError::InvalidLogFilter(err.to_string()))?;

    if SUBSCRIBER_INSTALLED.set(()).is_ok() {
        let registry = tracing_subscriber::registry().with(env_filter);
        let installed = match config.log_format() {
            LogFormat::Pretty => registry
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .try_init(),
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json().with_target(true))
                .try_init(),
        };
        installed.map_err(|err| TelemetryError::Tracing(err.to_string()))?;
    }

    Ok(())
}

fn install_metrics() -> Result<Arc<PrometheusHandle>, TelemetryError> {
    METRICS_HANDLE
        .get_or_try_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .map(Arc::new)
                .map_err(|err| TelemetryError::Metrics(err.to_string()))
        })
        .cloned()
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(String),
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn telemetry_config_uses_defaults() {
        let _guard = ENV_GUARD.lock().unwrap();
        env::set_var("PORTAL_SKIP_DOTENV", "1");
        env::remove_var("API_LOG_FILTER");
        env::remove_var("API_LOG_FORMAT");

        let cfg = TelemetryConfig::from_env("api");
        assert_eq!(cfg.log_filter(), "info");
        assert_eq!(cfg.log_format(), LogFormat::Pretty);
    }

    #[test]
    fn telemetry_config_reads_env() {
        let _guard = ENV_GUARD.lock().unwrap();
        env::set_var("PORTAL_SKIP_DOTENV", "1");
        env::set_var("API_LOG_FILTER", "portal_storage=debug");
        env::set_var("API_LOG_FORMAT", "JSON");

        let cfg = TelemetryConfig::from_env("API");
        assert_eq!(cfg.log_filter(), "portal_storage=debug");
        assert_eq!(cfg.log_format(), LogFormat::Json);

        env::remove_var("API_LOG_FILTER");
        env::remove_var("API_LOG_FORMAT");
    }

    #[test]
    fn unknown_log_format_falls_back_to_pretty() {
        let _guard = ENV_GUARD.lock().unwrap();
        env::set_var("PORTAL_SKIP_DOTENV", "1");
        env::set_var("API_LOG_FORMAT", "xml");
        assert_eq!(TelemetryConfig::from_env("API").log_format(), LogFormat::Pretty);
        env::remove_var("API_LOG_FORMAT");
    }
}
