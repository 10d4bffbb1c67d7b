//! Configuration types, loaded from `REMIT_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default request timeout for gateway calls.
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 20;

/// Connection settings for the external payments gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `https://gateway.example.com`. No trailing slash.
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub username: String,
    pub password: SecretString,
    /// Per-request timeout applied to every gateway and rate call.
    pub timeout: Duration,
    /// Unauthenticated currency-rate lookup endpoint.
    pub rates_url: Option<String>,
}

impl GatewayConfig {
    /// Load gateway settings from the environment.
    ///
    /// `REMIT_GATEWAY_BASE_URL` is required; credentials default to empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("REMIT_GATEWAY_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("REMIT_GATEWAY_BASE_URL".to_string()))?;

        let timeout_secs: u64 = match std::env::var("REMIT_GATEWAY_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "REMIT_GATEWAY_TIMEOUT_SECS".to_string(),
                message: format!("expected whole seconds, got {raw:?}"),
            })?,
            Err(_) => DEFAULT_GATEWAY_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: std::env::var("REMIT_GATEWAY_CLIENT_ID").unwrap_or_default(),
            client_secret: SecretString::from(
                std::env::var("REMIT_GATEWAY_CLIENT_SECRET").unwrap_or_default(),
            ),
            username: std::env::var("REMIT_GATEWAY_USERNAME").unwrap_or_default(),
            password: SecretString::from(
                std::env::var("REMIT_GATEWAY_PASSWORD").unwrap_or_default(),
            ),
            timeout: Duration::from_secs(timeout_secs),
            rates_url: std::env::var("REMIT_RATES_URL").ok(),
        })
    }
}

/// Per-session behaviour knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long the typing placeholder is shown before a reply lands.
    pub typing_delay: Duration,
    /// Interval between transaction status inquiries.
    pub poll_interval: Duration,
    /// Whether to poll transaction status after a transaction is created.
    pub polling_enabled: bool,
    /// Seed a fresh (or reset) session with the first stage's intro.
    pub seed_welcome: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            typing_delay: Duration::from_millis(600),
            poll_interval: Duration::from_secs(10),
            polling_enabled: true,
            seed_welcome: true,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let typing_delay = std::env::var("REMIT_TYPING_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.typing_delay);

        let poll_interval = std::env::var("REMIT_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);

        let polling_enabled = std::env::var("REMIT_POLLING_ENABLED")
            .map(|s| !matches!(s.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off"))
            .unwrap_or(defaults.polling_enabled);

        Self {
            typing_delay,
            poll_interval,
            polling_enabled,
            seed_welcome: defaults.seed_welcome,
        }
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Optional JSON catalog replacing the built-in stage script.
    pub catalog_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            catalog_path: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("REMIT_HOST").unwrap_or(defaults.host),
            port: std::env::var("REMIT_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            catalog_path: std::env::var("REMIT_CATALOG_PATH").ok().map(PathBuf::from),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Everything `main` needs to start the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            gateway: GatewayConfig::from_env()?,
            session: SessionConfig::from_env(),
            server: ServerConfig::from_env(),
        })
    }
}
