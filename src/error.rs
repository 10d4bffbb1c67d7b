//! Error types for the onboarding assistant.

use std::time::Duration;

use uuid::Uuid;

/// Errors raised while wiring the service together at startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Stage catalog integrity errors, raised at load time.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog has no stages")]
    Empty,

    #[error("Duplicate stage id: {0}")]
    DuplicateStage(String),

    #[error("Stage {stage} references unknown stage {target}")]
    DanglingReference { stage: String, target: String },

    #[error("Stage {stage} is malformed: {reason}")]
    Malformed { stage: String, reason: String },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the external payments gateway and rate service.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP request to {endpoint} failed: {reason}")]
    Http { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Response from {endpoint} is missing {field}")]
    MissingField { endpoint: String, field: String },

    #[error("Authentication failed: {0}")]
    Auth(String),
}

/// Violations of the quote scratchpad ordering rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteContextError {
    #[error("Cannot record a quote before amount and destination are known")]
    QuoteBeforeDetails,

    #[error("Cannot record a transaction before a quote exists")]
    TransactionBeforeQuote,
}

/// Session lookup and lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {0} not found")]
    NotFound(Uuid),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
