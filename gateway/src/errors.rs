use crate::config::ValidationError;
use hyper::StatusCode;
use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Errors raised while building or running the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("Unknown translator: {0}")]
    UnknownTranslator(String),

    #[error("Translator {name} could not be constructed: {reason}")]
    TranslatorConstruction { name: String, reason: String },
}

/// Failure of a single outbound backend call
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Invalid backend URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Connection limit reached ({scope}) for {url}")]
    ConnectionLimit { url: String, scope: &'static str },

    #[error("Backend client is shut down")]
    Shutdown,

    #[error("Backend request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Backend {url} answered with status {status}")]
    Status { url: String, status: StatusCode },

    #[error("Failed to read backend response body from {url}: {reason}")]
    Body { url: String, reason: String },

    #[error("Backend timeout for {0}")]
    Timeout(String),
}

impl BackendError {
    /// Short tag used when counting backend failures
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::InvalidUrl { .. } => "invalid_url",
            BackendError::ConnectionLimit { .. } => "connection_limit",
            BackendError::Shutdown => "shutdown",
            BackendError::Request { .. } => "request",
            BackendError::Status { .. } => "status",
            BackendError::Body { .. } => "body",
            BackendError::Timeout(_) => "timeout",
        }
    }
}

/// Rejection of an inbound discovery query
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("URI is not valid UTF-8 once decoded")]
    InvalidEncoding,

    #[error("URI has no ?query= parameter")]
    MissingQuery,

    #[error("Unrecognized query kind: {0}")]
    UnrecognizedKind(String),

    #[error("Malformed query: {0}")]
    Malformed(String),

    #[error("Invalid max items: {0}")]
    InvalidMaxItems(String),

    #[error("Invalid result filter: {0}")]
    InvalidFilter(#[from] regex::Error),
}

/// Failure to turn a backend result into the dashboard's shape
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Backend call failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Backend body is not a JSON array of strings: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
