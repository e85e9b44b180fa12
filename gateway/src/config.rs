use hyper::header::HeaderValue;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8070";
pub const DEFAULT_CORS_HEADERS: &str = "Authorization, Content-Type, Accept, Origin, User-Agent, DNT, Cache-Control, X-Mx-ReqToken, Keep-Alive, X-Requested-With, If-Modified-Since";
pub const DEFAULT_CORS_ORIGIN: &str = "*";
pub const DEFAULT_MAX_ITEMS: usize = 128;
pub const DEFAULT_TRANSLATORS: &str = crate::registry::TAG_VALUES;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Backend URL must use http, got {0}")]
    UnsupportedScheme(String),

    #[error("Backend connection limits must be greater than 0")]
    ZeroConnections,

    #[error("Per-host connection limit ({per_host}) exceeds the total limit ({total})")]
    PerHostExceedsTotal { per_host: usize, total: usize },

    #[error("Backend timeouts must be greater than 0")]
    ZeroTimeout,

    #[error("Invalid CORS header value for {field}: {value}")]
    InvalidHeaderValue { field: &'static str, value: String },
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for dashboard queries
    pub listener: Listener,
    /// Optional listener for the health and readiness endpoints
    #[serde(default)]
    pub admin_listener: Option<Listener>,
    /// Outbound backend settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// CORS headers attached to every translated response
    #[serde(default)]
    pub cors: CorsConfig,
    /// Result cap used when a query carries no `/max=` token
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Comma separated translator identifiers, installed in this order
    #[serde(default = "default_translators")]
    pub translators: String,
}

impl Config {
    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if let Some(admin_listener) = &self.admin_listener {
            admin_listener.validate()?;
        }
        self.backend.validate()?;
        self.cors.validate()?;

        Ok(())
    }

    /// The configured translator identifiers, trimmed, in declaration order
    pub fn translator_names(&self) -> Vec<String> {
        self.translators
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Outbound connection settings for the backend
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend, e.g. "http://bosun.internal:8070"
    pub url: Url,
    /// Cap on concurrent outbound calls across all hosts
    pub max_connections: usize,
    /// Cap on concurrent outbound calls to one host
    pub max_connections_per_host: usize,
    pub connect_timeout_ms: u64,
    /// Applies to the whole exchange, including reading the body
    pub request_timeout_ms: u64,
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.scheme() != "http" {
            return Err(ValidationError::UnsupportedScheme(
                self.url.scheme().to_string(),
            ));
        }
        if self.max_connections == 0 || self.max_connections_per_host == 0 {
            return Err(ValidationError::ZeroConnections);
        }
        if self.max_connections_per_host > self.max_connections {
            return Err(ValidationError::PerHostExceedsTotal {
                per_host: self.max_connections_per_host,
                total: self.max_connections,
            });
        }
        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            max_connections: 15,
            max_connections_per_host: 5,
            connect_timeout_ms: 1000,
            request_timeout_ms: 5000,
        }
    }
}

/// Cross-origin headers sent back to the dashboard
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_headers: String,
    pub allowed_origin: String,
}

impl CorsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("allowed_headers", &self.allowed_headers),
            ("allowed_origin", &self.allowed_origin),
        ] {
            if HeaderValue::from_str(value).is_err() {
                return Err(ValidationError::InvalidHeaderValue {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_headers: DEFAULT_CORS_HEADERS.to_string(),
            allowed_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }
}

fn default_backend_url() -> Url {
    Url::parse(DEFAULT_BACKEND_URL).expect("default backend URL is valid")
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

fn default_translators() -> String {
    DEFAULT_TRANSLATORS.to_string()
}
