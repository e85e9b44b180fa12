use crate::config::{Config, ValidationError};
use crate::errors::GatewayError;
use async_trait::async_trait;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::header::HeaderValue;
use hyper::{Request, Response};
use std::convert::Infallible;
use url::Url;

/// Response body type produced by translators
pub type GatewayBody = BoxBody<Bytes, Infallible>;

/// Inbound request as seen by translators. The body is never needed.
pub type InboundRequest = Request<()>;

/// A translator claims some inbound URIs, turns each into a backend call and
/// reshapes the backend's answer into the dashboard's format.
///
/// `process` always produces a response; failures are mapped to status codes
/// inside the translator.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Registry identifier of this translator
    fn name(&self) -> &'static str;

    /// Whether this translator owns `uri` (path and query)
    fn matches(&self, uri: &str) -> bool;

    async fn process(&self, request: InboundRequest) -> Response<GatewayBody>;
}

/// Static settings shared by the translators built from one configuration
#[derive(Clone, Debug)]
pub struct TranslatorConfig {
    pub backend_url: Url,
    pub allowed_headers: HeaderValue,
    pub allowed_origin: HeaderValue,
    pub max_items: usize,
}

impl TryFrom<&Config> for TranslatorConfig {
    type Error = GatewayError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        let header = |field: &'static str, value: &str| {
            HeaderValue::from_str(value).map_err(|_| ValidationError::InvalidHeaderValue {
                field,
                value: value.to_string(),
            })
        };

        Ok(Self {
            backend_url: config.backend.url.clone(),
            allowed_headers: header("allowed_headers", &config.cors.allowed_headers)?,
            allowed_origin: header("allowed_origin", &config.cors.allowed_origin)?,
            max_items: config.max_items,
        })
    }
}
