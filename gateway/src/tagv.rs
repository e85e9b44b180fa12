use crate::client::BackendClient;
use crate::completion::CallOutcome;
use crate::errors::TransformError;
use crate::metrics_defs::{QUERY_ERRORS, TRANSFORM_ERRORS};
use crate::query::parse_query;
use crate::registry::TAG_VALUES;
use crate::translator::{GatewayBody, InboundRequest, Translator, TranslatorConfig};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE,
    HeaderValue,
};
use hyper::{Response, StatusCode};
use regex::Regex;
use serde::Serialize;
use shared::counter;
use shared::http::make_empty_response;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Path prefix of the Graphite metric discovery endpoint
pub const MOUNT_PREFIX: &str = "/metrics/find";

/// Answers Graphite `tagv=` discovery queries from the backend's
/// `/api/tagv` endpoint.
pub struct TagValuesTranslator {
    config: Arc<TranslatorConfig>,
    client: BackendClient,
}

impl TagValuesTranslator {
    pub fn new(config: TranslatorConfig, client: BackendClient) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }
}

#[async_trait]
impl Translator for TagValuesTranslator {
    fn name(&self) -> &'static str {
        TAG_VALUES
    }

    fn matches(&self, uri: &str) -> bool {
        if uri.trim().is_empty() {
            return false;
        }
        uri.get(..MOUNT_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(MOUNT_PREFIX))
    }

    async fn process(&self, request: InboundRequest) -> Response<GatewayBody> {
        let raw_uri = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_default();

        let query = match parse_query(raw_uri) {
            Ok(query) => query,
            Err(error) => {
                tracing::warn!(uri = raw_uri, error = %error, "rejecting discovery query");
                counter!(QUERY_ERRORS).increment(1);
                return make_empty_response(StatusCode::BAD_REQUEST);
            }
        };

        let url = query.backend_url(self.config.backend_url.as_str());
        let max_items = query.max_items.unwrap_or(self.config.max_items);
        let filter = query.filter;
        tracing::debug!(uri = raw_uri, backend = %url, max_items, "translating discovery query");

        let config = self.config.clone();
        let (tx, rx) = oneshot::channel();
        self.client.request(&url, move |outcome| {
            let response = respond(&config, outcome, max_items, filter.as_ref());
            if tx.send(response).is_err() {
                tracing::debug!("inbound request finished before the backend answered");
            }
        });

        rx.await
            .unwrap_or_else(|_| make_empty_response(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

fn respond(
    config: &TranslatorConfig,
    outcome: CallOutcome,
    max_items: usize,
    filter: Option<&Regex>,
) -> Response<GatewayBody> {
    let url = outcome.url.clone();
    let content = outcome
        .into_body()
        .map_err(TransformError::from)
        .and_then(|body| transform(&body, max_items, filter));

    match content {
        Ok(content) => json_response(config, content),
        Err(error) => {
            tracing::error!(backend = %url, error = %error, "failed to translate backend response");
            counter!(TRANSFORM_ERRORS).increment(1);
            make_empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn json_response(config: &TranslatorConfig, content: Vec<u8>) -> Response<GatewayBody> {
    let content_length = HeaderValue::from(content.len());
    let mut response = Response::new(Full::new(Bytes::from(content)).boxed());

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, config.allowed_origin.clone());
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, config.allowed_headers.clone());
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_LENGTH, content_length);
    response
}

#[derive(Serialize)]
struct TextEntry<'a> {
    text: &'a str,
}

/// Turns a backend JSON array of strings into `[{"text": ...}, ...]`.
///
/// Values the filter does not fully match are skipped. Scanning stops after
/// the value at index `max_items`, which is itself kept when it passes the
/// filter.
pub fn transform(
    body: &[u8],
    max_items: usize,
    filter: Option<&Regex>,
) -> Result<Vec<u8>, TransformError> {
    let values: Vec<String> = serde_json::from_slice(body)?;

    let mut entries = Vec::new();
    for (index, value) in values.iter().enumerate() {
        if filter.is_none_or(|filter| filter.is_match(value)) {
            entries.push(TextEntry { text: value });
        }
        if index >= max_items {
            break;
        }
    }

    Ok(serde_json::to_vec(&entries)?)
}
