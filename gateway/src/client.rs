use crate::completion::{CallOutcome, CallResult};
use crate::config::BackendConfig;
use crate::errors::BackendError;
use crate::metrics_defs::BACKEND_ERRORS;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::ext::ReasonPhrase;
use hyper::header::ACCEPT;
use hyper::{Request, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use parking_lot::Mutex;
use shared::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::timeout;

type HttpClient = Client<HttpConnector, Empty<Bytes>>;

/// Shared asynchronous HTTP client for backend calls.
///
/// Every call returns immediately with a [`CallResult`]; the exchange runs on
/// its own task and feeds the result as it progresses. Concurrent calls are
/// capped in total and per host, and a call over either cap fails at once
/// instead of waiting. Cloning is cheap and clones share the same limits.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: HttpClient,
    request_timeout: Duration,
    total_permits: Arc<Semaphore>,
    max_per_host: usize,
    host_permits: Mutex<HashMap<String, Arc<Semaphore>>>,
}

struct CallPermits {
    _total: OwnedSemaphorePermit,
    _host: OwnedSemaphorePermit,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.connect_timeout()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(config.max_connections_per_host)
            .build(connector);

        Self {
            inner: Arc::new(Inner {
                client,
                request_timeout: config.request_timeout(),
                total_permits: Arc::new(Semaphore::new(config.max_connections)),
                max_per_host: config.max_connections_per_host,
                host_permits: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Starts a GET to `url` and returns its completion object right away.
    pub fn execute(&self, url: &str) -> Arc<CallResult> {
        let call = Arc::new(CallResult::new(url));
        self.start(call.clone());
        call
    }

    /// Like [`BackendClient::execute`], with `handler` attached before the call starts.
    pub fn request<F>(&self, url: &str, handler: F) -> Arc<CallResult>
    where
        F: FnOnce(CallOutcome) + Send + 'static,
    {
        let call = Arc::new(CallResult::new(url));
        call.attach_handler(handler);
        self.start(call.clone());
        call
    }

    /// Refuses new calls. Calls already running are left to finish.
    pub fn shutdown(&self) {
        self.inner.total_permits.close();
        tracing::info!("backend client shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.total_permits.is_closed()
    }

    fn start(&self, call: Arc<CallResult>) {
        let admitted = self.inner.admit(call.url());
        let inner = self.inner.clone();

        tokio::spawn(async move {
            let (uri, _permits) = match admitted {
                Ok(admitted) => admitted,
                Err(error) => return fail(&call, error),
            };

            match timeout(inner.request_timeout, exchange(&inner.client, uri, &call)).await {
                Ok(Ok(())) => call.on_complete(),
                Ok(Err(error)) => fail(&call, error),
                Err(_) => fail(&call, BackendError::Timeout(call.url().to_string())),
            }
        });
    }
}

impl Inner {
    fn admit(&self, url: &str) -> Result<(Uri, CallPermits), BackendError> {
        let invalid = |reason: String| BackendError::InvalidUrl {
            url: url.to_string(),
            reason,
        };
        let uri = url
            .parse::<Uri>()
            .map_err(|e| invalid(e.to_string()))?;
        let host = uri
            .authority()
            .map(|authority| authority.as_str().to_ascii_lowercase())
            .ok_or_else(|| invalid("missing host".to_string()))?;

        let total = acquire(&self.total_permits, url, "total")?;
        let host = {
            let mut hosts = self.host_permits.lock();
            // Drop hosts with no call in flight
            hosts.retain(|_, semaphore| semaphore.available_permits() < self.max_per_host);
            let semaphore = hosts
                .entry(host)
                .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_host)));
            acquire(semaphore, url, "per-host")?
        };

        Ok((
            uri,
            CallPermits {
                _total: total,
                _host: host,
            },
        ))
    }
}

fn acquire(
    semaphore: &Arc<Semaphore>,
    url: &str,
    scope: &'static str,
) -> Result<OwnedSemaphorePermit, BackendError> {
    semaphore
        .clone()
        .try_acquire_owned()
        .map_err(|error| match error {
            TryAcquireError::Closed => BackendError::Shutdown,
            TryAcquireError::NoPermits => BackendError::ConnectionLimit {
                url: url.to_string(),
                scope,
            },
        })
}

async fn exchange(client: &HttpClient, uri: Uri, call: &CallResult) -> Result<(), BackendError> {
    let url = call.url();
    let request = Request::get(uri)
        .header(ACCEPT, "application/json")
        .body(Empty::new())
        .map_err(|e| BackendError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client
        .request(request)
        .await
        .map_err(|e| BackendError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let (parts, mut body) = response.into_parts();
    let status_text = parts
        .extensions
        .get::<ReasonPhrase>()
        .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
        .or_else(|| parts.status.canonical_reason())
        .unwrap_or_default();
    call.on_status(parts.status, status_text);

    // The body of an error response is never read
    if !parts.status.is_success() {
        return Err(BackendError::Status {
            url: url.to_string(),
            status: parts.status,
        });
    }
    call.on_headers(parts.headers);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| BackendError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if let Ok(chunk) = frame.into_data() {
            if !call.on_content(&chunk) {
                break;
            }
        }
    }

    Ok(())
}

fn fail(call: &CallResult, error: BackendError) {
    tracing::warn!(url = call.url(), error = %error, "backend call failed");
    counter!(BACKEND_ERRORS, "kind" => error.kind()).increment(1);
    call.on_error(error);
}
