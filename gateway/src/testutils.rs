use crate::client::BackendClient;
use crate::config::Config;
use crate::registry::TranslatorContext;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::convert::Infallible;
use std::time::Duration;
use tokio::net::TcpListener;

pub const SLOW_RESPONSE_DELAY: Duration = Duration::from_millis(500);

// Minimal stand-in for the tag values API:
//   /api/tagv/host    three values
//   /api/tagv/echo*   one value, the path and query it was called with
//   /api/tagv/broken  a body that is not JSON
//   /api/tagv/slow    an empty array after SLOW_RESPONSE_DELAY
//   anything else     404
async fn backend_handler(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();

    let (status, body) = match req.uri().path() {
        "/api/tagv/host" => (StatusCode::OK, r#"["web01","web02","db01"]"#.to_string()),
        "/api/tagv/broken" => (StatusCode::OK, "not json".to_string()),
        "/api/tagv/slow" => {
            tokio::time::sleep(SLOW_RESPONSE_DELAY).await;
            (StatusCode::OK, "[]".to_string())
        }
        path if path.starts_with("/api/tagv/echo") => (
            StatusCode::OK,
            serde_json::to_string(&[path_and_query]).unwrap(),
        ),
        _ => (StatusCode::NOT_FOUND, "no such tag key".to_string()),
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    Ok(response)
}

/// Starts the fake backend on an ephemeral port and returns its base URL
pub async fn start_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);

            tokio::spawn(async move {
                if let Err(err) = Builder::new(TokioExecutor::new())
                    .serve_connection(io, service_fn(backend_handler))
                    .await
                {
                    eprintln!("Error serving connection: {:?}", err);
                }
            });
        }
    });

    format!("http://127.0.0.1:{port}")
}

/// A base URL nothing is listening on
pub async fn unused_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// Default configuration with the backend at `base`
pub fn config_with_backend(base: &str) -> Config {
    let mut config: Config =
        serde_yaml::from_str("listener: {host: 127.0.0.1, port: 8080}").unwrap();
    config.backend.url = url::Url::parse(base).unwrap();
    config
}

pub fn translator_context() -> TranslatorContext {
    let config = config_with_backend(crate::config::DEFAULT_BACKEND_URL);
    TranslatorContext {
        client: BackendClient::new(&config.backend),
        config,
    }
}
