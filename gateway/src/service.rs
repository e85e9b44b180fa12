use crate::dispatcher::Dispatcher;
use crate::errors::GatewayError;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::translator::GatewayBody;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use shared::http::make_boxed_error_response;
use shared::{gauge, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Inbound side of the gateway: hands each request to the translator that
/// claims it and returns whatever response the translator builds.
pub struct GatewayService {
    dispatcher: Arc<Dispatcher>,
}

impl GatewayService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

impl<B> Service<Request<B>> for GatewayService
where
    B: Send + 'static,
{
    type Response = Response<GatewayBody>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let started = Instant::now();
        let guard = InflightGuard::new();

        // Translators only look at the request line and headers
        let (parts, _body) = req.into_parts();
        let request = Request::from_parts(parts, ());
        let uri = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_default();
        let translator = self.dispatcher.route(uri);

        Box::pin(async move {
            let _guard = guard;
            let (response, translator_name) = match translator {
                Some(translator) => (translator.process(request).await, translator.name()),
                None => {
                    tracing::debug!(uri = %request.uri(), "no translator for request");
                    (make_boxed_error_response(StatusCode::NOT_FOUND), "none")
                }
            };

            histogram!(
                REQUEST_DURATION,
                "status" => response.status().as_str().to_string(),
                "translator" => translator_name
            )
            .record(started.elapsed().as_secs_f64());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BackendClient;
    use crate::registry::{self, TAG_VALUES, TranslatorContext};
    use crate::testutils::{config_with_backend, start_backend, translator_context};
    use http_body_util::BodyExt;
    use hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN;

    fn request(uri: &str) -> Request<()> {
        Request::builder().uri(uri).body(()).unwrap()
    }

    #[tokio::test]
    async fn test_unmatched_request_is_not_found() {
        let dispatcher = Dispatcher::from_config(&[TAG_VALUES.to_string()], &translator_context());
        let service = GatewayService::new(Arc::new(dispatcher));

        let response = service.call(request("/render?target=a.b")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Nothing installed at all
        let service = GatewayService::new(Arc::new(Dispatcher::new()));
        let response = service
            .call(request("/metrics/find?query=tagv=host"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_routes_to_translator() {
        let base = start_backend().await;
        let config = config_with_backend(&base);
        let context = TranslatorContext {
            client: BackendClient::new(&config.backend),
            config,
        };
        let mut dispatcher = Dispatcher::new();
        dispatcher.add(registry::construct(TAG_VALUES, &context).unwrap());
        let service = GatewayService::new(Arc::new(dispatcher));

        let response = service
            .call(request("/metrics/find?query=tagv=host/filter=%5Bweb.*%5D"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), br#"[{"text":"web01"},{"text":"web02"}]"#);
    }

    #[tokio::test]
    async fn test_malformed_query_gets_complete_response() {
        let service = GatewayService::new(Arc::new(Dispatcher::from_config(
            &[TAG_VALUES.to_string()],
            &translator_context(),
        )));

        for uri in ["/metrics/find", "/metrics/find?query=tagk=host"] {
            let response = service.call(request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body = response.into_body().collect().await.unwrap().to_bytes();
            assert!(body.is_empty());
        }
    }
}
