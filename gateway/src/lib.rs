pub mod client;
pub mod completion;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod metrics_defs;
pub mod query;
pub mod registry;
pub mod service;
pub mod tagv;
pub mod translator;

#[cfg(test)]
mod testutils;

use crate::client::BackendClient;
use crate::dispatcher::Dispatcher;
use crate::errors::GatewayError;
use crate::registry::TranslatorContext;
use crate::service::GatewayService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use shared::metrics_defs::describe_metrics;
use std::future::Future;
use std::sync::Arc;

/// A configured gateway, ready to serve.
pub struct Gateway {
    config: config::Config,
    client: BackendClient,
    dispatcher: Arc<Dispatcher>,
}

impl Gateway {
    /// Validates `config` and builds the backend client and translators.
    pub fn new(config: config::Config) -> Result<Self, GatewayError> {
        config.validate()?;

        let client = BackendClient::new(&config.backend);
        let context = TranslatorContext {
            config: config.clone(),
            client: client.clone(),
        };
        let dispatcher = Arc::new(Dispatcher::from_config(
            &config.translator_names(),
            &context,
        ));

        Ok(Self {
            config,
            client,
            dispatcher,
        })
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Serves the gateway and admin listeners until `shutdown` resolves or a
    /// listener fails. The backend client is shut down either way.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()>,
    {
        describe_metrics(metrics_defs::ALL_METRICS);

        let ready = !self.dispatcher.is_empty();
        let listener = &self.config.listener;
        let gateway_task = run_http_service(
            &listener.host,
            listener.port,
            GatewayService::new(self.dispatcher.clone()),
        );

        let admin_listener = self.config.admin_listener.clone();
        let admin_task = async move {
            match admin_listener {
                Some(admin) => {
                    let service = AdminService::<_, GatewayError>::new(move || ready);
                    run_http_service(&admin.host, admin.port, service).await
                }
                None => std::future::pending().await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = shutdown => {
                tracing::info!("shutdown requested");
                Ok(())
            }
            result = async { tokio::try_join!(gateway_task, admin_task) } => result.map(|_| ()),
        };

        self.client.shutdown();
        result.map_err(GatewayError::from)
    }
}

/// Runs the gateway until ctrl-c.
pub async fn run(config: config::Config) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TAG_VALUES;
    use crate::testutils::config_with_backend;

    #[tokio::test]
    async fn test_gateway_new() {
        let config = config_with_backend("http://127.0.0.1:8070");
        let gateway = Gateway::new(config.clone()).unwrap();
        assert_eq!(gateway.dispatcher().names(), vec![TAG_VALUES]);

        let mut invalid = config.clone();
        invalid.listener.port = 0;
        assert!(matches!(
            Gateway::new(invalid),
            Err(GatewayError::InvalidConfig(_))
        ));

        // Unknown translators are skipped without failing startup
        let mut unknown = config;
        unknown.translators = "bosun.unknown".to_string();
        assert!(Gateway::new(unknown).unwrap().dispatcher().is_empty());
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let gateway = Gateway::new(config_with_backend("http://127.0.0.1:8070")).unwrap();
        let client = gateway.client.clone();

        // A shutdown signal that is already resolved
        gateway.serve(async {}).await.unwrap();
        assert!(client.is_shutdown());
    }
}
