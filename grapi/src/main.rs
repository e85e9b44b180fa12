mod config;

use clap::{Args, Parser};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, prelude::*};

const METRICS_PREFIX: &str = "grapi";

#[derive(Parser)]
#[command(name = "grapi", about = "Graphite metric discovery gateway")]
enum CliCommand {
    /// Serve Graphite discovery queries from the configured backend
    Gateway(GatewayArgs),
}

#[derive(Args)]
struct GatewayArgs {
    #[arg(long)]
    config_file_path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gateway(#[from] gateway::errors::GatewayError),
    #[error("could not start the runtime: {0}")]
    Runtime(std::io::Error),
    #[error("could not install the statsd exporter: {0}")]
    Metrics(String),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    match cli_run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "exiting");
            eprintln!("grapi: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cli_run(cli: CliCommand) -> Result<(), CliError> {
    match cli {
        CliCommand::Gateway(args) => {
            let config = Config::from_file(&args.config_file_path)?;
            let _sentry = init_logging(config.common.logging.as_ref());
            if let Some(metrics) = &config.common.metrics {
                init_metrics(metrics)?;
            }

            tracing::info!(config = %args.config_file_path.display(), "starting gateway");
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(CliError::Runtime)?;
            runtime.block_on(gateway::run(config.gateway))?;
            tracing::info!("gateway stopped");
            Ok(())
        }
    }
}

fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let level = logging.map_or("info", |logging| logging.level.as_str());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let guard = logging
        .and_then(|logging| logging.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    tracing::info!(
        host = config.statsd_host.as_str(),
        port = config.statsd_port,
        "statsd exporter installed"
    );
    Ok(())
}
