use gateway::config::Config as GatewayConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Debug, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    #[serde(default = "default_statsd_port")]
    pub statsd_port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub sentry_dsn: Option<String>,
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_level")]
    pub level: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommonConfig {
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(flatten)]
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

fn default_statsd_port() -> u16 {
    8125
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            listener:
                host: 0.0.0.0
                port: 8080
            admin_listener:
                host: 127.0.0.1
                port: 8081
            backend:
                url: http://bosun.internal:8070
                request_timeout_ms: 2500
            max_items: 64
            translators: bosun.tag_values
            logging:
                sentry_dsn: https://key@sentry.example.com/1
                level: debug
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 9125
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.gateway.listener.port, 8080);
        assert_eq!(config.gateway.admin_listener.unwrap().port, 8081);
        assert_eq!(
            config.gateway.backend.url.host_str(),
            Some("bosun.internal")
        );
        assert_eq!(config.gateway.backend.request_timeout_ms, 2500);
        assert_eq!(config.gateway.max_items, 64);

        let logging = config.common.logging.expect("logging config");
        assert_eq!(
            logging.sentry_dsn.as_deref(),
            Some("https://key@sentry.example.com/1")
        );
        assert_eq!(logging.level, "debug");

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_host, "127.0.0.1");
        assert_eq!(metrics.statsd_port, 9125);
    }

    #[test]
    fn minimal_config() {
        let tmp = write_tmp_file(
            r#"
            listener: {host: 0.0.0.0, port: 8080}
            logging: {}
            metrics: {statsd_host: localhost}
            "#,
        );
        let config = Config::from_file(tmp.path()).expect("load config");

        assert!(config.gateway.validate().is_ok());
        assert_eq!(config.gateway.max_items, 128);
        let logging = config.common.logging.expect("logging config");
        assert_eq!(logging.sentry_dsn, None);
        assert_eq!(logging.level, "info");
        assert_eq!(config.common.metrics.expect("metrics").statsd_port, 8125);
    }

    #[test]
    fn load_errors() {
        assert!(matches!(
            Config::from_file(std::path::Path::new("/nonexistent/grapi.yaml")),
            Err(ConfigError::LoadError(_))
        ));

        // No listener
        let tmp = write_tmp_file("max_items: 10\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
