//! Configuration for the Prometheus exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub use countergate_common::config::{LogFormat, LoggingConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Load(#[from] countergate_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Application name, exposed as the `source` label and the push job.
    #[serde(default)]
    pub source: Option<String>,

    /// Instance identifier, exposed as the `instance` label.
    #[serde(default)]
    pub instance: Option<String>,

    /// Scrape endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Pushgateway settings.
    #[serde(default)]
    pub push: PushConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scrape (pull) endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whether to serve the scrape endpoints.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address to listen on (default: "0.0.0.0:8080").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for the metrics endpoint (default: "/metrics").
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    /// Path for the read-and-reset endpoint (default: "/metricsandreset").
    #[serde(default = "default_reset_path")]
    pub reset_path: String,
}

fn default_true() -> bool {
    true
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_reset_path() -> String {
    "/metricsandreset".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_listen(),
            metrics_path: default_metrics_path(),
            reset_path: default_reset_path(),
        }
    }
}

/// Pushgateway (push) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Whether pushes are sent.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pushgateway connection.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Push interval in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_interval() -> u64 {
    10
}

fn default_timeout() -> u64 {
    10
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            connection: ConnectionConfig::default(),
            interval_secs: default_interval(),
            timeout_secs: default_timeout(),
        }
    }
}

impl PushConfig {
    /// Get push interval as Duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Get timeout as Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Connection to the Pushgateway, either a full URI or protocol/host/port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Protocol: "http" or "https" (default: "http").
    #[serde(default)]
    pub protocol: Option<String>,

    /// Host name or IP address.
    #[serde(default)]
    pub host: Option<String>,

    /// Port number.
    #[serde(default)]
    pub port: Option<u16>,

    /// Full base URI; takes precedence over the other fields.
    #[serde(default)]
    pub uri: Option<String>,
}

impl ConnectionConfig {
    /// Build the base address, without a trailing slash.
    pub fn base_uri(&self) -> Result<String, ConfigError> {
        if let Some(uri) = self.uri.as_deref().filter(|u| !u.is_empty()) {
            return Ok(uri.trim_end_matches('/').to_string());
        }

        let host = self
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::Validation("Connection host is not set".to_string()))?;

        let protocol = self.protocol.as_deref().unwrap_or("http");
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::Validation(format!(
                "Unsupported connection protocol: {}",
                protocol
            )));
        }

        Ok(match self.port {
            Some(port) => format!("{}://{}:{}", protocol, host, port),
            None => format!("{}://{}", protocol, host),
        })
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ExporterConfig = countergate_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = countergate_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// The push connection is not checked here: an unresolvable Pushgateway
    /// address degrades push delivery instead of failing startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .http
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.http.listen
            )));
        }

        for path in [&self.http.metrics_path, &self.http.reset_path] {
            if !path.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "Path must start with /: {}",
                    path
                )));
            }
        }

        if self.http.metrics_path == self.http.reset_path {
            return Err(ConfigError::Validation(
                "metrics_path and reset_path must differ".to_string(),
            ));
        }

        if self.push.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "interval_secs must be > 0".to_string(),
            ));
        }

        if self.push.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
