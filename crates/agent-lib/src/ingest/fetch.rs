//! Exposition text retrieval from a metrics endpoint

use crate::error::FetchError;
use crate::models::{MetricType, Sample};
use crate::normalize::{FS_AVAIL, FS_SIZE, LOAD1, MEM_AVAILABLE, MEM_TOTAL, ROOT_MOUNTPOINT};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Public demo endpoint used when the caller names none
pub const DEFAULT_METRICS_URL: &str = "http://demo.robustperception.io:9090/metrics";

const METRICS_PATH: &str = "/metrics";

/// Source of raw exposition text
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetch the exposition text served at `url`
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// Short identifier for logs
    fn name(&self) -> &str;
}

/// Configuration for HTTP metric fetches
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Upper bound on a whole fetch, connect through body
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: format!("opsight/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Scrapes exposition text over HTTP
pub struct HttpMetricsSource {
    client: Client,
    config: FetchConfig,
}

impl HttpMetricsSource {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::new(FetchConfig {
            timeout,
            ..FetchConfig::default()
        })
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.config.timeout,
            }
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else if err.is_connect() || err.is_request() {
            FetchError::Connect {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            FetchError::Body {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let endpoint = normalize_endpoint(url)?;
        let target = endpoint.as_str();
        debug!(url = %target, "Fetching exposition text");

        let response = self
            .client
            .get(endpoint.clone())
            .send()
            .await
            .map_err(|e| self.classify(target, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: target.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| self.classify(target, e))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Turn a user-supplied endpoint into a scrape URL
///
/// A bare `host:port` gets an `http://` scheme and any path not already
/// ending in `/metrics` gets it appended. Query strings are preserved.
pub fn normalize_endpoint(raw: &str) -> Result<Url, FetchError> {
    let trimmed = raw.trim();
    let invalid = |message: &str| FetchError::InvalidUrl {
        url: raw.to_string(),
        message: message.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("empty url"));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }

    if !url.path().ends_with(METRICS_PATH) {
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}{}", base, METRICS_PATH));
    }

    Ok(url)
}

/// Fixed node-exporter sample set substituted when a fetch fails
///
/// Normalizes to memory_used_percent 0.5, disk_free_percent 0.4 and
/// cpu_load_1m 0.5, a healthy and stable system.
pub fn fallback_samples() -> Vec<Sample> {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    vec![
        Sample::new(MEM_TOTAL, 8.0 * GIB, MetricType::Gauge),
        Sample::new(MEM_AVAILABLE, 4.0 * GIB, MetricType::Gauge),
        Sample::new(FS_SIZE, 100.0 * GIB, MetricType::Gauge)
            .with_label("device", "/dev/root")
            .with_label("mountpoint", ROOT_MOUNTPOINT),
        Sample::new(FS_AVAIL, 40.0 * GIB, MetricType::Gauge)
            .with_label("device", "/dev/root")
            .with_label("mountpoint", ROOT_MOUNTPOINT),
        Sample::new(LOAD1, 0.5, MetricType::Gauge),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_metrics_at;

    #[test]
    fn test_normalize_bare_host_port() {
        let url = normalize_endpoint("localhost:9100").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9100/metrics");
    }

    #[test]
    fn test_normalize_keeps_existing_metrics_path() {
        let url = normalize_endpoint("https://node.example.com:9100/metrics").unwrap();
        assert_eq!(url.as_str(), "https://node.example.com:9100/metrics");
    }

    #[test]
    fn test_normalize_appends_to_prefix_path() {
        let url = normalize_endpoint("http://gateway/node-1/").unwrap();
        assert_eq!(url.path(), "/node-1/metrics");
    }

    #[test]
    fn test_normalize_rejects_bad_input() {
        assert!(matches!(
            normalize_endpoint("   "),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            normalize_endpoint("ftp://host/metrics"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_fallback_samples_normalize_to_all_signals() {
        let signals = normalize_metrics_at(&fallback_samples(), 0);
        let values: Vec<f64> = signals.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![0.5, 0.4, 0.5]);
    }

    #[tokio::test]
    async fn test_fetch_text_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/metrics")
            .with_status(200)
            .with_header("content-type", "text/plain; version=0.0.4")
            .with_body("node_load1 0.42\n")
            .create_async()
            .await;

        let source = HttpMetricsSource::new(FetchConfig::default()).unwrap();
        let text = source.fetch_text(&server.url()).await.unwrap();

        assert_eq!(text, "node_load1 0.42\n");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_text_http_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/metrics")
            .with_status(503)
            .create_async()
            .await;

        let source = HttpMetricsSource::new(FetchConfig::default()).unwrap();
        let err = source.fetch_text(&server.url()).await.unwrap_err();

        assert!(matches!(err, FetchError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_text_connect_failure() {
        let source = HttpMetricsSource::with_timeout(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) is closed on test hosts
        let err = source.fetch_text("http://127.0.0.1:9").await.unwrap_err();

        assert!(matches!(
            err,
            FetchError::Connect { .. } | FetchError::Timeout { .. }
        ));
    }
}
