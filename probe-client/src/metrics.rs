//! Per-node metrics API client.
//!
//! Every node serves `http://<node>:61001/system/v1/metrics/v0/<path>`.
//! Response fields are optional on purpose: the metrics suite reports a
//! missing field as a failed assertion rather than a parse error.

use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Port the metrics API listens on.
pub const DEFAULT_METRICS_PORT: u16 = 61001;

/// Errors that can occur when querying the metrics API.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// HTTP request failed
    #[error("http error: {0}")]
    Http(String),

    /// Connection to the node failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-200 answer
    #[error("unexpected status {status} from {url}: {body}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

impl From<reqwest::Error> for MetricsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            MetricsError::ConnectionFailed(e.to_string())
        } else {
            MetricsError::Http(e.to_string())
        }
    }
}

/// `GET ping`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PingResponse {
    /// Whether the node's metrics service is healthy.
    #[serde(default)]
    pub ok: bool,
}

/// One metric sample.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Datapoint {
    /// Metric name, e.g. `filesystem.capacity.used`.
    pub name: Option<String>,
    /// Sample value.
    #[serde(default)]
    pub value: serde_json::Value,
    /// Unit of the value.
    pub unit: Option<String>,
    /// Extra tags, e.g. `path` for filesystem metrics.
    pub tags: Option<BTreeMap<String, String>>,
}

/// Identity of the node or container a response describes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dimensions {
    /// Cluster the node belongs to.
    pub cluster_id: Option<String>,
    /// Node hostname.
    pub hostname: Option<String>,
    /// Executor of a container.
    pub executor_id: Option<String>,
    /// Container labels.
    pub labels: Option<BTreeMap<String, String>>,
}

/// `GET node` and `GET containers/<id>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsResponse {
    /// Samples.
    pub datapoints: Option<Vec<Datapoint>>,
    /// Node or container identity.
    pub dimensions: Option<Dimensions>,
    /// Executor id (container responses).
    pub executor_id: Option<String>,
    /// Labels (container and app responses).
    pub labels: Option<BTreeMap<String, serde_json::Value>>,
}

impl MetricsResponse {
    /// Executor id from the top level or the dimensions.
    pub fn executor_id(&self) -> Option<&str> {
        self.executor_id
            .as_deref()
            .or_else(|| self.dimensions.as_ref().and_then(|d| d.executor_id.as_deref()))
    }
}

/// Client for the metrics API of any node.
#[derive(Debug, Clone)]
pub struct MetricsClient {
    http: reqwest::Client,
    port: u16,
}

impl MetricsClient {
    /// Create a client.
    pub fn new(http: reqwest::Client, port: u16) -> Self {
        Self { http, port }
    }

    /// URL of `path` on `node`.
    pub fn url(&self, node: &str, path: &str) -> String {
        format!(
            "http://{}:{}/system/v1/metrics/v0/{}",
            node,
            self.port,
            path.trim_start_matches('/')
        )
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, node: &str, path: &str) -> Result<T, MetricsError> {
        let url = self.url(node, path);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MetricsError::Status { url, status, body });
        }
        Ok(response.json().await?)
    }

    /// `GET ping`.
    pub async fn ping(&self, node: &str) -> Result<PingResponse, MetricsError> {
        self.get(node, "ping").await
    }

    /// `GET node`.
    pub async fn node(&self, node: &str) -> Result<MetricsResponse, MetricsError> {
        self.get(node, "node").await
    }

    /// `GET containers`: ids of the containers on `node`.
    pub async fn containers(&self, node: &str) -> Result<Vec<String>, MetricsError> {
        self.get(node, "containers").await
    }

    /// `GET containers/<id>`.
    pub async fn container(&self, node: &str, id: &str) -> Result<MetricsResponse, MetricsError> {
        self.get(node, &format!("containers/{}", id)).await
    }

    /// `GET containers/<id>/app`.
    pub async fn container_app(&self, node: &str, id: &str) -> Result<MetricsResponse, MetricsError> {
        self.get(node, &format!("containers/{}/app", id)).await
    }
}
