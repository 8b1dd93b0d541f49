//! Overlay network status client.

use serde::Deserialize;
use thiserror::Error;

/// Port of the overlay module on masters.
pub const MASTER_PORT: u16 = 5050;

/// Port of the overlay module on agents.
pub const AGENT_PORT: u16 = 5051;

/// Status every healthy overlay reports.
pub const STATUS_OK: &str = "STATUS_OK";

/// Errors that can occur when querying overlay status.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// HTTP request failed
    #[error("http error: {0}")]
    Http(String),

    /// Connection to the node failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-200 answer
    #[error("unexpected status {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
}

impl From<reqwest::Error> for OverlayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            OverlayError::ConnectionFailed(e.to_string())
        } else {
            OverlayError::Http(e.to_string())
        }
    }
}

/// One overlay network as seen by a node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Overlay {
    /// Network info.
    #[serde(default)]
    pub info: OverlayInfo,
    /// Current state.
    #[serde(default)]
    pub state: OverlayState,
}

/// Static overlay info.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverlayInfo {
    /// Network name.
    #[serde(default)]
    pub name: String,
    /// Subnet.
    #[serde(default)]
    pub subnet: String,
}

/// Overlay state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverlayState {
    /// e.g. `STATUS_OK`.
    #[serde(default)]
    pub status: String,
}

impl Overlay {
    /// Whether the node reports this overlay healthy.
    pub fn is_ok(&self) -> bool {
        self.state.status == STATUS_OK
    }
}

#[derive(Debug, Deserialize)]
struct OverlayResponse {
    #[serde(default)]
    overlays: Vec<Overlay>,
}

/// Reads `overlay-agent/overlay` from masters and agents.
#[derive(Debug, Clone)]
pub struct OverlayClient {
    http: reqwest::Client,
}

impl OverlayClient {
    /// Create a client.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Status URL on `host:port`.
    pub fn url(host: &str, port: u16) -> String {
        format!("http://{}:{}/overlay-agent/overlay", host, port)
    }

    /// Overlays known to the node at `host:port`.
    pub async fn overlays(&self, host: &str, port: u16) -> Result<Vec<Overlay>, OverlayError> {
        let url = Self::url(host, port);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(OverlayError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        let body: OverlayResponse = response.json().await?;
        Ok(body.overlays)
    }
}
