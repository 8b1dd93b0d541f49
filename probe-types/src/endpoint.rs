//! Reachable endpoints of deployed workloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One externally reachable (host, port) of a running workload instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServicePoint {
    /// Agent host the instance runs on.
    pub host: String,
    /// First port the instance exposes on that host.
    pub port: u16,
    /// Container IP when the instance runs on an overlay network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl ServicePoint {
    /// Endpoint without a container IP.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ip: None,
        }
    }

    /// Base URL for plain HTTP requests to this endpoint.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServicePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_format() {
        let sp = ServicePoint::new("10.0.0.5", 23456);
        assert_eq!(sp.base_url(), "http://10.0.0.5:23456");
        assert_eq!(sp.to_string(), "10.0.0.5:23456");
    }
}
