//! Orchestration API abstraction.
//!
//! The harness only needs three calls from the cluster's scheduler:
//! create an app, read its status, and destroy it. [`MarathonClient`]
//! speaks the real HTTP API; [`MockOrchestrator`] keeps everything in
//! memory for tests.

mod marathon;
mod mock;

pub use marathon::{MarathonClient, MarathonConfig};
pub use mock::MockOrchestrator;

use crate::app::AppDefinition;
use async_trait::async_trait;
use probe_types::{ProbeError, ServicePoint};
use thiserror::Error;

/// Orchestration API errors.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Request failed after connecting.
    #[error("http error: {0}")]
    Http(String),

    /// Could not reach the API.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// App does not exist.
    #[error("app not found: {0}")]
    NotFound(String),

    /// The API refused the request (4xx).
    #[error("request rejected: status={status}, body={body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The API is temporarily unable to answer (5xx, deployment lock).
    #[error("api unavailable: status={status}, body={body}")]
    Unavailable {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl OrchestrationError {
    /// Map a non-success status and body to an error.
    pub fn from_status(status: u16, body: String) -> Self {
        if status >= 500 || status == 409 {
            OrchestrationError::Unavailable { status, body }
        } else {
            OrchestrationError::Rejected { status, body }
        }
    }
}

impl From<reqwest::Error> for OrchestrationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            OrchestrationError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            OrchestrationError::Malformed(e.to_string())
        } else {
            OrchestrationError::Http(e.to_string())
        }
    }
}

impl From<OrchestrationError> for ProbeError {
    fn from(e: OrchestrationError) -> Self {
        match e {
            OrchestrationError::Rejected { status, body } => ProbeError::Rejected { status, body },
            OrchestrationError::Malformed(msg) => ProbeError::Rejected {
                status: 0,
                body: msg,
            },
            other => ProbeError::TransientUnavailable(other.to_string()),
        }
    }
}

/// Current state of a deployed app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppStatus {
    /// Requested instance count.
    pub instances: u32,
    /// Tasks in `TASK_RUNNING`.
    pub tasks_running: u32,
    /// Tasks passing all health checks.
    pub tasks_healthy: u32,
    /// Whether the app defines health checks.
    pub has_health_checks: bool,
    /// Reachable endpoints, one per running task.
    pub service_points: Vec<ServicePoint>,
}

impl AppStatus {
    /// Every requested instance is running, healthy when checks exist, and
    /// exposes an endpoint.
    pub fn is_ready(&self) -> bool {
        let wanted = self.instances.max(1);
        let settled = if self.has_health_checks {
            self.tasks_healthy
        } else {
            self.tasks_running
        };
        settled >= wanted && self.service_points.len() >= wanted as usize
    }
}

/// Scheduler operations used by the workload driver.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Submit an app definition.
    async fn create_app(&self, app: &AppDefinition) -> Result<(), OrchestrationError>;

    /// Read the status of app `app_id`.
    async fn app_status(&self, app_id: &str) -> Result<AppStatus, OrchestrationError>;

    /// Destroy app `app_id`. Destroying a missing app is not an error.
    async fn destroy_app(&self, app_id: &str) -> Result<(), OrchestrationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(instances: u32, running: u32, healthy: u32, checks: bool, points: usize) -> AppStatus {
        AppStatus {
            instances,
            tasks_running: running,
            tasks_healthy: healthy,
            has_health_checks: checks,
            service_points: (0..points)
                .map(|i| ServicePoint::new(format!("10.0.0.{}", i + 1), 20000))
                .collect(),
        }
    }

    #[test]
    fn readiness_requires_health_when_checked() {
        assert!(!status(1, 1, 0, true, 1).is_ready());
        assert!(status(1, 1, 1, true, 1).is_ready());
        assert!(status(1, 1, 0, false, 1).is_ready());
    }

    #[test]
    fn readiness_requires_endpoints() {
        assert!(!status(2, 2, 2, true, 1).is_ready());
        assert!(status(2, 2, 2, true, 2).is_ready());
    }

    #[test]
    fn status_codes_split_transient_and_rejected() {
        assert!(matches!(
            OrchestrationError::from_status(503, String::new()),
            OrchestrationError::Unavailable { .. }
        ));
        assert!(matches!(
            OrchestrationError::from_status(409, String::new()),
            OrchestrationError::Unavailable { .. }
        ));
        assert!(matches!(
            OrchestrationError::from_status(422, String::new()),
            OrchestrationError::Rejected { .. }
        ));
    }

    #[test]
    fn probe_error_mapping() {
        let rejected: ProbeError = OrchestrationError::Rejected {
            status: 422,
            body: "bad".into(),
        }
        .into();
        assert!(!rejected.is_transient());

        let down: ProbeError = OrchestrationError::ConnectionFailed("refused".into()).into();
        assert!(down.is_transient());
    }
}
