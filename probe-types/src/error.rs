//! Error taxonomy for a single scenario execution.

use thiserror::Error;

/// Errors that can end a scenario.
///
/// Every variant is caught inside the unit executing the scenario and
/// turned into an [`Outcome`](crate::Outcome); none escape the runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// Connection refused, 5xx, or a result that has not propagated yet.
    #[error("transient unavailability: {0}")]
    TransientUnavailable(String),

    /// The probe reached a workload, but not the expected one.
    #[error("routing mismatch: expected token {expected}, got {actual}")]
    RoutingMismatch {
        /// Token of the origin workload.
        expected: String,
        /// Token actually returned through the routable address.
        actual: String,
    },

    /// A workload did not become healthy in time.
    #[error("deployment of {app_id} not healthy after {timeout_secs}s")]
    DeploymentTimeout {
        /// Orchestration id of the workload.
        app_id: String,
        /// Readiness ceiling that was exceeded.
        timeout_secs: u64,
    },

    /// Not enough distinct cluster locations for the requested placement.
    #[error("insufficient capacity: need {required} distinct locations, have {available}")]
    InsufficientCapacity {
        /// Locations the placement needs.
        required: usize,
        /// Locations the cluster offers.
        available: usize,
    },

    /// The probe request itself could not complete.
    #[error("probe unreachable: {0}")]
    ProbeUnreachable(String),

    /// The cluster rejected a request outright (4xx, malformed payload).
    #[error("api rejected request: status={status}, body={body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

impl ProbeError {
    /// Structural errors mark the scenario Skipped instead of Failed.
    pub fn is_structural(&self) -> bool {
        matches!(self, ProbeError::InsufficientCapacity { .. })
    }

    /// Whether waiting and trying again can plausibly change the answer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProbeError::TransientUnavailable(_)
                | ProbeError::ProbeUnreachable(_)
                | ProbeError::RoutingMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProbeError::RoutingMismatch {
            expected: "abc".into(),
            actual: "def".into(),
        };
        assert_eq!(
            err.to_string(),
            "routing mismatch: expected token abc, got def"
        );
    }

    #[test]
    fn only_capacity_is_structural() {
        assert!(ProbeError::InsufficientCapacity {
            required: 2,
            available: 1
        }
        .is_structural());
        assert!(!ProbeError::ProbeUnreachable("refused".into()).is_structural());
        assert!(!ProbeError::DeploymentTimeout {
            app_id: "/x".into(),
            timeout_secs: 1
        }
        .is_structural());
    }

    #[test]
    fn rejection_is_not_transient() {
        assert!(!ProbeError::Rejected {
            status: 422,
            body: "bad constraint".into()
        }
        .is_transient());
        assert!(ProbeError::TransientUnavailable("503".into()).is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProbeError>();
    }
}
