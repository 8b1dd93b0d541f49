//! # probe-client
//!
//! The cluster as seen from the outside. Every type here talks HTTP to a
//! black-box service:
//!
//! - [`orchestration`] - deploy/poll/destroy apps ([`MarathonClient`], [`MockOrchestrator`])
//! - [`app`] - test workload definitions
//! - [`workload`] - [`WorkloadDriver`]: readiness waits and guaranteed teardown
//! - [`probe`] - [`RoutabilityProbe`]: routing checks through a proxy workload
//! - [`metrics`] - per-node metrics API
//! - [`overlay`] - overlay network status API

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod http;
pub mod metrics;
pub mod orchestration;
pub mod overlay;
pub mod probe;
pub mod workload;

pub use app::{AppDefinition, Constraint, TestApp, WorkloadTemplate};
pub use metrics::{MetricsClient, MetricsError};
pub use orchestration::{
    AppStatus, MarathonClient, MarathonConfig, MockOrchestrator, OrchestrationError, Orchestrator,
};
pub use overlay::{OverlayClient, OverlayError};
pub use probe::{ProbeReading, RoutabilityProbe};
pub use workload::{Deployment, PairedDeployment, PairedEndpoints, WorkloadDriver};
