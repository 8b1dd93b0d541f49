//! # probe-types
//!
//! Value types shared by every clusterprobe crate:
//! - [`Scenario`], [`NetworkMode`], [`AddressStyle`] - one VIP routing permutation
//! - [`Outcome`] - the settled state of a scenario
//! - [`ServicePoint`] - a reachable endpoint of a deployed workload
//! - [`ProbeError`] - the per-scenario error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

mod endpoint;
mod error;
mod outcome;
mod scenario;

pub use endpoint::ServicePoint;
pub use error::ProbeError;
pub use outcome::Outcome;
pub use scenario::{AddressStyle, NetworkMode, Scenario, DEFAULT_BASE_PORT};
