//! # probe-suites
//!
//! Networking and metrics suites run against a live cluster.
//!
//! A [`ClusterHarness`] bundles the cluster topology with one client per
//! cluster API; each suite in [`suites`] borrows it and returns a
//! [`SuiteReport`]. The VIP suite drives the scenario runner from
//! `probe-core`; the others are straight sequences of checks built from
//! the pure helpers in [`assertions`].
//!
//! ```ignore
//! let harness = ClusterHarness::new(topology, orchestrator, http);
//! let report = harness.run_suite(Suite::Vip).await?;
//! println!("{}", report);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assertions;
pub mod harness;
pub mod suites;

#[cfg(test)]
mod test_support;

pub use assertions::AssertionResult;
pub use harness::{ClusterHarness, ClusterTopology, HarnessError};
pub use suites::vip::VipExecutor;
pub use suites::{Suite, SuiteReport};
