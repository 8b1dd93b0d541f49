//! # probe-core
//!
//! The concurrent probe-and-verify engine.
//!
//! Everything here is independent of how a cluster is reached: the runner
//! drives any [`ScenarioExecutor`], and the I/O lives in `probe-client`.
//!
//! - [`retry`] - bounded fixed-delay retry as a value object
//! - [`enumerate`] - the combinatorial scenario space
//! - [`placement`] - seeded choice of cluster locations
//! - [`ledger`] - the shared pending/passed/failed/skipped partition
//! - [`runner`] - wave-barrier scheduling with a concurrency cap
//! - [`report`] - the final verdict

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod enumerate;
pub mod ledger;
pub mod placement;
pub mod report;
pub mod retry;
pub mod runner;

pub use enumerate::{EnumerationSpace, ScenarioEnumerator};
pub use ledger::{LedgerError, LedgerSnapshot, OutcomeLedger};
pub use placement::{choose_placement, distinct_locations, is_placeable, Placement};
pub use report::{AggregateFailure, FailedScenario, Report, ResultAggregator, Verdict};
pub use retry::{RetryPolicy, DEFAULT_FIXED_DELAY, DEFAULT_MAX_ELAPSED};
pub use runner::{ConcurrentRunner, ScenarioExecutor, DEFAULT_CONCURRENCY};
