//! Settled state of a scenario.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a scenario stands.
///
/// Starts as `Pending` and moves exactly once to one of the other three.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Outcome {
    /// Not yet executed.
    Pending,
    /// Routing verified.
    Passed,
    /// Execution ended with an unrecovered error.
    Failed {
        /// Last error observed.
        error: String,
    },
    /// Structurally impossible on this cluster.
    Skipped {
        /// Why it could not run.
        reason: String,
    },
}

impl Outcome {
    /// True once the outcome is no longer `Pending`.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }

    /// Upper-case label used in transition log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Pending => "PENDING",
            Outcome::Passed => "PASSED",
            Outcome::Failed { .. } => "FAILED",
            Outcome::Skipped { .. } => "SKIPPED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Failed { error } => write!(f, "FAILED ({})", error),
            Outcome::Skipped { reason } => write!(f, "SKIPPED ({})", reason),
            other => f.write_str(other.label()),
        }
    }
}
