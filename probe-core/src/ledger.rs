//! Shared outcome ledger.
//!
//! One entry per scenario, keyed by index. The four collections of the
//! run (pending, passed, failed, skipped) are views over the entries'
//! outcomes, so moving a scenario from pending to a settled state is a
//! single write under the entry's shard lock: removal from one collection
//! and insertion into another cannot be observed apart.

use dashmap::DashMap;
use probe_types::{Outcome, ProbeError, Scenario};
use thiserror::Error;

/// Errors from ledger transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Two scenarios share an index.
    #[error("duplicate scenario index {0}")]
    DuplicateIndex(usize),

    /// No scenario with this index was registered.
    #[error("unknown scenario index {0}")]
    UnknownIndex(usize),

    /// The scenario already left `Pending`.
    #[error("scenario {index} already settled as {state}")]
    AlreadySettled {
        /// Scenario index.
        index: usize,
        /// Label of the existing outcome.
        state: &'static str,
    },

    /// Attempted to move a scenario back to `Pending`.
    #[error("cannot settle scenario {0} as pending")]
    PendingTarget(usize),
}

#[derive(Debug)]
struct LedgerEntry {
    scenario: Scenario,
    outcome: Outcome,
}

/// Concurrent pending/passed/failed/skipped partition of a scenario set.
#[derive(Debug)]
pub struct OutcomeLedger {
    entries: DashMap<usize, LedgerEntry>,
}

impl OutcomeLedger {
    /// Register every scenario as pending.
    pub fn new(scenarios: impl IntoIterator<Item = Scenario>) -> Result<Self, LedgerError> {
        let entries = DashMap::new();
        for scenario in scenarios {
            let index = scenario.index();
            let entry = LedgerEntry {
                scenario,
                outcome: Outcome::Pending,
            };
            if entries.insert(index, entry).is_some() {
                return Err(LedgerError::DuplicateIndex(index));
            }
        }
        Ok(Self { entries })
    }

    /// Number of registered scenarios.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no scenario is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move scenario `index` from pending to `outcome`.
    ///
    /// Emits the `VIP_TEST <STATE>` transition line.
    pub fn settle(&self, index: usize, outcome: Outcome) -> Result<(), LedgerError> {
        if !outcome.is_settled() {
            return Err(LedgerError::PendingTarget(index));
        }

        let mut entry = self
            .entries
            .get_mut(&index)
            .ok_or(LedgerError::UnknownIndex(index))?;

        if entry.outcome.is_settled() {
            return Err(LedgerError::AlreadySettled {
                index,
                state: entry.outcome.label(),
            });
        }

        match &outcome {
            Outcome::Failed { error } => tracing::warn!(
                index,
                state = outcome.label(),
                error = %error,
                "VIP_TEST {} {}",
                outcome.label(),
                entry.scenario
            ),
            _ => tracing::info!(
                index,
                state = outcome.label(),
                "VIP_TEST {} {}",
                outcome.label(),
                entry.scenario
            ),
        }

        entry.outcome = outcome;
        Ok(())
    }

    /// Record a verified scenario.
    pub fn mark_passed(&self, index: usize) -> Result<(), LedgerError> {
        self.settle(index, Outcome::Passed)
    }

    /// Record a scenario that ended with `error`.
    pub fn mark_failed(&self, index: usize, error: impl ToString) -> Result<(), LedgerError> {
        self.settle(
            index,
            Outcome::Failed {
                error: error.to_string(),
            },
        )
    }

    /// Record a scenario that cannot run on this cluster.
    pub fn mark_skipped(&self, index: usize, reason: impl ToString) -> Result<(), LedgerError> {
        self.settle(
            index,
            Outcome::Skipped {
                reason: reason.to_string(),
            },
        )
    }

    /// Settle from an execution result: `Ok` passes, structural errors skip,
    /// everything else fails.
    pub fn record(&self, index: usize, result: Result<(), ProbeError>) -> Result<(), LedgerError> {
        match result {
            Ok(()) => self.mark_passed(index),
            Err(e) if e.is_structural() => self.mark_skipped(index, e),
            Err(e) => self.mark_failed(index, e),
        }
    }

    /// Current outcome of scenario `index`.
    pub fn outcome(&self, index: usize) -> Option<Outcome> {
        self.entries.get(&index).map(|e| e.outcome.clone())
    }

    /// Consistent copy of the partition, each collection ordered by index.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut snapshot = LedgerSnapshot::default();
        for entry in self.entries.iter() {
            let scenario = entry.scenario.clone();
            match &entry.outcome {
                Outcome::Pending => snapshot.pending.push(scenario),
                Outcome::Passed => snapshot.passed.push(scenario),
                Outcome::Failed { error } => snapshot.failed.push((scenario, error.clone())),
                Outcome::Skipped { reason } => snapshot.skipped.push((scenario, reason.clone())),
            }
        }
        snapshot.pending.sort_by_key(Scenario::index);
        snapshot.passed.sort_by_key(Scenario::index);
        snapshot.failed.sort_by_key(|(s, _)| s.index());
        snapshot.skipped.sort_by_key(|(s, _)| s.index());
        snapshot
    }
}

/// The four collections of a run at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Not yet settled.
    pub pending: Vec<Scenario>,
    /// Routing verified.
    pub passed: Vec<Scenario>,
    /// Failed, with the last error.
    pub failed: Vec<(Scenario, String)>,
    /// Skipped, with the reason.
    pub skipped: Vec<(Scenario, String)>,
}

impl LedgerSnapshot {
    /// Total number of scenarios across all four collections.
    pub fn total(&self) -> usize {
        self.pending.len() + self.passed.len() + self.failed.len() + self.skipped.len()
    }
}
