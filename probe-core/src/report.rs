//! Final verdict over a scenario run.

use crate::ledger::LedgerSnapshot;
use probe_types::Scenario;
use std::fmt;
use thiserror::Error;

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No scenario failed. Skips do not count.
    Pass,
    /// At least one scenario failed.
    Fail,
}

/// One failed scenario as shown in the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedScenario {
    /// Scenario index.
    pub index: usize,
    /// Human-readable identity.
    pub description: String,
    /// Last error observed.
    pub error: String,
}

/// Raised when a run's verdict is [`Verdict::Fail`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} of {total} scenarios failed: [{}]", .failures.len(), failed_indices(.failures))]
pub struct AggregateFailure {
    /// Scenarios in the run.
    pub total: usize,
    /// Every failed scenario, ordered by index.
    pub failures: Vec<FailedScenario>,
}

fn failed_indices(failures: &[FailedScenario]) -> String {
    failures
        .iter()
        .map(|f| f.index.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordered pass/fail/skip summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    passed: Vec<Scenario>,
    failed: Vec<(Scenario, String)>,
    skipped: Vec<(Scenario, String)>,
}

impl Report {
    /// Pass iff nothing failed.
    pub fn verdict(&self) -> Verdict {
        if self.failed.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// Passed scenarios by index.
    pub fn passed(&self) -> &[Scenario] {
        &self.passed
    }

    /// Failed scenarios with their last error, by index.
    pub fn failed(&self) -> &[(Scenario, String)] {
        &self.failed
    }

    /// Skipped scenarios with the reason, by index.
    pub fn skipped(&self) -> &[(Scenario, String)] {
        &self.skipped
    }

    /// Scenarios covered by the report.
    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len() + self.skipped.len()
    }

    /// One-line tally, e.g. `VIP_TEST SUMMARY FAIL passed=34 failed=1 skipped=1`.
    pub fn summary_line(&self) -> String {
        let verdict = match self.verdict() {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        };
        format!(
            "VIP_TEST SUMMARY {} passed={} failed={} skipped={}",
            verdict,
            self.passed.len(),
            self.failed.len(),
            self.skipped.len()
        )
    }

    /// Log the tally. Per-scenario transitions are logged by the ledger.
    pub fn log(&self) {
        tracing::info!(total = self.total(), "{}", self.summary_line());
    }

    /// `Ok` on a passing verdict, the failure list otherwise.
    pub fn ensure_passed(&self) -> Result<(), AggregateFailure> {
        if self.verdict() == Verdict::Pass {
            return Ok(());
        }
        Err(AggregateFailure {
            total: self.total(),
            failures: self
                .failed
                .iter()
                .map(|(s, error)| FailedScenario {
                    index: s.index(),
                    description: s.to_string(),
                    error: error.clone(),
                })
                .collect(),
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "passed={} failed={} skipped={}",
            self.passed.len(),
            self.failed.len(),
            self.skipped.len()
        )?;
        for (s, error) in &self.failed {
            writeln!(f, "  FAILED  {} -- {}", s, error)?;
        }
        for (s, reason) in &self.skipped {
            writeln!(f, "  SKIPPED {} -- {}", s, reason)?;
        }
        Ok(())
    }
}

/// Builds [`Report`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    /// Summarize the three settled collections, ordering each by index.
    pub fn summarize(
        mut passed: Vec<Scenario>,
        mut failed: Vec<(Scenario, String)>,
        mut skipped: Vec<(Scenario, String)>,
    ) -> Report {
        passed.sort_by_key(Scenario::index);
        failed.sort_by_key(|(s, _)| s.index());
        skipped.sort_by_key(|(s, _)| s.index());
        Report {
            passed,
            failed,
            skipped,
        }
    }

    /// Summarize a runner snapshot. Anything still pending counts as failed.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Report {
        let LedgerSnapshot {
            pending,
            passed,
            mut failed,
            skipped,
        } = snapshot;
        failed.extend(
            pending
                .into_iter()
                .map(|s| (s, "never settled".to_string())),
        );
        Self::summarize(passed, failed, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::ScenarioEnumerator;

    fn all() -> Vec<Scenario> {
        ScenarioEnumerator::default().enumerate()
    }

    #[test]
    fn skips_do_not_fail_the_verdict() {
        let s = all();
        let report = ResultAggregator::summarize(
            vec![s[0].clone(), s[1].clone()],
            vec![],
            vec![(s[9].clone(), "one agent".into())],
        );
        assert_eq!(report.verdict(), Verdict::Pass);
        assert!(report.ensure_passed().is_ok());
    }

    #[test]
    fn failure_carries_count_and_identities() {
        let s = all();
        let report = ResultAggregator::summarize(
            vec![s[0].clone()],
            vec![
                (s[7].clone(), "routing mismatch".into()),
                (s[2].clone(), "probe unreachable".into()),
            ],
            vec![],
        );
        assert_eq!(report.verdict(), Verdict::Fail);

        let failure = report.ensure_passed().unwrap_err();
        assert_eq!(failure.total, 3);
        assert_eq!(failure.failures.len(), 2);
        assert_eq!(failure.failures[0].index, 2);
        assert_eq!(failure.failures[1].error, "routing mismatch");
        assert_eq!(failure.to_string(), "2 of 3 scenarios failed: [2, 7]");
    }

    #[test]
    fn summary_is_a_single_tally_line() {
        let s = all();
        let report = ResultAggregator::summarize(
            vec![s[0].clone(), s[1].clone()],
            vec![(s[4].clone(), "routing mismatch".into())],
            vec![(s[9].clone(), "one agent".into())],
        );
        assert_eq!(
            report.summary_line(),
            "VIP_TEST SUMMARY FAIL passed=2 failed=1 skipped=1"
        );
        assert!(!report.summary_line().contains('\n'));
    }

    #[test]
    fn report_is_ordered_by_index() {
        let s = all();
        let report = ResultAggregator::summarize(
            vec![s[5].clone(), s[1].clone(), s[3].clone()],
            vec![],
            vec![],
        );
        let order: Vec<usize> = report.passed().iter().map(Scenario::index).collect();
        assert_eq!(order, vec![1, 3, 5]);
    }

    #[test]
    fn pending_in_snapshot_counts_as_failed() {
        let s = all();
        let snapshot = LedgerSnapshot {
            pending: vec![s[4].clone()],
            passed: vec![s[0].clone()],
            failed: vec![],
            skipped: vec![],
        };
        let report = ResultAggregator::from_snapshot(snapshot);
        assert_eq!(report.verdict(), Verdict::Fail);
        assert_eq!(report.failed()[0].1, "never settled");
    }

    #[test]
    fn display_lists_failures() {
        let s = all();
        let report =
            ResultAggregator::summarize(vec![], vec![(s[1].clone(), "boom".into())], vec![]);
        let text = report.to_string();
        assert!(text.starts_with("passed=0 failed=1 skipped=0"));
        assert!(text.contains("FAILED  Scenario(index=1"));
        assert!(text.contains("-- boom"));
    }
}
