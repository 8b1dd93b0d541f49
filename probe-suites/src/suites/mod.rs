//! Cluster suites.
//!
//! | Suite | Checks | Needs |
//! |-------|--------|-------|
//! | `vip` | every VIP scenario routes to its origin | load balancer, agents |
//! | `l4lb` | one VIP spreads over all its backends | load balancer |
//! | `overlay` | overlay networks healthy on every node | - |
//! | `metrics` | metrics API on every node, container metrics | agents |
//! | `ip-per-container` | overlay containers reach each other by IP | 2 agents |
//! | `minuteman` | no load balancer rule when it is disabled | local `ip` |

pub mod ip_per_container;
pub mod l4lb;
pub mod metrics;
pub mod minuteman;
pub mod overlay;
pub mod vip;

use crate::assertions::AssertionResult;
use crate::harness::{ClusterHarness, HarnessError};
use probe_core::{Report, Verdict};
use std::fmt;
use std::str::FromStr;

/// The suites the harness can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suite {
    /// VIP routing permutations.
    Vip,
    /// Load balancer distribution.
    L4lb,
    /// Overlay health.
    Overlay,
    /// Metrics API.
    Metrics,
    /// IP-per-container reachability.
    IpPerContainer,
    /// Load balancer rule absent when disabled.
    Minuteman,
}

impl Suite {
    /// Every suite, in the order `all` runs them.
    pub const ALL: [Suite; 6] = [
        Suite::Overlay,
        Suite::Minuteman,
        Suite::Metrics,
        Suite::IpPerContainer,
        Suite::L4lb,
        Suite::Vip,
    ];

    /// Command-line name.
    pub fn name(self) -> &'static str {
        match self {
            Suite::Vip => "vip",
            Suite::L4lb => "l4lb",
            Suite::Overlay => "overlay",
            Suite::Metrics => "metrics",
            Suite::IpPerContainer => "ip-per-container",
            Suite::Minuteman => "minuteman",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Suite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Suite::ALL
            .into_iter()
            .find(|suite| suite.name() == s)
            .ok_or_else(|| format!("unknown suite: {}", s))
    }
}

/// What one suite observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    /// Suite that ran.
    pub suite: Suite,
    /// Individual checks, in the order they ran.
    pub checks: Vec<AssertionResult>,
    /// Per-scenario outcome of scenario-driven suites.
    pub scenarios: Option<Report>,
    /// Why the suite did not run.
    pub skipped: Option<String>,
}

impl SuiteReport {
    /// Report of a suite that produced checks.
    pub fn from_checks(suite: Suite, checks: Vec<AssertionResult>) -> Self {
        Self {
            suite,
            checks,
            scenarios: None,
            skipped: None,
        }
    }

    /// Report of a suite that did not apply to this cluster.
    pub fn skipped(suite: Suite, reason: impl Into<String>) -> Self {
        Self {
            suite,
            checks: Vec::new(),
            scenarios: None,
            skipped: Some(reason.into()),
        }
    }

    /// True unless a check or a scenario failed. Skips pass.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
            && self
                .scenarios
                .as_ref()
                .map_or(true, |r| r.verdict() == Verdict::Pass)
    }

    /// Failed checks.
    pub fn failures(&self) -> impl Iterator<Item = &AssertionResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.skipped {
            return writeln!(f, "[{}] SKIPPED: {}", self.suite, reason);
        }
        let status = if self.passed() { "PASSED" } else { "FAILED" };
        writeln!(f, "[{}] {}", self.suite, status)?;
        for check in &self.checks {
            writeln!(f, "  {}", check)?;
        }
        if let Some(report) = &self.scenarios {
            for line in report.to_string().lines() {
                writeln!(f, "  {}", line)?;
            }
        }
        Ok(())
    }
}

impl ClusterHarness {
    /// Run one suite.
    pub async fn run_suite(&self, suite: Suite) -> Result<SuiteReport, HarnessError> {
        tracing::info!(suite = suite.name(), "running suite");
        let report = match suite {
            Suite::Vip => vip::run(self).await?,
            Suite::L4lb => l4lb::run(self).await?,
            Suite::Overlay => overlay::run(self).await?,
            Suite::Metrics => metrics::run(self).await?,
            Suite::IpPerContainer => ip_per_container::run(self).await?,
            Suite::Minuteman => minuteman::run(self).await?,
        };
        if let Some(reason) = &report.skipped {
            tracing::info!(suite = suite.name(), reason = %reason, "suite skipped");
        } else {
            tracing::info!(suite = suite.name(), passed = report.passed(), "suite finished");
        }
        Ok(report)
    }

    /// Run `suites` in order, collecting every report.
    pub async fn run_suites(&self, suites: &[Suite]) -> Result<Vec<SuiteReport>, HarnessError> {
        let mut reports = Vec::with_capacity(suites.len());
        for &suite in suites {
            reports.push(self.run_suite(suite).await?);
        }
        Ok(reports)
    }
}

/// Turn a probe failure into a failed check.
pub(crate) fn check_from(description: &str, result: Result<(), probe_types::ProbeError>) -> AssertionResult {
    match result {
        Ok(()) => AssertionResult::pass(description),
        Err(e) => AssertionResult::fail(description, &e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_names_roundtrip() {
        for suite in Suite::ALL {
            assert_eq!(suite.name().parse::<Suite>().unwrap(), suite);
        }
        assert!("bogus".parse::<Suite>().is_err());
    }

    #[test]
    fn skipped_report_passes() {
        let r = SuiteReport::skipped(Suite::L4lb, "load balancer disabled");
        assert!(r.passed());
        assert_eq!(r.to_string(), "[l4lb] SKIPPED: load balancer disabled\n");
    }

    #[test]
    fn one_failed_check_fails_the_suite() {
        let r = SuiteReport::from_checks(
            Suite::Overlay,
            vec![AssertionResult::pass("m1"), AssertionResult::fail("a1", "down")],
        );
        assert!(!r.passed());
        assert_eq!(r.failures().count(), 1);
        assert!(r.to_string().starts_with("[overlay] FAILED\n"));
    }
}
