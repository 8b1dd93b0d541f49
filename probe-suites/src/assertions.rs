//! Assertion helpers for the cluster suites.
//!
//! These are pure functions over API responses. They take the observed
//! state as input and return pass/fail with details, so a suite can report
//! every check instead of stopping at the first failure.

use probe_client::metrics::{MetricsResponse, PingResponse};
use probe_client::overlay::Overlay;
use std::collections::BTreeSet;
use std::fmt;

/// Rule number the load balancer installs (`9999: from 9.0.0.0/8 lookup 42`).
pub const MINUTEMAN_RULE: &str = "9999";

/// Result of an assertion check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    /// Whether the assertion passed
    pub passed: bool,
    /// Description of what was checked
    pub description: String,
    /// Details on failure
    pub failure_details: Option<String>,
}

impl AssertionResult {
    /// Create a passing result.
    pub fn pass(description: &str) -> Self {
        Self {
            passed: true,
            description: description.into(),
            failure_details: None,
        }
    }

    /// Create a failing result.
    pub fn fail(description: &str, details: &str) -> Self {
        Self {
            passed: false,
            description: description.into(),
            failure_details: Some(details.into()),
        }
    }
}

impl fmt::Display for AssertionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure_details {
            None => write!(f, "PASS {}", self.description),
            Some(details) => write!(f, "FAIL {} -- {}", self.description, details),
        }
    }
}

/// Every overlay on `node` is healthy, and there is at least one.
pub fn assert_overlays_ok(node: &str, overlays: &[Overlay]) -> AssertionResult {
    let description = format!("overlays healthy on {}", node);
    if overlays.is_empty() {
        return AssertionResult::fail(&description, "node reports no overlays");
    }
    let bad: Vec<String> = overlays
        .iter()
        .filter(|o| !o.is_ok())
        .map(|o| format!("{}={}", o.info.name, o.state.status))
        .collect();
    if bad.is_empty() {
        AssertionResult::pass(&description)
    } else {
        AssertionResult::fail(&description, &bad.join(", "))
    }
}

/// The metrics service on `node` answers `ok`.
pub fn assert_ping_ok(node: &str, ping: &PingResponse) -> AssertionResult {
    let description = format!("metrics ping on {}", node);
    if ping.ok {
        AssertionResult::pass(&description)
    } else {
        AssertionResult::fail(&description, "ping answered ok=false")
    }
}

/// `node` returns datapoints, each named, with a non-empty `path` tag on
/// filesystem metrics.
pub fn assert_node_datapoints(node: &str, response: &MetricsResponse) -> AssertionResult {
    let description = format!("node datapoints on {}", node);
    let Some(datapoints) = &response.datapoints else {
        return AssertionResult::fail(&description, "\"datapoints\" not found in response");
    };

    for (i, dp) in datapoints.iter().enumerate() {
        let Some(name) = &dp.name else {
            return AssertionResult::fail(&description, &format!("datapoint {} has no name", i));
        };
        if !name.contains("filesystem") {
            continue;
        }
        let path = dp.tags.as_ref().and_then(|t| t.get("path"));
        match path {
            Some(p) if !p.is_empty() => {}
            Some(_) => {
                return AssertionResult::fail(&description, &format!("empty \"path\" tag on {}", name))
            }
            None => {
                return AssertionResult::fail(&description, &format!("no \"path\" tag on {}", name))
            }
        }
    }
    AssertionResult::pass(&description)
}

/// `node` reports a non-empty `cluster_id` dimension.
pub fn assert_node_dimensions(node: &str, response: &MetricsResponse) -> AssertionResult {
    let description = format!("node dimensions on {}", node);
    let Some(dimensions) = &response.dimensions else {
        return AssertionResult::fail(&description, "\"dimensions\" not found in response");
    };
    match dimensions.cluster_id.as_deref() {
        Some(id) if !id.is_empty() => AssertionResult::pass(&description),
        Some(_) => AssertionResult::fail(&description, "cluster_id is empty"),
        None => AssertionResult::fail(&description, "cluster_id not found in dimensions"),
    }
}

/// Whether an executor id names `app`, e.g.
/// `statsd-emitter.a094eed0-b017-11e6-a972-b2bcad3866cb` names `statsd-emitter`.
pub fn executor_runs(executor_id: &str, app: &str) -> bool {
    executor_id.split('.').any(|segment| segment == app)
}

/// An app metrics response carries `labels`.
pub fn assert_app_labels(container_id: &str, response: &MetricsResponse) -> AssertionResult {
    let description = format!("app metrics labels for container {}", container_id);
    if response.labels.is_some() {
        AssertionResult::pass(&description)
    } else {
        AssertionResult::fail(&description, "\"labels\" not found in response")
    }
}

/// The tokens received through the VIP are exactly the expected ones.
pub fn assert_token_distribution(expected: &BTreeSet<String>, received: &[String]) -> AssertionResult {
    let description = format!("load balanced across all {} backends", expected.len());
    let seen: BTreeSet<String> = received.iter().cloned().collect();
    if &seen == expected {
        return AssertionResult::pass(&description);
    }

    let missing: Vec<&String> = expected.difference(&seen).collect();
    let unexpected: Vec<&String> = seen.difference(expected).collect();
    AssertionResult::fail(
        &description,
        &format!(
            "{} responses hit {} backends; missing {:?}, unexpected {:?}",
            received.len(),
            seen.len(),
            missing,
            unexpected
        ),
    )
}

/// `ip rule` output has no load balancer rule.
pub fn assert_no_minuteman_rule(ip_rule_output: &str) -> AssertionResult {
    let description = "load balancer ip rule absent";
    match ip_rule_output
        .lines()
        .find(|line| line.contains(MINUTEMAN_RULE))
    {
        None => AssertionResult::pass(description),
        Some(line) => AssertionResult::fail(description, &format!("found rule: {}", line.trim())),
    }
}
