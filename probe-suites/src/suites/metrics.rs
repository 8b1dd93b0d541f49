//! Metrics API on every node, and container metrics of a running app.

use super::{Suite, SuiteReport};
use crate::assertions::{
    assert_app_labels, assert_node_datapoints, assert_node_dimensions, assert_ping_ok, executor_runs,
    AssertionResult,
};
use crate::harness::{ClusterHarness, HarnessError};
use probe_client::app::statsd_emitter_app;
use probe_client::MetricsError;
use probe_core::RetryPolicy;

/// Executor name of the metrics emitter app.
pub const STATSD_EMITTER: &str = "statsd-emitter";

/// Ping, node and container checks.
pub async fn run(harness: &ClusterHarness) -> Result<SuiteReport, HarnessError> {
    let mut checks = ping_checks(harness).await;
    checks.extend(node_checks(harness).await);
    checks.extend(container_checks(harness).await);
    Ok(SuiteReport::from_checks(Suite::Metrics, checks))
}

/// Every node's metrics service answers `ok`.
pub async fn ping_checks(harness: &ClusterHarness) -> Vec<AssertionResult> {
    let mut checks = Vec::new();
    for node in harness.topology.all_nodes() {
        checks.push(match harness.metrics.ping(node).await {
            Ok(ping) => assert_ping_ok(node, &ping),
            Err(e) => AssertionResult::fail(&format!("metrics ping on {}", node), &e.to_string()),
        });
    }
    checks
}

/// Every node reports well-formed datapoints and its cluster id.
pub async fn node_checks(harness: &ClusterHarness) -> Vec<AssertionResult> {
    let mut checks = Vec::new();
    for node in harness.topology.all_nodes() {
        match harness.metrics.node(node).await {
            Ok(response) => {
                checks.push(assert_node_datapoints(node, &response));
                checks.push(assert_node_dimensions(node, &response));
            }
            Err(e) => checks.push(AssertionResult::fail(
                &format!("node metrics on {}", node),
                &e.to_string(),
            )),
        }
    }
    checks
}

/// Deploy the statsd emitter and wait for its container metrics to show
/// up on the agent it runs on.
pub async fn container_checks(harness: &ClusterHarness) -> Vec<AssertionResult> {
    let deployment = match harness.driver.deploy(statsd_emitter_app()).await {
        Ok(d) => d,
        Err(e) => return vec![AssertionResult::fail("deploy statsd-emitter", &e.to_string())],
    };

    let hosts: Vec<String> = deployment
        .service_points()
        .iter()
        .map(|sp| sp.host.clone())
        .collect();
    let mut checks = vec![if hosts.len() == 1 {
        AssertionResult::pass("statsd-emitter deployed exactly once")
    } else {
        AssertionResult::fail(
            "statsd-emitter deployed exactly once",
            &format!("{} instances", hosts.len()),
        )
    }];

    let policy: RetryPolicy<AssertionResult, MetricsError> =
        RetryPolicy::fixed(harness.fixed_delay, harness.metrics_latency)
            .retry_on_result(|r: &AssertionResult| !r.passed);
    let hosts = &hosts;
    let found = policy
        .run(move || async move { find_emitter(harness, hosts).await })
        .await;
    checks.push(match found {
        Ok(check) => check,
        Err(e) => AssertionResult::fail("statsd-emitter container metrics", &e.to_string()),
    });

    if let Err(e) = deployment.teardown().await {
        tracing::warn!("teardown of statsd-emitter failed: {}", e);
    }
    checks
}

async fn find_emitter(harness: &ClusterHarness, hosts: &[String]) -> Result<AssertionResult, MetricsError> {
    let metrics = &harness.metrics;
    for host in hosts {
        for id in metrics.containers(host).await? {
            let detail = match metrics.container(host, &id).await {
                Ok(detail) => detail,
                Err(MetricsError::Status { .. }) => continue,
                Err(e) => return Err(e),
            };
            let runs_emitter = detail
                .executor_id()
                .map_or(false, |exec| executor_runs(exec, STATSD_EMITTER));
            if !runs_emitter {
                continue;
            }

            tracing::debug!(host = %host, container = %id, "found statsd-emitter container");
            return match metrics.container_app(host, &id).await {
                Ok(app) => Ok(assert_app_labels(&id, &app)),
                Err(MetricsError::Status { .. }) => Ok(AssertionResult::pass(&format!(
                    "container {} runs statsd-emitter",
                    id
                ))),
                Err(e) => Err(e),
            };
        }
    }
    Ok(AssertionResult::fail(
        "statsd-emitter container metrics",
        "no container with a statsd-emitter executor yet",
    ))
}
