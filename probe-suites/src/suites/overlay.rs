//! Overlay network health on every node.

use super::{Suite, SuiteReport};
use crate::assertions::{assert_overlays_ok, AssertionResult};
use crate::harness::{ClusterHarness, HarnessError};
use probe_client::overlay::OverlayError;
use probe_core::RetryPolicy;

/// Check masters on the master port and every agent on the agent port,
/// retrying each node until healthy or out of budget.
pub async fn run(harness: &ClusterHarness) -> Result<SuiteReport, HarnessError> {
    let (master_port, agent_port) = harness.overlay_ports;
    let nodes = harness
        .topology
        .masters
        .iter()
        .map(|m| (m.as_str(), master_port))
        .chain(harness.topology.all_agents().map(|a| (a.as_str(), agent_port)));

    let mut checks = Vec::new();
    for (host, port) in nodes {
        checks.push(check_node(harness, host, port).await);
    }
    Ok(SuiteReport::from_checks(Suite::Overlay, checks))
}

async fn check_node(harness: &ClusterHarness, host: &str, port: u16) -> AssertionResult {
    let policy: RetryPolicy<AssertionResult, OverlayError> =
        RetryPolicy::fixed(harness.fixed_delay, harness.max_elapsed).retry_on_result(|r: &AssertionResult| !r.passed);

    let result = policy
        .run(move || async move {
            let overlays = harness.overlay.overlays(host, port).await?;
            Ok(assert_overlays_ok(host, &overlays))
        })
        .await;

    match result {
        Ok(check) => check,
        Err(e) => AssertionResult::fail(&format!("overlays healthy on {}", host), &e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::ClusterTopology;
    use crate::test_support::fake_cluster;
    use probe_client::MockOrchestrator;
    use std::sync::Arc;
    use std::time::Duration;

    fn harness(fake: &crate::test_support::FakeCluster, masters: Vec<String>, agents: Vec<String>) -> ClusterHarness {
        let topology = ClusterTopology {
            masters,
            agents,
            ..ClusterTopology::default()
        };
        ClusterHarness::new(topology, Arc::new(fake.orchestrator.clone()), reqwest::Client::new())
            .with_retry(Duration::from_millis(5), Duration::from_millis(60))
            .with_overlay_ports(fake.port(), fake.port())
    }

    #[tokio::test]
    async fn healthy_nodes_pass() {
        let fake = fake_cluster(MockOrchestrator::new()).await;
        let h = harness(&fake, vec!["127.0.0.1".into()], vec!["127.0.0.1".into()]);
        let report = run(&h).await.unwrap();
        assert!(report.passed());
        assert_eq!(report.checks.len(), 2);
    }

    #[tokio::test]
    async fn degraded_overlay_fails_after_retries() {
        let fake = fake_cluster(MockOrchestrator::new()).await;
        fake.degrade();
        let report = run(&harness(&fake, vec!["127.0.0.1".into()], vec![]))
            .await
            .unwrap();
        assert!(!report.passed());
        assert!(report.checks[0]
            .failure_details
            .as_deref()
            .unwrap()
            .contains("STATUS_CONFIGURING"));
    }

    #[tokio::test]
    async fn unreachable_node_fails() {
        let fake = fake_cluster(MockOrchestrator::new()).await;
        let h = harness(&fake, vec![], vec!["127.0.0.1".into()]).with_overlay_ports(1, 1);
        let report = run(&h).await.unwrap();
        assert!(!report.passed());
        assert!(report.checks[0]
            .failure_details
            .as_deref()
            .unwrap()
            .contains("connection failed"));
    }
}
