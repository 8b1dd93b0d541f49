//! Overlay containers reach each other by container IP.

use super::{check_from, Suite, SuiteReport};
use crate::assertions::AssertionResult;
use crate::harness::{ClusterHarness, HarnessError};
use probe_core::distinct_locations;
use probe_types::ProbeError;

/// Agents needed to place the two instances apart.
pub const REQUIRED_AGENTS: usize = 2;

/// Run two overlay instances on distinct agents and ping the second from
/// inside the first.
pub async fn run(harness: &ClusterHarness) -> Result<SuiteReport, HarnessError> {
    let available = distinct_locations(&harness.topology.agents).len();
    if available < REQUIRED_AGENTS {
        let reason = ProbeError::InsufficientCapacity {
            required: REQUIRED_AGENTS,
            available,
        };
        return Ok(SuiteReport::skipped(Suite::IpPerContainer, reason.to_string()));
    }

    let app = harness.template.ip_per_container_app();
    let container_port = app
        .definition
        .container_port()
        .unwrap_or(harness.template.container_port);

    let deployment = match harness.driver.deploy(app).await {
        Ok(d) => d,
        Err(e) => {
            return Ok(SuiteReport::from_checks(
                Suite::IpPerContainer,
                vec![AssertionResult::fail("deploy overlay instances", &e.to_string())],
            ))
        }
    };

    let points = deployment.service_points();
    let result = match points.get(1).and_then(|sp| sp.ip.as_deref()) {
        Some(target_ip) => {
            let cmd = harness
                .probe
                .routing_command(&format!("{}:{}", target_ip, container_port), "/ping");
            tracing::info!(target = %target_ip, "pinging second instance through first");
            harness.probe.ensure_command(&points[..1], &cmd).await.map(drop)
        }
        None => Err(ProbeError::ProbeUnreachable(format!(
            "second instance has no container ip ({} endpoints)",
            points.len()
        ))),
    };
    let check = check_from("instance 0 reaches instance 1 by container ip", result);

    if let Err(e) = deployment.teardown().await {
        tracing::warn!("teardown of overlay instances failed: {}", e);
    }
    Ok(SuiteReport::from_checks(Suite::IpPerContainer, vec![check]))
}
