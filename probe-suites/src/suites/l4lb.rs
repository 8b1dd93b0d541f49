//! Load balancer distribution.
//!
//! Deploys several apps behind one VIP, waits until each app and the VIP
//! answer `/ping`, then fetches `/test_uuid` through the VIP from many
//! concurrent tasks. Every backend must answer at least once.

use super::{check_from, Suite, SuiteReport};
use crate::assertions::{assert_token_distribution, AssertionResult};
use crate::harness::{ClusterHarness, HarnessError, L4LB_VIP};
use probe_client::{Deployment, WorkloadDriver};
use probe_types::ProbeError;
use std::collections::BTreeSet;
use tokio::task::JoinSet;

/// Apps sharing the VIP.
pub const NUM_APPS: usize = 5;

/// Concurrent fetches through the VIP.
pub const NUM_REQUESTS: usize = NUM_APPS * 4;

/// Deploy the backends, check distribution, tear down.
pub async fn run(harness: &ClusterHarness) -> Result<SuiteReport, HarnessError> {
    if !harness.topology.lb_enabled {
        return Ok(SuiteReport::skipped(Suite::L4lb, "load balancer disabled"));
    }

    let apps = (0..NUM_APPS)
        .map(|_| harness.template.host_app(Some(L4LB_VIP)))
        .collect();
    let deployments = match harness.driver.deploy_all(apps).await {
        Ok(d) => d,
        Err(e) => {
            return Ok(SuiteReport::from_checks(
                Suite::L4lb,
                vec![AssertionResult::fail("deploy VIP backends", &e.to_string())],
            ))
        }
    };

    let checks = distribution_checks(harness, &deployments).await;
    WorkloadDriver::teardown_all(deployments).await;
    Ok(SuiteReport::from_checks(Suite::L4lb, checks))
}

async fn distribution_checks(harness: &ClusterHarness, deployments: &[Deployment]) -> Vec<AssertionResult> {
    let probe = &harness.probe;
    let vip_url = harness.l4lb_vip_url.trim_end_matches('/');
    let mut checks = Vec::new();

    for d in deployments {
        let result = match d.service_points().first() {
            Some(sp) => probe
                .fetch_json_retrying(&format!("{}/ping", sp.base_url()), harness.fetch_max_elapsed)
                .await
                .map(drop),
            None => Err(ProbeError::ProbeUnreachable("app has no endpoints".into())),
        };
        checks.push(check_from(&format!("app {} answers /ping", d.app_id()), result));

        let via_vip = probe
            .fetch_json_retrying(&format!("{}/ping", vip_url), harness.fetch_max_elapsed)
            .await
            .map(drop);
        checks.push(check_from("VIP answers /ping", via_vip));
    }
    if checks.iter().any(|c| !c.passed) {
        return checks;
    }

    let mut tasks = JoinSet::new();
    for _ in 0..NUM_REQUESTS {
        let probe = probe.clone();
        let url = format!("{}/test_uuid", vip_url);
        let max_elapsed = harness.fetch_max_elapsed;
        tasks.spawn(async move { probe.fetch_json_retrying(&url, max_elapsed).await });
    }

    let mut received = Vec::with_capacity(NUM_REQUESTS);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(body)) => match body.get("test_uuid").and_then(|v| v.as_str()) {
                Some(token) => received.push(token.to_string()),
                None => tracing::warn!(body = %body, "VIP answer without test_uuid"),
            },
            Ok(Err(e)) => tracing::warn!("VIP request failed: {}", e),
            Err(e) => tracing::error!("VIP request task did not complete: {}", e),
        }
    }
    tracing::info!(responses = received.len(), "collected VIP responses");

    let expected: BTreeSet<String> = deployments.iter().map(|d| d.token().to_string()).collect();
    checks.push(assert_token_distribution(&expected, &received));
    checks
}
