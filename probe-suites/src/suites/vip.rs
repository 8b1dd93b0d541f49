//! VIP routing permutations.
//!
//! For every scenario: pin an origin app carrying the VIP and a proxy app
//! to agents chosen by the scenario's seed, then check from inside the
//! proxy that the routable address answers with the origin's token.

use super::{Suite, SuiteReport};
use crate::harness::{ClusterHarness, HarnessError};
use async_trait::async_trait;
use probe_client::{RoutabilityProbe, WorkloadDriver, WorkloadTemplate};
use probe_core::{
    choose_placement, distinct_locations, ConcurrentRunner, ResultAggregator, ScenarioEnumerator, ScenarioExecutor,
};
use probe_types::{ProbeError, Scenario};
use std::sync::Arc;

/// Deploys and verifies one VIP scenario.
#[derive(Debug, Clone)]
pub struct VipExecutor {
    driver: WorkloadDriver,
    probe: RoutabilityProbe,
    template: WorkloadTemplate,
    agents: Vec<String>,
}

impl VipExecutor {
    /// Executor placing workloads on `agents`.
    pub fn new(
        driver: WorkloadDriver,
        probe: RoutabilityProbe,
        template: WorkloadTemplate,
        agents: Vec<String>,
    ) -> Self {
        Self {
            driver,
            probe,
            template,
            agents,
        }
    }
}

#[async_trait]
impl ScenarioExecutor for VipExecutor {
    async fn execute(&self, scenario: &Scenario) -> Result<(), ProbeError> {
        let placement = choose_placement(scenario, &self.agents)?;
        tracing::debug!(
            index = scenario.index(),
            origin = %placement.origin,
            proxy = %placement.proxy,
            "placed scenario"
        );

        let origin = self.template.origin_app(scenario, &placement.origin);
        let proxy = self.template.proxy_app(scenario, &placement.proxy);
        let probe = &self.probe;

        self.driver
            .with_pair(origin, proxy, |endpoints| async move {
                probe
                    .verify(scenario.routable_address(), &endpoints.origin_token, &endpoints.proxy)
                    .await
            })
            .await
    }
}

/// Run every scenario of the harness's space.
pub async fn run(harness: &ClusterHarness) -> Result<SuiteReport, HarnessError> {
    if !harness.topology.lb_enabled {
        return Ok(SuiteReport::skipped(Suite::Vip, "load balancer disabled"));
    }

    let scenarios = ScenarioEnumerator::new(harness.enumeration.clone()).enumerate();
    let agents = distinct_locations(&harness.topology.agents);
    tracing::info!(
        scenarios = scenarios.len(),
        agents = agents.len(),
        concurrency = harness.concurrency,
        "starting VIP scenarios"
    );

    let runner = ConcurrentRunner::new(harness.concurrency).with_available_locations(agents.len());
    let executor = Arc::new(VipExecutor::new(
        harness.driver.clone(),
        harness.probe.clone(),
        harness.template.clone(),
        agents,
    ));

    let snapshot = runner.run(scenarios, executor).await?;
    let report = ResultAggregator::from_snapshot(snapshot);
    report.log();

    Ok(SuiteReport {
        suite: Suite::Vip,
        checks: Vec::new(),
        scenarios: Some(report),
        skipped: None,
    })
}
