//! Run suites against the configured cluster.

use anyhow::{Context, Result};
use probe_client::http::build_client;
use probe_client::{MarathonClient, MetricsClient, Orchestrator, WorkloadDriver};
use probe_suites::{ClusterHarness, Suite};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

/// Build the harness described by `config`.
pub fn harness(config: &Config) -> Result<ClusterHarness> {
    let http = build_client(
        config.cluster.auth_token.as_deref(),
        Duration::from_secs(config.retry.probe_timeout_secs),
    )
    .context("Failed to build HTTP client")?;

    let orchestrator: Arc<dyn Orchestrator> =
        Arc::new(MarathonClient::new(config.marathon(), http.clone()));
    let driver = WorkloadDriver::new(orchestrator.clone())
        .with_deploy_timeout(Duration::from_secs(config.orchestration.deploy_timeout_secs))
        .with_poll_interval(Duration::from_millis(config.orchestration.poll_interval_ms));

    Ok(ClusterHarness::new(config.topology(), orchestrator, http.clone())
        .with_driver(driver)
        .with_template(config.template())
        .with_enumeration(config.enumeration())
        .with_concurrency(config.runner.concurrency)
        .with_retry(config.retry.fixed_delay(), config.retry.max_elapsed())
        .with_fetch_max_elapsed(Duration::from_secs(config.retry.fetch_max_elapsed_secs))
        .with_metrics(
            MetricsClient::new(http, config.metrics.port),
            Duration::from_secs(config.metrics.latency_secs),
        ))
}

/// Run the suite command. Returns whether every suite passed.
pub async fn run(config: &Config, suites: &[Suite]) -> Result<bool> {
    let harness = harness(config)?;
    if harness.topology().agents.is_empty() {
        println!("Warning: no agents configured, agent-bound suites will skip or fail");
        println!();
    }

    let reports = harness
        .run_suites(suites)
        .await
        .context("Suite aborted")?;

    let mut failed = Vec::new();
    for report in &reports {
        print!("{}", report);
        if !report.passed() {
            failed.push(report.suite);
        }
    }

    println!();
    if failed.is_empty() {
        println!("=== {} suite(s) passed ===", reports.len());
    } else {
        let names: Vec<&str> = failed.iter().map(|s| s.name()).collect();
        println!(
            "=== {} of {} suite(s) failed: {} ===",
            failed.len(),
            reports.len(),
            names.join(", ")
        );
    }
    Ok(failed.is_empty())
}
