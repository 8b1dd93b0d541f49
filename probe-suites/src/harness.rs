//! Cluster harness: the clients and settings every suite runs against.

use probe_client::metrics::DEFAULT_METRICS_PORT;
use probe_client::overlay::{AGENT_PORT, MASTER_PORT};
use probe_client::{
    MetricsClient, Orchestrator, OverlayClient, RoutabilityProbe, WorkloadDriver, WorkloadTemplate,
};
use probe_core::{EnumerationSpace, LedgerError, DEFAULT_CONCURRENCY, DEFAULT_FIXED_DELAY, DEFAULT_MAX_ELAPSED};
use probe_types::ProbeError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// VIP shared by the load balancer distribution apps.
pub const L4LB_VIP: &str = "/l4lbtest:5000";

/// Address the distribution VIP resolves to inside the cluster.
pub const L4LB_VIP_URL: &str = "http://l4lbtest.marathon.l4lb.thisdcos.directory:5000";

/// Errors that stop a suite before it can produce a report.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The outcome ledger rejected a transition.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A probe failed outside any scenario.
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    /// A local command could not be run.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Nodes of the cluster under test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterTopology {
    /// Master hosts.
    pub masters: Vec<String>,
    /// Private agent hosts; scenario workloads are placed on these.
    pub agents: Vec<String>,
    /// Public agent hosts.
    pub public_agents: Vec<String>,
    /// Whether the layer-4 load balancer is enabled.
    pub lb_enabled: bool,
}

impl ClusterTopology {
    /// Private and public agents.
    pub fn all_agents(&self) -> impl Iterator<Item = &String> {
        self.agents.iter().chain(self.public_agents.iter())
    }

    /// Every node of the cluster.
    pub fn all_nodes(&self) -> impl Iterator<Item = &String> {
        self.masters.iter().chain(self.all_agents())
    }
}

/// High-level suite orchestrator.
///
/// Holds the cluster topology plus one client per cluster API. Suites
/// borrow it; nothing in it is mutated while suites run.
#[derive(Debug, Clone)]
pub struct ClusterHarness {
    pub(crate) topology: ClusterTopology,
    pub(crate) driver: WorkloadDriver,
    pub(crate) probe: RoutabilityProbe,
    pub(crate) metrics: MetricsClient,
    pub(crate) overlay: OverlayClient,
    pub(crate) template: WorkloadTemplate,
    pub(crate) enumeration: EnumerationSpace,
    pub(crate) concurrency: usize,
    pub(crate) fixed_delay: Duration,
    pub(crate) max_elapsed: Duration,
    pub(crate) fetch_max_elapsed: Duration,
    pub(crate) metrics_latency: Duration,
    pub(crate) overlay_ports: (u16, u16),
    pub(crate) l4lb_vip_url: String,
    pub(crate) ip_rule_command: Vec<String>,
}

impl ClusterHarness {
    /// Harness with default settings over `orchestrator`, using `http` for
    /// every other API.
    pub fn new(topology: ClusterTopology, orchestrator: Arc<dyn Orchestrator>, http: reqwest::Client) -> Self {
        Self {
            topology,
            driver: WorkloadDriver::new(orchestrator),
            probe: RoutabilityProbe::new(http.clone()),
            metrics: MetricsClient::new(http.clone(), DEFAULT_METRICS_PORT),
            overlay: OverlayClient::new(http),
            template: WorkloadTemplate::default(),
            enumeration: EnumerationSpace::default(),
            concurrency: DEFAULT_CONCURRENCY,
            fixed_delay: DEFAULT_FIXED_DELAY,
            max_elapsed: DEFAULT_MAX_ELAPSED,
            fetch_max_elapsed: probe_client::probe::DEFAULT_FETCH_MAX_ELAPSED,
            metrics_latency: Duration::from_secs(60),
            overlay_ports: (MASTER_PORT, AGENT_PORT),
            l4lb_vip_url: L4LB_VIP_URL.into(),
            ip_rule_command: vec!["/usr/bin/env".into(), "ip".into(), "rule".into()],
        }
    }

    // ========================================================================
    // Builders
    // ========================================================================

    /// Replace the workload driver (readiness timeout, poll interval).
    pub fn with_driver(mut self, driver: WorkloadDriver) -> Self {
        self.driver = driver;
        self
    }

    /// Replace the test workload template.
    pub fn with_template(mut self, template: WorkloadTemplate) -> Self {
        self.template = template;
        self
    }

    /// Replace the VIP scenario space.
    pub fn with_enumeration(mut self, space: EnumerationSpace) -> Self {
        self.enumeration = space;
        self
    }

    /// Scenarios in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Retry delay and ceiling for routing checks and cluster polls.
    pub fn with_retry(mut self, fixed_delay: Duration, max_elapsed: Duration) -> Self {
        self.fixed_delay = fixed_delay;
        self.max_elapsed = max_elapsed;
        self.probe = self.probe.with_retry(fixed_delay, max_elapsed);
        self
    }

    /// Ceiling for plain URL fetches (load balancer pings).
    pub fn with_fetch_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.fetch_max_elapsed = max_elapsed;
        self
    }

    /// Metrics API port and the time metrics take to show up.
    pub fn with_metrics(mut self, client: MetricsClient, latency: Duration) -> Self {
        self.metrics = client;
        self.metrics_latency = latency;
        self
    }

    /// Overlay status ports on masters and agents.
    pub fn with_overlay_ports(mut self, master: u16, agent: u16) -> Self {
        self.overlay_ports = (master, agent);
        self
    }

    /// Base URL of the distribution VIP.
    pub fn with_l4lb_vip_url(mut self, url: impl Into<String>) -> Self {
        self.l4lb_vip_url = url.into();
        self
    }

    /// Command printing the routing policy rules.
    pub fn with_ip_rule_command(mut self, command: Vec<String>) -> Self {
        self.ip_rule_command = command;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Cluster nodes.
    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    /// VIP scenario space.
    pub fn enumeration(&self) -> &EnumerationSpace {
        &self.enumeration
    }

    /// Scenario concurrency limit.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// The workload driver.
    pub fn driver(&self) -> &WorkloadDriver {
        &self.driver
    }

    /// The routing probe.
    pub fn probe(&self) -> &RoutabilityProbe {
        &self.probe
    }
}
