//! Configuration loading for clusterprobe.
//!
//! Configuration is loaded from a TOML file (default: `clusterprobe.toml`).
//! Every section and every field is optional.

use probe_client::{MarathonConfig, WorkloadTemplate};
use probe_core::{distinct_locations, EnumerationSpace};
use probe_suites::ClusterTopology;
use probe_types::{NetworkMode, DEFAULT_BASE_PORT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "clusterprobe.toml";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Cluster nodes and credentials.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Orchestration API.
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    /// Test workload shape.
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Retry budgets.
    #[serde(default)]
    pub retry: RetryConfig,
    /// VIP scenario runner.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Metrics API.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Cluster configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Master node addresses.
    #[serde(default)]
    pub masters: Vec<String>,
    /// Private agent addresses.
    #[serde(default)]
    pub agents: Vec<String>,
    /// Public agent addresses.
    #[serde(default)]
    pub public_agents: Vec<String>,
    /// Whether the layer-4 load balancer is enabled (default: true).
    #[serde(default = "default_lb_enabled")]
    pub lb_enabled: bool,
    /// Cluster auth token, sent as `Authorization: token=<value>`.
    pub auth_token: Option<String>,
}

/// Orchestration API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrationConfig {
    /// Marathon base URL (default: http://leader.mesos:8080).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Readiness ceiling per deployment in seconds (default: 500).
    #[serde(default = "default_deploy_timeout_secs")]
    pub deploy_timeout_secs: u64,
    /// Readiness poll interval in milliseconds (default: 2000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Test workload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    /// Docker image for containerized workloads.
    #[serde(default = "default_image")]
    pub image: String,
    /// Server command; the listen port is appended.
    #[serde(default = "default_command")]
    pub command: String,
    /// Listen port inside bridged and overlay containers (default: 9080).
    #[serde(default = "default_container_port")]
    pub container_port: u16,
    /// Agent path mounted into containers. Empty disables the mount.
    #[serde(default = "default_host_mount")]
    pub host_mount: String,
    /// Overlay network name (default: dcos).
    #[serde(default = "default_overlay_network")]
    pub overlay_network: String,
    /// CPU shares per instance (default: 0.1).
    #[serde(default = "default_cpus")]
    pub cpus: f64,
    /// Memory per instance in MiB (default: 32).
    #[serde(default = "default_mem")]
    pub mem: f64,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Delay between attempts in milliseconds (default: 2000).
    #[serde(default = "default_fixed_delay_ms")]
    pub fixed_delay_ms: u64,
    /// Ceiling for routing checks and cluster polls in seconds (default: 500).
    #[serde(default = "default_max_elapsed_secs")]
    pub max_elapsed_secs: u64,
    /// Ceiling for plain URL fetches in seconds (default: 200).
    #[serde(default = "default_fetch_max_elapsed_secs")]
    pub fetch_max_elapsed_secs: u64,
    /// Per-request HTTP timeout in seconds (default: 30).
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

/// VIP runner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Scenarios in flight at once (default: 8).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Port of scenario 0 (default: 7000).
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    /// (origin, proxy) network mode pairs to leave out, e.g. `[["BRIDGE", "USER"]]`.
    #[serde(default)]
    pub excluded_pairs: Vec<(NetworkMode, NetworkMode)>,
}

/// Metrics API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Metrics API port on every node (default: 61001).
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    /// How long container metrics may take to appear, in seconds (default: 60).
    #[serde(default = "default_latency_secs")]
    pub latency_secs: u64,
}

// Default value functions
fn default_lb_enabled() -> bool {
    true
}

fn default_base_url() -> String {
    MarathonConfig::default().base_url
}

fn default_deploy_timeout_secs() -> u64 {
    500
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_image() -> String {
    WorkloadTemplate::default().image
}

fn default_command() -> String {
    WorkloadTemplate::default().server_command
}

fn default_container_port() -> u16 {
    WorkloadTemplate::default().container_port
}

fn default_host_mount() -> String {
    WorkloadTemplate::default().host_mount.unwrap_or_default()
}

fn default_overlay_network() -> String {
    WorkloadTemplate::default().overlay_network
}

fn default_cpus() -> f64 {
    0.1
}

fn default_mem() -> f64 {
    32.0
}

fn default_fixed_delay_ms() -> u64 {
    2000
}

fn default_max_elapsed_secs() -> u64 {
    500
}

fn default_fetch_max_elapsed_secs() -> u64 {
    200
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    probe_core::DEFAULT_CONCURRENCY
}

fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

fn default_metrics_port() -> u16 {
    probe_client::metrics::DEFAULT_METRICS_PORT
}

fn default_latency_secs() -> u64 {
    60
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            masters: Vec::new(),
            agents: Vec::new(),
            public_agents: Vec::new(),
            lb_enabled: default_lb_enabled(),
            auth_token: None,
        }
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            deploy_timeout_secs: default_deploy_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            command: default_command(),
            container_port: default_container_port(),
            host_mount: default_host_mount(),
            overlay_network: default_overlay_network(),
            cpus: default_cpus(),
            mem: default_mem(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            fixed_delay_ms: default_fixed_delay_ms(),
            max_elapsed_secs: default_max_elapsed_secs(),
            fetch_max_elapsed_secs: default_fetch_max_elapsed_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            base_port: default_base_port(),
            excluded_pairs: Vec::new(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
            latency_secs: default_latency_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `path` if given, else `clusterprobe.toml` if it exists, else
    /// the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    /// Cluster nodes as the harness sees them.
    pub fn topology(&self) -> ClusterTopology {
        ClusterTopology {
            masters: self.cluster.masters.clone(),
            agents: distinct_locations(&self.cluster.agents),
            public_agents: self.cluster.public_agents.clone(),
            lb_enabled: self.cluster.lb_enabled,
        }
    }

    /// VIP scenario space: the reference axes with the configured port and
    /// exclusions.
    pub fn enumeration(&self) -> EnumerationSpace {
        EnumerationSpace {
            base_port: self.runner.base_port,
            excluded_pairs: self.runner.excluded_pairs.clone(),
            ..EnumerationSpace::default()
        }
    }

    /// Test workload template.
    pub fn template(&self) -> WorkloadTemplate {
        let w = &self.workload;
        WorkloadTemplate {
            image: w.image.clone(),
            server_command: w.command.clone(),
            container_port: w.container_port,
            host_mount: (!w.host_mount.is_empty()).then(|| w.host_mount.clone()),
            overlay_network: w.overlay_network.clone(),
            cpus: w.cpus,
            mem: w.mem,
        }
    }

    /// Marathon client settings.
    pub fn marathon(&self) -> MarathonConfig {
        MarathonConfig {
            base_url: self.orchestration.base_url.clone(),
        }
    }
}

impl RetryConfig {
    /// Delay between attempts.
    pub fn fixed_delay(&self) -> Duration {
        Duration::from_millis(self.fixed_delay_ms)
    }

    /// Ceiling for routing checks and cluster polls.
    pub fn max_elapsed(&self) -> Duration {
        Duration::from_secs(self.max_elapsed_secs)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
