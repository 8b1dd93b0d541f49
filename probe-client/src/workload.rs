//! Deploying test workloads and guaranteeing their removal.
//!
//! Every app created through [`WorkloadDriver`] is owned by a
//! [`Deployment`]. Tearing it down explicitly is the normal path; if a
//! deployment is dropped without that (an early return, a panic, a
//! cancelled task) its guard schedules the destroy call on the current
//! runtime instead.

use crate::app::TestApp;
use crate::orchestration::{AppStatus, OrchestrationError, Orchestrator};
use probe_types::{ProbeError, ServicePoint};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Readiness ceiling for one deployment.
pub const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(500);

/// Delay between readiness polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

struct TeardownGuard {
    orchestrator: Arc<dyn Orchestrator>,
    app_id: String,
    armed: bool,
}

impl TeardownGuard {
    async fn release(mut self) -> Result<(), OrchestrationError> {
        self.armed = false;
        self.orchestrator.destroy_app(&self.app_id).await
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let app_id = std::mem::take(&mut self.app_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(app_id = %app_id, "deployment dropped, scheduling teardown");
                let orchestrator = Arc::clone(&self.orchestrator);
                handle.spawn(async move {
                    if let Err(e) = orchestrator.destroy_app(&app_id).await {
                        tracing::warn!(app_id = %app_id, "background teardown failed: {}", e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!(app_id = %app_id, "deployment dropped outside a runtime, app leaked");
            }
        }
    }
}

/// A running app that will be destroyed when this value goes away.
pub struct Deployment {
    token: String,
    status: AppStatus,
    guard: TeardownGuard,
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployment")
            .field("app_id", &self.guard.app_id)
            .field("token", &self.token)
            .field("service_points", &self.status.service_points)
            .finish()
    }
}

impl Deployment {
    /// Orchestration id.
    pub fn app_id(&self) -> &str {
        &self.guard.app_id
    }

    /// Identity token the app answers `/test_uuid` with.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Status observed when the app became ready.
    pub fn status(&self) -> &AppStatus {
        &self.status
    }

    /// Reachable endpoints, one per instance.
    pub fn service_points(&self) -> &[ServicePoint] {
        &self.status.service_points
    }

    /// Destroy the app now.
    pub async fn teardown(self) -> Result<(), OrchestrationError> {
        tracing::debug!(app_id = %self.guard.app_id, "tearing down");
        self.guard.release().await
    }
}

/// Origin and proxy deployed for one scenario.
#[derive(Debug)]
pub struct PairedDeployment {
    /// The VIP backend.
    pub origin: Deployment,
    /// The workload probes are sent through.
    pub proxy: Deployment,
}

impl PairedDeployment {
    /// Endpoints of both workloads.
    pub fn endpoints(&self) -> PairedEndpoints {
        PairedEndpoints {
            origin: self.origin.service_points().to_vec(),
            proxy: self.proxy.service_points().to_vec(),
            origin_token: self.origin.token().to_string(),
        }
    }

    /// Destroy the proxy, then the origin. Both are attempted; the first
    /// error is returned.
    pub async fn teardown(self) -> Result<(), OrchestrationError> {
        let proxy = self.proxy.teardown().await;
        let origin = self.origin.teardown().await;
        proxy.and(origin)
    }
}

/// Reachable endpoints of a deployed pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedEndpoints {
    /// Origin endpoints.
    pub origin: Vec<ServicePoint>,
    /// Proxy endpoints.
    pub proxy: Vec<ServicePoint>,
    /// Token the origin answers with.
    pub origin_token: String,
}

/// Deploys test apps and waits for them to become ready.
#[derive(Clone)]
pub struct WorkloadDriver {
    orchestrator: Arc<dyn Orchestrator>,
    deploy_timeout: Duration,
    poll_interval: Duration,
}

impl std::fmt::Debug for WorkloadDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadDriver")
            .field("deploy_timeout", &self.deploy_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl WorkloadDriver {
    /// Driver with the default readiness timeout and poll interval.
    pub fn new(orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            orchestrator,
            deploy_timeout: DEFAULT_DEPLOY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the readiness timeout.
    pub fn with_deploy_timeout(mut self, timeout: Duration) -> Self {
        self.deploy_timeout = timeout;
        self
    }

    /// Override the readiness poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The orchestrator apps are submitted to.
    pub fn orchestrator(&self) -> &Arc<dyn Orchestrator> {
        &self.orchestrator
    }

    /// Create `app` and wait until it is ready.
    ///
    /// The app is destroyed again if it never becomes ready, or if the
    /// create call failed in a way that leaves its effect unknown.
    pub async fn deploy(&self, app: TestApp) -> Result<Deployment, ProbeError> {
        let TestApp { definition, token } = app;
        tracing::info!(app_id = %definition.id, network = %definition.network_mode(), "deploying");

        let guard = TeardownGuard {
            orchestrator: Arc::clone(&self.orchestrator),
            app_id: definition.id.clone(),
            armed: true,
        };
        if let Err(e) = self.orchestrator.create_app(&definition).await {
            if matches!(e, OrchestrationError::Rejected { .. }) {
                guard.disarm();
            } else if let Err(teardown) = guard.release().await {
                tracing::warn!(app_id = %definition.id, "teardown after failed create: {}", teardown);
            }
            return Err(e.into());
        }

        match self.wait_ready(&definition.id).await {
            Ok(status) => Ok(Deployment {
                token,
                status,
                guard,
            }),
            Err(e) => {
                if let Err(teardown) = guard.release().await {
                    tracing::warn!(app_id = %definition.id, "teardown after failed deploy: {}", teardown);
                }
                Err(e)
            }
        }
    }

    /// Deploy the origin, then the proxy.
    ///
    /// If the proxy fails the origin is torn down before returning.
    pub async fn deploy_pair(&self, origin: TestApp, proxy: TestApp) -> Result<PairedDeployment, ProbeError> {
        let origin = self.deploy(origin).await?;
        match self.deploy(proxy).await {
            Ok(proxy) => Ok(PairedDeployment { origin, proxy }),
            Err(e) => {
                if let Err(teardown) = origin.teardown().await {
                    tracing::warn!("teardown of origin after failed proxy deploy: {}", teardown);
                }
                Err(e)
            }
        }
    }

    /// Deploy a pair, run `body` against its endpoints, then tear both
    /// down whatever `body` returned.
    pub async fn with_pair<T, F, Fut>(&self, origin: TestApp, proxy: TestApp, body: F) -> Result<T, ProbeError>
    where
        F: FnOnce(PairedEndpoints) -> Fut,
        Fut: Future<Output = Result<T, ProbeError>>,
    {
        let pair = self.deploy_pair(origin, proxy).await?;
        let result = body(pair.endpoints()).await;
        if let Err(e) = pair.teardown().await {
            tracing::warn!("teardown of scenario workloads failed: {}", e);
        }
        result
    }

    /// Deploy every app in order. On the first failure the ones already
    /// running are torn down.
    pub async fn deploy_all(&self, apps: Vec<TestApp>) -> Result<Vec<Deployment>, ProbeError> {
        let mut deployed = Vec::with_capacity(apps.len());
        for app in apps {
            match self.deploy(app).await {
                Ok(d) => deployed.push(d),
                Err(e) => {
                    Self::teardown_all(deployed).await;
                    return Err(e);
                }
            }
        }
        Ok(deployed)
    }

    /// Tear down every deployment, logging failures.
    pub async fn teardown_all(deployments: Vec<Deployment>) {
        for d in deployments {
            let app_id = d.app_id().to_string();
            if let Err(e) = d.teardown().await {
                tracing::warn!(app_id = %app_id, "teardown failed: {}", e);
            }
        }
    }

    async fn wait_ready(&self, app_id: &str) -> Result<AppStatus, ProbeError> {
        let started = Instant::now();
        loop {
            match self.orchestrator.app_status(app_id).await {
                Ok(status) if status.is_ready() => {
                    tracing::info!(app_id, elapsed_ms = started.elapsed().as_millis() as u64, "app ready");
                    return Ok(status);
                }
                Ok(status) => tracing::debug!(
                    app_id,
                    running = status.tasks_running,
                    healthy = status.tasks_healthy,
                    "app not ready yet"
                ),
                Err(OrchestrationError::Rejected { status, body }) => {
                    return Err(ProbeError::Rejected { status, body });
                }
                Err(e) => tracing::debug!(app_id, "status poll failed: {}", e),
            }

            if started.elapsed() + self.poll_interval > self.deploy_timeout {
                return Err(ProbeError::DeploymentTimeout {
                    app_id: app_id.to_string(),
                    timeout_secs: self.deploy_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppDefinition, WorkloadTemplate};
    use crate::orchestration::MockOrchestrator;
    use probe_types::NetworkMode;

    fn driver(mock: &MockOrchestrator) -> WorkloadDriver {
        WorkloadDriver::new(Arc::new(mock.clone()))
            .with_deploy_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(10))
    }

    fn app() -> TestApp {
        WorkloadTemplate::default().docker_app(NetworkMode::Bridge, None)
    }

    #[tokio::test]
    async fn deploy_waits_for_readiness() {
        let mock = MockOrchestrator::new();
        mock.ready_after_polls(3);
        let d = driver(&mock).deploy(app()).await.unwrap();

        assert_eq!(d.service_points().len(), 1);
        assert!(d.status().is_ready());
        let id = d.app_id().to_string();
        d.teardown().await.unwrap();
        assert_eq!(mock.destroyed(), vec![id]);
    }

    #[tokio::test]
    async fn never_ready_times_out_and_cleans_up() {
        let mock = MockOrchestrator::new();
        mock.never_ready();
        let err = driver(&mock).deploy(app()).await.unwrap_err();

        assert!(matches!(err, ProbeError::DeploymentTimeout { .. }));
        assert!(mock.live_apps().is_empty());
        assert_eq!(mock.destroyed().len(), 1);
    }

    #[tokio::test]
    async fn rejected_create_leaves_nothing_behind() {
        let mock = MockOrchestrator::new();
        mock.fail_next_create(422, "bad constraint");
        let err = driver(&mock).deploy(app()).await.unwrap_err();

        assert!(matches!(err, ProbeError::Rejected { status: 422, .. }));
        assert!(mock.created().is_empty());
        assert!(mock.destroyed().is_empty());
    }

    /// Creates the app, then reports the response as lost.
    struct LostResponse(MockOrchestrator);

    #[async_trait::async_trait]
    impl Orchestrator for LostResponse {
        async fn create_app(&self, app: &AppDefinition) -> Result<(), OrchestrationError> {
            self.0.create_app(app).await?;
            Err(OrchestrationError::ConnectionFailed("operation timed out".into()))
        }

        async fn app_status(&self, app_id: &str) -> Result<AppStatus, OrchestrationError> {
            self.0.app_status(app_id).await
        }

        async fn destroy_app(&self, app_id: &str) -> Result<(), OrchestrationError> {
            self.0.destroy_app(app_id).await
        }
    }

    #[tokio::test]
    async fn lost_create_response_still_tears_down() {
        let mock = MockOrchestrator::new();
        let driver = WorkloadDriver::new(Arc::new(LostResponse(mock.clone())))
            .with_poll_interval(Duration::from_millis(10));
        let app = app();
        let id = app.definition.id.clone();

        let err = driver.deploy(app).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(mock.created().len(), 1);
        assert!(mock.live_apps().is_empty());
        assert_eq!(mock.destroyed(), vec![id]);
    }

    #[tokio::test]
    async fn failed_proxy_tears_down_origin() {
        let mock = MockOrchestrator::new();
        mock.fail_creates_matching("HOST");
        let template = WorkloadTemplate::default();
        let origin = template.docker_app(NetworkMode::Bridge, None);
        let origin_id = origin.definition.id.clone();
        let proxy = template.docker_app(NetworkMode::Host, None);

        assert!(driver(&mock).deploy_pair(origin, proxy).await.is_err());
        assert_eq!(mock.destroyed(), vec![origin_id]);
        assert!(mock.live_apps().is_empty());
    }

    #[tokio::test]
    async fn with_pair_tears_down_after_body_error() {
        let mock = MockOrchestrator::new();
        let template = WorkloadTemplate::default();
        let origin = template.docker_app(NetworkMode::User, Some("/namedvip0:7000"));
        let token = origin.token.clone();

        let result: Result<(), ProbeError> = driver(&mock)
            .with_pair(origin, app(), |endpoints| async move {
                assert_eq!(endpoints.origin_token, token);
                assert_eq!(endpoints.proxy.len(), 1);
                Err(ProbeError::ProbeUnreachable("refused".into()))
            })
            .await;

        assert!(matches!(result, Err(ProbeError::ProbeUnreachable(_))));
        assert!(mock.live_apps().is_empty());
        assert_eq!(mock.destroyed().len(), 2);
    }

    #[tokio::test]
    async fn dropped_deployment_is_torn_down_in_background() {
        let mock = MockOrchestrator::new();
        let d = driver(&mock).deploy(app()).await.unwrap();
        drop(d);

        for _ in 0..50 {
            if mock.live_apps().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(mock.live_apps().is_empty());
    }

    #[tokio::test]
    async fn deploy_all_rolls_back_on_failure() {
        let mock = MockOrchestrator::new();
        let template = WorkloadTemplate::default();
        let apps = vec![
            template.docker_app(NetworkMode::Bridge, None),
            template.docker_app(NetworkMode::Bridge, None),
            template.docker_app(NetworkMode::Host, None),
        ];
        mock.fail_creates_matching("HOST");

        assert!(driver(&mock).deploy_all(apps).await.is_err());
        assert!(mock.live_apps().is_empty());
        assert_eq!(mock.destroyed().len(), 2);
    }
}
