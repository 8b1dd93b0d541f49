//! In-memory orchestrator for tests.
//!
//! Apps become ready after a configurable number of status polls. Created
//! definitions and destroyed ids are captured for verification.

use super::{AppStatus, OrchestrationError, Orchestrator};
use crate::app::{AppDefinition, TEST_APP_PREFIX};
use async_trait::async_trait;
use probe_types::ServicePoint;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

type EndpointResolver = Arc<dyn Fn(&AppDefinition, u32) -> ServicePoint + Send + Sync>;

/// Mock orchestrator for testing.
#[derive(Clone, Default)]
pub struct MockOrchestrator {
    inner: Arc<Mutex<MockOrchestratorInner>>,
}

#[derive(Default)]
struct MockOrchestratorInner {
    apps: BTreeMap<String, MockApp>,
    created: Vec<AppDefinition>,
    destroyed: Vec<String>,
    ready_after_polls: u32,
    never_ready: bool,
    fail_next_create: Option<(u16, String)>,
    fail_creates_matching: Option<String>,
    next_port: u16,
    resolver: Option<EndpointResolver>,
}

struct MockApp {
    definition: AppDefinition,
    polls: u32,
    points: Vec<ServicePoint>,
}

impl fmt::Debug for MockOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("MockOrchestrator")
            .field("live_apps", &inner.apps.keys().collect::<Vec<_>>())
            .field("created", &inner.created.len())
            .field("destroyed", &inner.destroyed.len())
            .finish()
    }
}

impl MockOrchestrator {
    /// Create a mock whose apps are ready on the first poll.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockOrchestratorInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Report apps as not ready for the first `polls` status reads.
    pub fn ready_after_polls(&self, polls: u32) {
        self.lock().ready_after_polls = polls;
    }

    /// Never report any app as ready.
    pub fn never_ready(&self) {
        self.lock().never_ready = true;
    }

    /// Cause the next `create_app` to fail with `status`.
    pub fn fail_next_create(&self, status: u16, body: &str) {
        self.lock().fail_next_create = Some((status, body.to_string()));
    }

    /// Reject every app whose serialized definition contains `needle`.
    pub fn fail_creates_matching(&self, needle: &str) {
        self.lock().fail_creates_matching = Some(needle.to_string());
    }

    /// Compute each instance's endpoint with `resolver` instead of the
    /// default `host:20000+n`.
    pub fn resolve_endpoints_with<F>(&self, resolver: F)
    where
        F: Fn(&AppDefinition, u32) -> ServicePoint + Send + Sync + 'static,
    {
        self.lock().resolver = Some(Arc::new(resolver));
    }

    /// Every definition submitted, in order.
    pub fn created(&self) -> Vec<AppDefinition> {
        self.lock().created.clone()
    }

    /// Every destroyed id, in order.
    pub fn destroyed(&self) -> Vec<String> {
        self.lock().destroyed.clone()
    }

    /// Definitions of apps that exist right now.
    pub fn live_apps(&self) -> Vec<AppDefinition> {
        self.lock()
            .apps
            .values()
            .map(|a| a.definition.clone())
            .collect()
    }

    /// Tokens of live test apps, taken from their ids.
    pub fn live_tokens(&self) -> Vec<String> {
        self.lock()
            .apps
            .keys()
            .filter_map(|id| id.strip_prefix(TEST_APP_PREFIX))
            .map(str::to_string)
            .collect()
    }

    /// Clear all state.
    pub fn reset(&self) {
        *self.lock() = MockOrchestratorInner::default();
    }
}

impl MockOrchestratorInner {
    fn endpoint(&mut self, app: &AppDefinition, instance: u32) -> ServicePoint {
        if let Some(resolver) = &self.resolver {
            return resolver(app, instance);
        }
        let host = app
            .constraints
            .iter()
            .find_map(|c| c.pinned_host())
            .map(str::to_string)
            .unwrap_or_else(|| format!("10.0.0.{}", instance + 1));
        let port = 20000 + self.next_port;
        self.next_port = self.next_port.wrapping_add(1);
        ServicePoint::new(host, port)
    }
}

#[async_trait]
impl Orchestrator for MockOrchestrator {
    async fn create_app(&self, app: &AppDefinition) -> Result<(), OrchestrationError> {
        let mut inner = self.lock();

        if let Some((status, body)) = inner.fail_next_create.take() {
            return Err(OrchestrationError::from_status(status, body));
        }
        if let Some(needle) = &inner.fail_creates_matching {
            let json = serde_json::to_string(app).unwrap_or_default();
            if json.contains(needle.as_str()) {
                return Err(OrchestrationError::Rejected {
                    status: 422,
                    body: format!("rejected: {}", needle),
                });
            }
        }
        if inner.apps.contains_key(&app.id) {
            return Err(OrchestrationError::Rejected {
                status: 409,
                body: format!("app {} already exists", app.id),
            });
        }

        let points = (0..app.instances.max(1))
            .map(|i| inner.endpoint(app, i))
            .collect();
        inner.created.push(app.clone());
        inner.apps.insert(
            app.id.clone(),
            MockApp {
                definition: app.clone(),
                polls: 0,
                points,
            },
        );
        Ok(())
    }

    async fn app_status(&self, app_id: &str) -> Result<AppStatus, OrchestrationError> {
        let mut inner = self.lock();
        let ready_after = inner.ready_after_polls;
        let never_ready = inner.never_ready;

        let app = inner
            .apps
            .get_mut(app_id)
            .ok_or_else(|| OrchestrationError::NotFound(app_id.to_string()))?;
        app.polls += 1;

        let instances = app.definition.instances;
        let has_health_checks = !app.definition.health_checks.is_empty();
        if never_ready || app.polls <= ready_after {
            return Ok(AppStatus {
                instances,
                has_health_checks,
                ..AppStatus::default()
            });
        }

        Ok(AppStatus {
            instances,
            tasks_running: instances,
            tasks_healthy: if has_health_checks { instances } else { 0 },
            has_health_checks,
            service_points: app.points.clone(),
        })
    }

    async fn destroy_app(&self, app_id: &str) -> Result<(), OrchestrationError> {
        let mut inner = self.lock();
        inner.apps.remove(app_id);
        inner.destroyed.push(app_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::WorkloadTemplate;

    #[tokio::test]
    async fn becomes_ready_after_polls() {
        let mock = MockOrchestrator::new();
        mock.ready_after_polls(2);
        let app = WorkloadTemplate::default().host_app(None);
        mock.create_app(&app.definition).await.unwrap();

        assert!(!mock.app_status(&app.definition.id).await.unwrap().is_ready());
        assert!(!mock.app_status(&app.definition.id).await.unwrap().is_ready());
        let status = mock.app_status(&app.definition.id).await.unwrap();
        assert!(status.is_ready());
        assert_eq!(status.service_points[0].port, 20000);
    }

    #[tokio::test]
    async fn pinned_apps_report_their_host() {
        let mock = MockOrchestrator::new();
        let mut app = WorkloadTemplate::default().host_app(None).definition;
        app.constraints = vec![crate::app::Constraint::pin_host("10.9.9.9")];
        mock.create_app(&app).await.unwrap();

        let status = mock.app_status(&app.id).await.unwrap();
        assert_eq!(status.service_points[0].host, "10.9.9.9");
    }

    #[tokio::test]
    async fn fail_next_create_fires_once() {
        let mock = MockOrchestrator::new();
        mock.fail_next_create(503, "busy");
        let app = WorkloadTemplate::default().host_app(None);

        assert!(matches!(
            mock.create_app(&app.definition).await,
            Err(OrchestrationError::Unavailable { status: 503, .. })
        ));
        mock.create_app(&app.definition).await.unwrap();
        assert_eq!(mock.created().len(), 1);
    }

    #[tokio::test]
    async fn destroy_removes_and_records() {
        let mock = MockOrchestrator::new();
        let app = WorkloadTemplate::default().host_app(None);
        mock.create_app(&app.definition).await.unwrap();
        assert_eq!(mock.live_tokens(), vec![app.token.clone()]);

        mock.destroy_app(&app.definition.id).await.unwrap();
        assert!(mock.live_apps().is_empty());
        assert_eq!(mock.destroyed(), vec![app.definition.id.clone()]);
        assert!(matches!(
            mock.app_status(&app.definition.id).await,
            Err(OrchestrationError::NotFound(_))
        ));
    }
}
