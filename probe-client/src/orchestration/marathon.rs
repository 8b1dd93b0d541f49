//! Marathon HTTP API client.

use super::{AppStatus, OrchestrationError, Orchestrator};
use crate::app::AppDefinition;
use async_trait::async_trait;
use probe_types::ServicePoint;
use serde::Deserialize;

/// Marathon client configuration.
#[derive(Debug, Clone)]
pub struct MarathonConfig {
    /// Base URL, e.g. `http://leader.mesos:8080` or `https://cluster/service/marathon`.
    pub base_url: String,
}

impl Default for MarathonConfig {
    fn default() -> Self {
        Self {
            base_url: "http://leader.mesos:8080".into(),
        }
    }
}

/// Client for the Marathon `/v2/apps` API.
#[derive(Debug, Clone)]
pub struct MarathonClient {
    config: MarathonConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AppEnvelope {
    app: AppState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AppState {
    instances: u32,
    tasks_running: u32,
    tasks_healthy: u32,
    health_checks: Vec<serde_json::Value>,
    tasks: Vec<TaskState>,
    container: Option<ContainerState>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TaskState {
    host: String,
    ports: Vec<u16>,
    ip_addresses: Vec<TaskIp>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TaskIp {
    ip_address: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ContainerState {
    docker: Option<DockerState>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DockerState {
    port_mappings: Vec<MappingState>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MappingState {
    container_port: u16,
}

impl AppState {
    fn container_port(&self) -> Option<u16> {
        self.container
            .as_ref()
            .and_then(|c| c.docker.as_ref())
            .and_then(|d| d.port_mappings.first())
            .map(|m| m.container_port)
    }

    /// One endpoint per task. Tasks without host ports (overlay networks)
    /// are reached on their container IP and container port.
    fn service_points(&self) -> Vec<ServicePoint> {
        self.tasks
            .iter()
            .filter_map(|task| {
                let ip = task.ip_addresses.first().map(|a| a.ip_address.clone());
                match task.ports.first() {
                    Some(&port) => Some(ServicePoint {
                        host: task.host.clone(),
                        port,
                        ip,
                    }),
                    None => {
                        let ip = ip?;
                        let port = self.container_port()?;
                        Some(ServicePoint {
                            host: ip.clone(),
                            port,
                            ip: Some(ip),
                        })
                    }
                }
            })
            .collect()
    }

    fn into_status(self) -> AppStatus {
        let service_points = self.service_points();
        AppStatus {
            instances: self.instances,
            tasks_running: self.tasks_running,
            tasks_healthy: self.tasks_healthy,
            has_health_checks: !self.health_checks.is_empty(),
            service_points,
        }
    }
}

impl MarathonClient {
    /// Create a client over an already configured HTTP client.
    pub fn new(config: MarathonConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// `/v2/apps` URL.
    pub fn apps_url(&self) -> String {
        format!("{}/v2/apps", self.config.base_url.trim_end_matches('/'))
    }

    /// URL of one app. The leading `/` of the id is dropped.
    pub fn app_url(&self, app_id: &str) -> String {
        format!("{}/{}", self.apps_url(), app_id.trim_start_matches('/'))
    }

    async fn error_from(response: reqwest::Response) -> OrchestrationError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        OrchestrationError::from_status(status, body)
    }
}

#[async_trait]
impl Orchestrator for MarathonClient {
    async fn create_app(&self, app: &AppDefinition) -> Result<(), OrchestrationError> {
        tracing::debug!(app_id = %app.id, "creating app");
        let response = self.http.post(self.apps_url()).json(app).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }

    async fn app_status(&self, app_id: &str) -> Result<AppStatus, OrchestrationError> {
        let response = self
            .http
            .get(self.app_url(app_id))
            .query(&[("embed", "app.tasks")])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(OrchestrationError::NotFound(app_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let envelope: AppEnvelope = response.json().await?;
        Ok(envelope.app.into_status())
    }

    async fn destroy_app(&self, app_id: &str) -> Result<(), OrchestrationError> {
        tracing::debug!(app_id, "destroying app");
        let response = self
            .http
            .delete(self.app_url(app_id))
            .query(&[("force", "true")])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }
}
