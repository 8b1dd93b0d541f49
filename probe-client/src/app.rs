//! Test workload definitions in the orchestration API's app format.
//!
//! Every test workload runs the same small HTTP server, which answers
//! `GET /ping`, `GET /test_uuid` (returning the app's token) and
//! `POST /run_cmd` (running a shell command and returning
//! `{status, output}`). [`WorkloadTemplate`] describes how to start that
//! server; the builders below place it on a network mode and host.

use probe_types::{NetworkMode, Scenario};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label the load balancer reads the VIP from.
pub const VIP_LABEL: &str = "VIP_0";

/// Prefix of every test app id; the token follows it.
pub const TEST_APP_PREFIX: &str = "/integration-test-";

/// A Marathon-style app definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDefinition {
    /// App id, e.g. `/integration-test-<token>`.
    pub id: String,
    /// Shell command to run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    /// CPU shares.
    pub cpus: f64,
    /// Memory in MiB.
    pub mem: f64,
    /// Instance count.
    pub instances: u32,
    /// Container settings (absent for plain command apps).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
    /// Overlay network attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<IpAddress>,
    /// Host ports requested by non-bridged apps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_definitions: Vec<PortDefinition>,
    /// Placement constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    /// Health checks gating readiness.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub health_checks: Vec<HealthCheck>,
}

impl AppDefinition {
    /// Minimal command app with one instance.
    pub fn command(id: impl Into<String>, cmd: impl Into<String>, cpus: f64, mem: f64) -> Self {
        Self {
            id: id.into(),
            cmd: Some(cmd.into()),
            cpus,
            mem,
            instances: 1,
            container: None,
            ip_address: None,
            port_definitions: Vec::new(),
            constraints: Vec::new(),
            health_checks: Vec::new(),
        }
    }

    /// Network mode the app will run in (`HOST` for plain command apps).
    pub fn network_mode(&self) -> NetworkMode {
        self.container
            .as_ref()
            .map(|c| c.docker.network)
            .unwrap_or(NetworkMode::Host)
    }

    /// Container port of the first port mapping, if any.
    pub fn container_port(&self) -> Option<u16> {
        self.container
            .as_ref()
            .and_then(|c| c.docker.port_mappings.first())
            .map(|pm| pm.container_port)
    }
}

/// Container section of an app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Containerizer, always `DOCKER` here.
    #[serde(rename = "type")]
    pub kind: String,
    /// Docker settings.
    pub docker: Docker,
    /// Host paths mounted into the container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

/// Docker settings of a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Docker {
    /// Image to run.
    pub image: String,
    /// Network mode.
    pub network: NetworkMode,
    /// Port mappings (ignored in `HOST` mode).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_mappings: Vec<PortMapping>,
}

/// One container port mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    /// Host port (0 = assigned).
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
    /// Transport protocol.
    pub protocol: String,
    /// Labels, e.g. the VIP.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// One requested host port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDefinition {
    /// Port (0 = assigned).
    pub port: u16,
    /// Transport protocol.
    pub protocol: String,
    /// Labels, e.g. the VIP.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Overlay network attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddress {
    /// Overlay network name.
    pub network_name: String,
}

/// Host path mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Path inside the container.
    pub container_path: String,
    /// Path on the agent.
    pub host_path: String,
    /// `RO` or `RW`.
    pub mode: String,
}

/// Health check definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    /// Check protocol.
    pub protocol: String,
    /// HTTP path.
    pub path: String,
    /// Index of the checked port.
    pub port_index: u32,
    /// Seconds before failures count.
    pub grace_period_seconds: u32,
    /// Seconds between checks.
    pub interval_seconds: u32,
    /// Seconds before a check times out.
    pub timeout_seconds: u32,
    /// Failures before the task is killed.
    pub max_consecutive_failures: u32,
}

impl HealthCheck {
    /// `GET /ping` on the first port.
    pub fn ping() -> Self {
        Self {
            protocol: "MESOS_HTTP".into(),
            path: "/ping".into(),
            port_index: 0,
            grace_period_seconds: 5,
            interval_seconds: 10,
            timeout_seconds: 10,
            max_consecutive_failures: 120,
        }
    }
}

/// Placement constraint `(attribute, operator[, value])`.
///
/// Serialized as a JSON array, e.g. `["hostname", "CLUSTER", "10.0.0.4"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Constraint {
    /// Agent attribute.
    pub attribute: String,
    /// Operator such as `CLUSTER` or `UNIQUE`.
    pub operator: String,
    /// Operand, when the operator takes one.
    pub value: Option<String>,
}

impl Constraint {
    /// Pin to one host.
    pub fn pin_host(host: impl Into<String>) -> Self {
        Self {
            attribute: "hostname".into(),
            operator: "CLUSTER".into(),
            value: Some(host.into()),
        }
    }

    /// At most one instance per host.
    pub fn unique_host() -> Self {
        Self {
            attribute: "hostname".into(),
            operator: "UNIQUE".into(),
            value: None,
        }
    }

    /// Host this constraint pins to, if it is a hostname pin.
    pub fn pinned_host(&self) -> Option<&str> {
        if self.attribute == "hostname" && self.operator == "CLUSTER" {
            self.value.as_deref()
        } else {
            None
        }
    }
}

impl TryFrom<Vec<String>> for Constraint {
    type Error = String;

    fn try_from(mut parts: Vec<String>) -> Result<Self, Self::Error> {
        match parts.len() {
            2 | 3 => {
                let value = if parts.len() == 3 { parts.pop() } else { None };
                let operator = parts.pop().unwrap_or_default();
                let attribute = parts.pop().unwrap_or_default();
                Ok(Self {
                    attribute,
                    operator,
                    value,
                })
            }
            n => Err(format!("constraint must have 2 or 3 fields, got {}", n)),
        }
    }
}

impl From<Constraint> for Vec<String> {
    fn from(c: Constraint) -> Self {
        let mut parts = vec![c.attribute, c.operator];
        parts.extend(c.value);
        parts
    }
}

/// How to start the test HTTP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadTemplate {
    /// Docker image for containerized workloads.
    pub image: String,
    /// Server command; the listen port is appended as the last argument.
    pub server_command: String,
    /// Port the server listens on inside bridged/overlay containers.
    pub container_port: u16,
    /// Agent path mounted read-only into containers (for the server script).
    pub host_mount: Option<String>,
    /// Overlay network used for `USER` mode.
    pub overlay_network: String,
    /// CPU shares per instance.
    pub cpus: f64,
    /// Memory per instance in MiB.
    pub mem: f64,
}

impl Default for WorkloadTemplate {
    fn default() -> Self {
        Self {
            image: "debian:jessie".into(),
            server_command: "/opt/mesosphere/bin/dcos-shell python \
                             /opt/mesosphere/active/dcos-integration-test/util/python_test_server.py"
                .into(),
            container_port: 9080,
            host_mount: Some("/opt/mesosphere".into()),
            overlay_network: "dcos".into(),
            cpus: 0.1,
            mem: 32.0,
        }
    }
}

/// A test app plus the token its `/test_uuid` endpoint returns.
#[derive(Debug, Clone, PartialEq)]
pub struct TestApp {
    /// Definition to deploy.
    pub definition: AppDefinition,
    /// Identity token of this app.
    pub token: String,
}

impl WorkloadTemplate {
    fn new_token() -> String {
        uuid::Uuid::new_v4().as_simple().to_string()
    }

    fn base_app(&self, token: &str, port_arg: &str) -> AppDefinition {
        AppDefinition::command(
            format!("{}{}", TEST_APP_PREFIX, token),
            format!("{} {}", self.server_command, port_arg),
            self.cpus,
            self.mem,
        )
    }

    fn vip_labels(vip: Option<&str>) -> BTreeMap<String, String> {
        vip.map(|v| BTreeMap::from([(VIP_LABEL.to_string(), v.to_string())]))
            .unwrap_or_default()
    }

    /// Plain command app on a host port, optionally behind `vip`.
    pub fn host_app(&self, vip: Option<&str>) -> TestApp {
        let token = Self::new_token();
        let mut definition = self.base_app(&token, "$PORT0");
        definition.port_definitions = vec![PortDefinition {
            port: 0,
            protocol: "tcp".into(),
            labels: Self::vip_labels(vip),
        }];
        definition.health_checks = vec![HealthCheck::ping()];
        TestApp { definition, token }
    }

    /// Docker app in `mode`, optionally behind `vip`.
    ///
    /// `HOST` mode listens on the assigned host port and carries the VIP on
    /// its port definition; the other modes listen on `container_port` and
    /// carry the VIP on the port mapping. `USER` mode joins the overlay.
    pub fn docker_app(&self, mode: NetworkMode, vip: Option<&str>) -> TestApp {
        let token = Self::new_token();
        let volumes = self
            .host_mount
            .iter()
            .map(|path| Volume {
                container_path: path.clone(),
                host_path: path.clone(),
                mode: "RO".into(),
            })
            .collect();

        let mut definition;
        let port_mappings;
        if mode == NetworkMode::Host {
            definition = self.base_app(&token, "$PORT0");
            definition.port_definitions = vec![PortDefinition {
                port: 0,
                protocol: "tcp".into(),
                labels: Self::vip_labels(vip),
            }];
            port_mappings = Vec::new();
        } else {
            definition = self.base_app(&token, &self.container_port.to_string());
            port_mappings = vec![PortMapping {
                host_port: 0,
                container_port: self.container_port,
                protocol: "tcp".into(),
                labels: Self::vip_labels(vip),
            }];
        }

        if mode == NetworkMode::User {
            definition.ip_address = Some(IpAddress {
                network_name: self.overlay_network.clone(),
            });
        }

        definition.container = Some(Container {
            kind: "DOCKER".into(),
            docker: Docker {
                image: self.image.clone(),
                network: mode,
                port_mappings,
            },
            volumes,
        });
        definition.health_checks = vec![HealthCheck::ping()];
        TestApp { definition, token }
    }

    /// VIP backend of `scenario`, pinned to `host`.
    pub fn origin_app(&self, scenario: &Scenario, host: &str) -> TestApp {
        let mut app = self.docker_app(scenario.primary(), Some(scenario.service_address()));
        app.definition.constraints = vec![Constraint::pin_host(host)];
        app
    }

    /// Proxy of `scenario`, pinned to `host`.
    pub fn proxy_app(&self, scenario: &Scenario, host: &str) -> TestApp {
        let mut app = self.docker_app(scenario.secondary(), None);
        app.definition.constraints = vec![Constraint::pin_host(host)];
        app
    }

    /// Two overlay instances on distinct hosts.
    pub fn ip_per_container_app(&self) -> TestApp {
        let mut app = self.docker_app(NetworkMode::User, None);
        app.definition.instances = 2;
        app.definition.constraints = vec![Constraint::unique_host()];
        app
    }
}

/// The statsd emitter app whose containers the metrics suite inspects.
pub fn statsd_emitter_app() -> TestApp {
    let mut definition = AppDefinition::command(
        "/statsd-emitter",
        "/opt/mesosphere/bin/./statsd-emitter -debug",
        0.5,
        128.0,
    );
    definition.port_definitions = vec![PortDefinition {
        port: 0,
        protocol: "tcp".into(),
        labels: BTreeMap::new(),
    }];
    TestApp {
        definition,
        token: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_types::AddressStyle;

    fn scenario(primary: NetworkMode, secondary: NetworkMode) -> Scenario {
        Scenario::new(2, &AddressStyle::named(), 7002, false, primary, secondary)
    }

    #[test]
    fn constraint_serializes_as_array() {
        let json = serde_json::to_string(&Constraint::pin_host("10.0.0.4")).unwrap();
        assert_eq!(json, r#"["hostname","CLUSTER","10.0.0.4"]"#);
        let json = serde_json::to_string(&Constraint::unique_host()).unwrap();
        assert_eq!(json, r#"["hostname","UNIQUE"]"#);
    }

    #[test]
    fn constraint_roundtrips_and_rejects_bad_arity() {
        let c: Constraint = serde_json::from_str(r#"["hostname","CLUSTER","a"]"#).unwrap();
        assert_eq!(c.pinned_host(), Some("a"));
        assert!(serde_json::from_str::<Constraint>(r#"["hostname"]"#).is_err());
    }

    #[test]
    fn test_app_id_embeds_token() {
        let app = WorkloadTemplate::default().host_app(Some("/l4lbtest:5000"));
        assert_eq!(app.definition.id, format!("{}{}", TEST_APP_PREFIX, app.token));
        assert_eq!(app.token.len(), 32);
        assert_eq!(
            app.definition.port_definitions[0].labels.get(VIP_LABEL).map(String::as_str),
            Some("/l4lbtest:5000")
        );
        assert!(app.definition.cmd.as_deref().unwrap().ends_with(" $PORT0"));
    }

    #[test]
    fn origin_in_user_mode_joins_overlay_with_vip_on_mapping() {
        let s = scenario(NetworkMode::User, NetworkMode::Bridge);
        let app = WorkloadTemplate::default().origin_app(&s, "10.0.0.7");
        let def = &app.definition;

        assert_eq!(def.network_mode(), NetworkMode::User);
        assert_eq!(def.ip_address.as_ref().unwrap().network_name, "dcos");
        let mapping = &def.container.as_ref().unwrap().docker.port_mappings[0];
        assert_eq!(mapping.container_port, 9080);
        assert_eq!(mapping.labels.get(VIP_LABEL).unwrap(), "/namedvip2:7002");
        assert_eq!(def.constraints[0].pinned_host(), Some("10.0.0.7"));
        assert!(def.cmd.as_deref().unwrap().ends_with(" 9080"));
    }

    #[test]
    fn origin_in_host_mode_puts_vip_on_port_definition() {
        let s = scenario(NetworkMode::Host, NetworkMode::User);
        let def = WorkloadTemplate::default().origin_app(&s, "h").definition;

        assert!(def.container.as_ref().unwrap().docker.port_mappings.is_empty());
        assert_eq!(
            def.port_definitions[0].labels.get(VIP_LABEL).unwrap(),
            "/namedvip2:7002"
        );
        assert!(def.ip_address.is_none());
        assert!(def.cmd.as_deref().unwrap().ends_with(" $PORT0"));
    }

    #[test]
    fn proxy_carries_no_vip() {
        let s = scenario(NetworkMode::Bridge, NetworkMode::Bridge);
        let def = WorkloadTemplate::default().proxy_app(&s, "h2").definition;
        let mapping = &def.container.as_ref().unwrap().docker.port_mappings[0];
        assert!(mapping.labels.is_empty());
        assert_eq!(def.network_mode(), NetworkMode::Bridge);
    }

    #[test]
    fn app_json_uses_camel_case() {
        let def = WorkloadTemplate::default()
            .docker_app(NetworkMode::Bridge, Some("1.1.1.1:7001"))
            .definition;
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["container"]["type"], "DOCKER");
        assert_eq!(json["container"]["docker"]["network"], "BRIDGE");
        assert_eq!(json["container"]["docker"]["portMappings"][0]["containerPort"], 9080);
        assert_eq!(json["healthChecks"][0]["path"], "/ping");
        assert!(json.get("ipAddress").is_none());
    }

    #[test]
    fn statsd_emitter_is_a_plain_command_app() {
        let def = statsd_emitter_app().definition;
        assert_eq!(def.id, "/statsd-emitter");
        assert_eq!(def.network_mode(), NetworkMode::Host);
        assert!(def.health_checks.is_empty());
        assert_eq!(def.port_definitions.len(), 1);
    }

    #[test]
    fn ip_per_container_runs_two_unique_instances() {
        let def = WorkloadTemplate::default().ip_per_container_app().definition;
        assert_eq!(def.instances, 2);
        assert_eq!(def.constraints, vec![Constraint::unique_host()]);
        assert_eq!(def.container_port(), Some(9080));
    }
}
