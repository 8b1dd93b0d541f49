//! In-process fake of the cluster's HTTP surface for suite tests.
//!
//! One axum server plays every role: the test workloads (`/ping`,
//! `/test_uuid`, `/run_cmd`), the load balancer, the metrics API and the
//! overlay API. The mock orchestrator resolves every instance to it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use probe_client::app::{AppDefinition, VIP_LABEL};
use probe_client::MockOrchestrator;
use probe_types::ServicePoint;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct FakeState {
    orchestrator: MockOrchestrator,
    misrouted: Arc<Mutex<HashSet<u16>>>,
    commands: Arc<Mutex<Vec<String>>>,
    round_robin: Arc<AtomicUsize>,
    degraded: Arc<AtomicBool>,
}

pub struct FakeCluster {
    pub orchestrator: MockOrchestrator,
    pub addr: SocketAddr,
    state: FakeState,
}

impl FakeCluster {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer routing checks on `port` with a token no app holds.
    pub fn misroute_port(&self, port: u16) {
        self.state.misrouted.lock().unwrap().insert(port);
    }

    /// Make overlay and metrics answers unhealthy.
    pub fn degrade(&self) {
        self.state.degraded.store(true, Ordering::SeqCst);
    }

    /// Commands received on `/run_cmd`.
    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }
}

fn vip_of(app: &AppDefinition) -> Option<String> {
    let mapping = app
        .container
        .as_ref()
        .and_then(|c| c.docker.port_mappings.first())
        .and_then(|m| m.labels.get(VIP_LABEL));
    let definition = app.port_definitions.first().and_then(|p| p.labels.get(VIP_LABEL));
    mapping.or(definition).cloned()
}

fn token_of(app: &AppDefinition) -> String {
    app.id
        .strip_prefix(probe_client::app::TEST_APP_PREFIX)
        .unwrap_or(&app.id)
        .to_string()
}

fn command_output(output: Value) -> Json<Value> {
    Json(json!({"status": 0, "output": output.to_string()}))
}

async fn run_cmd(State(state): State<FakeState>, cmd: String) -> Json<Value> {
    state.commands.lock().unwrap().push(cmd.clone());

    if cmd.ends_with("/ping") {
        return command_output(json!({"pong": true}));
    }

    let port = cmd
        .rsplit(':')
        .next()
        .and_then(|tail| tail.split('/').next())
        .and_then(|p| p.parse::<u16>().ok());
    let Some(port) = port else {
        return Json(json!({"status": 3, "output": ""}));
    };

    if state.misrouted.lock().unwrap().contains(&port) {
        return command_output(json!({"test_uuid": "misrouted"}));
    }

    let suffix = format!(":{}", port);
    let token = state
        .orchestrator
        .live_apps()
        .iter()
        .find(|app| vip_of(app).map_or(false, |vip| vip.ends_with(&suffix)))
        .map(token_of);
    match token {
        Some(token) => command_output(json!({ "test_uuid": token })),
        // curl exit 7: nothing listening behind the address yet
        None => Json(json!({"status": 7, "output": ""})),
    }
}

async fn test_uuid(State(state): State<FakeState>) -> Result<Json<Value>, StatusCode> {
    let mut tokens = state.orchestrator.live_tokens();
    tokens.sort();
    if tokens.is_empty() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    let n = state.round_robin.fetch_add(1, Ordering::SeqCst);
    Ok(Json(json!({ "test_uuid": tokens[n % tokens.len()] })))
}

async fn metrics_ping(State(state): State<FakeState>) -> Json<Value> {
    Json(json!({"ok": !state.degraded.load(Ordering::SeqCst)}))
}

async fn metrics_node(State(state): State<FakeState>) -> Json<Value> {
    let cluster_id = if state.degraded.load(Ordering::SeqCst) { "" } else { "cluster-1" };
    Json(json!({
        "datapoints": [
            {"name": "filesystem.capacity.used", "value": 1024, "unit": "bytes", "tags": {"path": "/"}},
            {"name": "load.1min", "value": 0.3, "unit": "count"}
        ],
        "dimensions": {"cluster_id": cluster_id, "hostname": "127.0.0.1"}
    }))
}

async fn metrics_containers(State(state): State<FakeState>) -> Json<Value> {
    let statsd_running = state
        .orchestrator
        .live_apps()
        .iter()
        .any(|app| app.id == "/statsd-emitter");
    if statsd_running {
        Json(json!(["c-other", "c-statsd"]))
    } else {
        Json(json!([]))
    }
}

async fn metrics_container(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    match id.as_str() {
        "c-statsd" => Ok(Json(json!({
            "datapoints": [],
            "dimensions": {"executor_id": "statsd-emitter.a094eed0-b017-11e6-a972-b2bcad3866cb"}
        }))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn metrics_container_app(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    match id.as_str() {
        "c-statsd" => Ok(Json(json!({"datapoints": [], "labels": {"test_tag_key": "test_tag_value"}}))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn overlay(State(state): State<FakeState>) -> Json<Value> {
    let status = if state.degraded.load(Ordering::SeqCst) {
        "STATUS_CONFIGURING"
    } else {
        "STATUS_OK"
    };
    Json(json!({
        "ip": "127.0.0.1",
        "overlays": [{"info": {"name": "dcos", "subnet": "9.0.0.0/8"}, "state": {"status": status}}]
    }))
}

/// Start the fake and point every instance `orchestrator` creates at it.
pub async fn fake_cluster(orchestrator: MockOrchestrator) -> FakeCluster {
    let state = FakeState {
        orchestrator: orchestrator.clone(),
        misrouted: Arc::default(),
        commands: Arc::default(),
        round_robin: Arc::default(),
        degraded: Arc::default(),
    };

    let router = Router::new()
        .route("/ping", get(|| async { Json(json!({"pong": true})) }))
        .route("/test_uuid", get(test_uuid))
        .route("/run_cmd", post(run_cmd))
        .route("/system/v1/metrics/v0/ping", get(metrics_ping))
        .route("/system/v1/metrics/v0/node", get(metrics_node))
        .route("/system/v1/metrics/v0/containers", get(metrics_containers))
        .route("/system/v1/metrics/v0/containers/:id", get(metrics_container))
        .route("/system/v1/metrics/v0/containers/:id/app", get(metrics_container_app))
        .route("/overlay-agent/overlay", get(overlay))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let port = addr.port();
    orchestrator.resolve_endpoints_with(move |_app, instance| ServicePoint {
        host: "127.0.0.1".into(),
        port,
        ip: Some(format!("9.0.0.{}", instance + 1)),
    });

    FakeCluster {
        orchestrator,
        addr,
        state,
    }
}
