//! Routing checks through a deployed proxy workload.
//!
//! The proxy's `POST /run_cmd` endpoint runs a shell command on its
//! agent and answers `{"status": <exit code>, "output": "<stdout>"}`. To
//! check that a routable address reaches the right backend, the probe asks
//! the proxy to `curl <address>/test_uuid` and compares the token in the
//! output with the one the origin was deployed with.

use probe_core::RetryPolicy;
use probe_types::{ProbeError, ServicePoint};
use serde::Deserialize;
use std::time::Duration;

/// Curl binary available on every agent.
pub const DEFAULT_CURL: &str = "/opt/mesosphere/bin/curl";

/// Elapsed ceiling for plain URL fetches.
pub const DEFAULT_FETCH_MAX_ELAPSED: Duration = Duration::from_secs(200);

#[derive(Debug, Deserialize)]
struct CommandResult {
    status: i64,
    #[serde(default)]
    output: String,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    test_uuid: String,
}

/// Token observed by one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReading {
    /// Token returned through the routable address.
    pub token: String,
    /// Whether it equals the expected one.
    pub matched: bool,
}

/// Sends routing checks through proxy workloads.
#[derive(Debug, Clone)]
pub struct RoutabilityProbe {
    http: reqwest::Client,
    fixed_delay: Duration,
    max_elapsed: Duration,
    curl: String,
}

impl RoutabilityProbe {
    /// Probe with the default 2s delay and 500s ceiling.
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            fixed_delay: probe_core::DEFAULT_FIXED_DELAY,
            max_elapsed: probe_core::DEFAULT_MAX_ELAPSED,
            curl: DEFAULT_CURL.into(),
        }
    }

    /// Override the retry delay and ceiling.
    pub fn with_retry(mut self, fixed_delay: Duration, max_elapsed: Duration) -> Self {
        self.fixed_delay = fixed_delay;
        self.max_elapsed = max_elapsed;
        self
    }

    /// Override the curl binary.
    pub fn with_curl(mut self, curl: impl Into<String>) -> Self {
        self.curl = curl.into();
        self
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Shell command fetching `path` from `address` with a 5s cap.
    pub fn routing_command(&self, address: &str, path: &str) -> String {
        format!("{} -s -f -m 5 http://{}{}", self.curl, address, path)
    }

    /// Run `cmd` on `proxy` and parse its stdout as JSON.
    ///
    /// A non-zero exit status is transient: the address may not route yet.
    pub async fn run_command(&self, proxy: &ServicePoint, cmd: &str) -> Result<serde_json::Value, ProbeError> {
        let uri = format!("{}/run_cmd", proxy.base_url());
        tracing::debug!(uri = %uri, cmd, "sending command");

        let response = self
            .http
            .post(&uri)
            .body(cmd.to_string())
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response).await?;

        let result: CommandResult = response
            .json()
            .await
            .map_err(|e| ProbeError::ProbeUnreachable(format!("bad run_cmd response: {}", e)))?;
        tracing::debug!(status = result.status, output = %result.output, "command finished");

        if result.status != 0 {
            return Err(ProbeError::TransientUnavailable(format!(
                "command exited with status {}",
                result.status
            )));
        }
        serde_json::from_str(&result.output)
            .map_err(|e| ProbeError::TransientUnavailable(format!("unparseable command output: {}", e)))
    }

    /// One routing check of `routable` through the first proxy endpoint.
    pub async fn attempt(
        &self,
        routable: &str,
        expected_token: &str,
        proxy: &[ServicePoint],
    ) -> Result<ProbeReading, ProbeError> {
        let proxy = proxy
            .first()
            .ok_or_else(|| ProbeError::ProbeUnreachable("proxy has no endpoints".into()))?;
        let cmd = self.routing_command(routable, "/test_uuid");
        let payload: TokenPayload = serde_json::from_value(self.run_command(proxy, &cmd).await?)
            .map_err(|e| ProbeError::TransientUnavailable(format!("no test_uuid in output: {}", e)))?;

        Ok(ProbeReading {
            matched: payload.test_uuid == expected_token,
            token: payload.test_uuid,
        })
    }

    /// Check, retrying until the ceiling, that `routable` reaches the
    /// workload holding `expected_token`.
    pub async fn verify(
        &self,
        routable: &str,
        expected_token: &str,
        proxy: &[ServicePoint],
    ) -> Result<(), ProbeError> {
        let policy = RetryPolicy::fixed(self.fixed_delay, self.max_elapsed)
            .retry_on_result(|reading: &ProbeReading| !reading.matched);

        let reading = policy
            .run(move || self.attempt(routable, expected_token, proxy))
            .await?;

        if reading.matched {
            tracing::debug!(routable, token = %reading.token, "routing verified");
            Ok(())
        } else {
            Err(ProbeError::RoutingMismatch {
                expected: expected_token.to_string(),
                actual: reading.token,
            })
        }
    }

    /// Retry `cmd` on `proxy` until it exits 0.
    pub async fn ensure_command(&self, proxy: &[ServicePoint], cmd: &str) -> Result<serde_json::Value, ProbeError> {
        let proxy = proxy
            .first()
            .ok_or_else(|| ProbeError::ProbeUnreachable("proxy has no endpoints".into()))?;
        RetryPolicy::fixed(self.fixed_delay, self.max_elapsed)
            .run(move || self.run_command(proxy, cmd))
            .await
    }

    /// `GET url` once and parse a 200 response as JSON.
    pub async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, ProbeError> {
        let response = self.http.get(url).send().await.map_err(request_error)?;
        let response = check_status(response).await?;
        let value = response
            .json()
            .await
            .map_err(|e| ProbeError::TransientUnavailable(format!("bad json from {}: {}", url, e)))?;
        tracing::debug!(url, "fetched");
        Ok(value)
    }

    /// [`fetch_json`](Self::fetch_json), retried every `fixed_delay` for up
    /// to `max_elapsed`.
    pub async fn fetch_json_retrying(
        &self,
        url: &str,
        max_elapsed: Duration,
    ) -> Result<serde_json::Value, ProbeError> {
        RetryPolicy::fixed(self.fixed_delay, max_elapsed)
            .run(move || self.fetch_json(url))
            .await
    }
}

fn request_error(e: reqwest::Error) -> ProbeError {
    if e.is_connect() || e.is_timeout() {
        ProbeError::TransientUnavailable(e.to_string())
    } else {
        ProbeError::ProbeUnreachable(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProbeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(ProbeError::TransientUnavailable(format!("status {}: {}", status.as_u16(), body)))
    } else {
        Err(ProbeError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
