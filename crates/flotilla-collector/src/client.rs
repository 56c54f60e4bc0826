//! HTTP clients for the agent and Eureka REST endpoints
//!
//! Remote errors are translated to the closed error kinds
//! (`remote_unavailable | timeout | remote_malformed`); nothing here ever
//! panics a collector loop.

use std::time::Duration;

use flotilla_api::agent::{AgentHaproxyReport, AgentInventory};
use flotilla_api::eureka::EurekaApplicationsResponse;
use flotilla_common::FlotillaError;

fn classify(err: reqwest::Error, endpoint: &str) -> FlotillaError {
    if err.is_timeout() {
        FlotillaError::Timeout(format!("{}: {}", endpoint, err))
    } else if err.is_decode() {
        FlotillaError::RemoteMalformed(format!("{}: {}", endpoint, err))
    } else {
        FlotillaError::RemoteUnavailable(format!("{}: {}", endpoint, err))
    }
}

fn check_status(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<reqwest::Response, FlotillaError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
        return Err(FlotillaError::NotFound(format!("{}: {}", endpoint, status)));
    }
    if !status.is_success() {
        return Err(FlotillaError::RemoteUnavailable(format!(
            "{}: {}",
            endpoint, status
        )));
    }
    Ok(response)
}

/// Client for the per-host agent's read-only endpoints
#[derive(Clone)]
pub struct AgentClient {
    http: reqwest::Client,
}

impl AgentClient {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build agent HTTP client");
        Self { http }
    }

    /// `GET http://{ip}:{port}/api/inventory`
    pub async fn fetch_inventory(
        &self,
        ip: &str,
        port: i32,
    ) -> Result<AgentInventory, FlotillaError> {
        let endpoint = format!("http://{}:{}/api/inventory", ip, port);
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| classify(e, &endpoint))?;
        check_status(response, &endpoint)?
            .json::<AgentInventory>()
            .await
            .map_err(|e| classify(e, &endpoint))
    }

    /// `GET http://{ip}:{port}/api/haproxy`
    pub async fn fetch_haproxy(
        &self,
        ip: &str,
        port: i32,
    ) -> Result<AgentHaproxyReport, FlotillaError> {
        let endpoint = format!("http://{}:{}/api/haproxy", ip, port);
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| classify(e, &endpoint))?;
        check_status(response, &endpoint)?
            .json::<AgentHaproxyReport>()
            .await
            .map_err(|e| classify(e, &endpoint))
    }
}

/// Client for the Eureka registry REST API
#[derive(Clone)]
pub struct EurekaClient {
    http: reqwest::Client,
}

impl EurekaClient {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build eureka HTTP client");
        Self { http }
    }

    /// `GET {base}/apps` with a JSON accept header
    pub async fn fetch_applications(
        &self,
        base_url: &str,
    ) -> Result<EurekaApplicationsResponse, FlotillaError> {
        let endpoint = format!("{}/apps", base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| classify(e, &endpoint))?;
        check_status(response, &endpoint)?
            .json::<EurekaApplicationsResponse>()
            .await
            .map_err(|e| classify(e, &endpoint))
    }
}
