//! Per-host agent contract
//!
//! The agent exposes two read-only endpoints:
//! - `GET /api/inventory` — instances running on the host
//! - `GET /api/haproxy` — HAProxy processes with their backends and members
//!
//! Both return the shapes below. The inventory response may embed the HAProxy
//! and Eureka blocks as well; the dedicated collectors poll their own
//! endpoint so each source keeps its own cadence and fetch-status.

use serde::{Deserialize, Serialize};

/// One application instance as reported by the host agent
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentInstance {
    pub instance_name: String,
    pub app_type: String,
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub pid: Option<i64>,
    /// Start time in epoch milliseconds
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: Option<i32>,
    #[serde(default)]
    pub app_path: Option<String>,
    #[serde(default)]
    pub log_path: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub container_image: Option<String>,
    #[serde(default)]
    pub container_tag: Option<String>,
    #[serde(default)]
    pub eureka_registered: bool,
    #[serde(default)]
    pub eureka_url: Option<String>,
}

/// Full inventory response from `GET /api/inventory`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentInventory {
    pub hostname: String,
    #[serde(default)]
    pub instances: Vec<AgentInstance>,
    #[serde(default)]
    pub haproxy: Option<AgentHaproxyReport>,
    #[serde(default)]
    pub eureka: Option<AgentEurekaReport>,
}

/// One HAProxy backend member as seen on the stats socket
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentHaproxyServer {
    pub name: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: Option<i32>,
    pub status: String,
    #[serde(default)]
    pub weight: Option<i32>,
    /// Current sessions (scur)
    #[serde(default)]
    pub current_sessions: Option<i64>,
    /// Max sessions observed (smax)
    #[serde(default)]
    pub max_sessions: Option<i64>,
    /// Seconds since last state change
    #[serde(default)]
    pub last_state_change: Option<i64>,
}

/// One HAProxy backend with its member servers
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentHaproxyBackend {
    pub name: String,
    #[serde(default)]
    pub servers: Vec<AgentHaproxyServer>,
}

/// One HAProxy process on the host
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentHaproxyProcess {
    pub name: String,
    #[serde(default)]
    pub backends: Vec<AgentHaproxyBackend>,
}

/// Response from `GET /api/haproxy`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentHaproxyReport {
    #[serde(default)]
    pub processes: Vec<AgentHaproxyProcess>,
}

/// Optional Eureka block embedded in the inventory response.
///
/// Only the registry URL is taken from here; registry contents are polled
/// from Eureka itself.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentEurekaReport {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_minimal_payload() {
        let json = r#"{
            "hostname": "web-01",
            "instances": [
                {"instance_name": "billing-1", "app_type": "java", "status": "online"}
            ]
        }"#;
        let inv: AgentInventory = serde_json::from_str(json).unwrap();
        assert_eq!(inv.hostname, "web-01");
        assert_eq!(inv.instances.len(), 1);
        assert!(inv.haproxy.is_none());
        assert_eq!(inv.instances[0].status, "online");
        assert!(inv.instances[0].version.is_none());
    }

    #[test]
    fn test_haproxy_report_payload() {
        let json = r#"{
            "processes": [{
                "name": "haproxy",
                "backends": [{
                    "name": "billing_be",
                    "servers": [
                        {"name": "web-01_billing-1", "ip": "10.0.0.5", "port": 8080,
                         "status": "UP", "weight": 100, "current_sessions": 7,
                         "max_sessions": 40, "last_state_change": 3600}
                    ]
                }]
            }]
        }"#;
        let report: AgentHaproxyReport = serde_json::from_str(json).unwrap();
        let server = &report.processes[0].backends[0].servers[0];
        assert_eq!(server.current_sessions, Some(7));
        assert_eq!(server.status, "UP");
    }
}
