//! Eureka REST registry payloads
//!
//! Shapes for `GET {eureka}/eureka/apps` with `Accept: application/json`.
//! Field names follow Eureka's own JSON rendering (camelCase, `$`-wrapped
//! port objects).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level response of `GET /eureka/apps`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EurekaApplicationsResponse {
    pub applications: EurekaApplications,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EurekaApplications {
    #[serde(default)]
    pub application: Vec<EurekaApplication>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EurekaApplication {
    pub name: String,
    #[serde(default)]
    pub instance: Vec<EurekaRegistryInstance>,
}

/// Eureka wraps ports in `{"$": 8080, "@enabled": "true"}`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EurekaPort {
    #[serde(rename = "$")]
    pub value: i32,
    #[serde(rename = "@enabled", default)]
    pub enabled: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EurekaRegistryInstance {
    pub instance_id: String,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub app: Option<String>,
    pub ip_addr: String,
    pub status: String,
    #[serde(default)]
    pub port: Option<EurekaPort>,
    #[serde(default)]
    pub last_updated_timestamp: Option<i64>,
    #[serde(default)]
    pub last_dirty_timestamp: Option<i64>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl EurekaRegistryInstance {
    /// The enabled port value, if any
    pub fn port_value(&self) -> Option<i32> {
        self.port.as_ref().map(|p| p.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_eureka_apps_response() {
        let json = r#"{
            "applications": {
                "versions__delta": "1",
                "apps__hashcode": "UP_2_",
                "application": [{
                    "name": "BILLING",
                    "instance": [{
                        "instanceId": "web-01:billing:8080",
                        "hostName": "web-01",
                        "app": "BILLING",
                        "ipAddr": "10.0.0.5",
                        "status": "UP",
                        "port": {"$": 8080, "@enabled": "true"},
                        "lastUpdatedTimestamp": 1722945600000,
                        "metadata": {"zone": "dc1"}
                    }]
                }]
            }
        }"#;
        let response: EurekaApplicationsResponse = serde_json::from_str(json).unwrap();
        let app = &response.applications.application[0];
        assert_eq!(app.name, "BILLING");
        let instance = &app.instance[0];
        assert_eq!(instance.instance_id, "web-01:billing:8080");
        assert_eq!(instance.port_value(), Some(8080));
        assert_eq!(instance.status, "UP");
    }

    #[test]
    fn test_parse_empty_registry() {
        let json = r#"{"applications": {"application": []}}"#;
        let response: EurekaApplicationsResponse = serde_json::from_str(json).unwrap();
        assert!(response.applications.application.is_empty());
    }
}
