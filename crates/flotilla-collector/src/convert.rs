//! Conversions from wire payloads to domain observations
//!
//! Status strings are normalized to their closed sets here so nothing
//! downstream has to re-parse raw values.

use chrono::DateTime;

use flotilla_api::agent::{AgentHaproxyReport, AgentInstance};
use flotilla_api::eureka::EurekaApplicationsResponse;
use flotilla_persistence::model::{
    EurekaApplicationObservation, EurekaInstanceObservation, EurekaStatus,
    HaproxyBackendObservation, HaproxyProcessObservation, HaproxyServerObservation,
    HaproxyStatus, InstanceObservation,
};

fn millis_to_naive(millis: i64) -> Option<chrono::NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

pub fn instance_observation(instance: AgentInstance) -> InstanceObservation {
    InstanceObservation {
        instance_name: instance.instance_name,
        app_type: instance.app_type,
        status: instance.status,
        version: instance.version,
        pid: instance.pid,
        start_time: instance.start_time.and_then(millis_to_naive),
        ip: instance.ip,
        port: instance.port,
        app_path: instance.app_path,
        log_path: instance.log_path,
        container_id: instance.container_id,
        container_image: instance.container_image,
        container_tag: instance.container_tag,
        eureka_registered: instance.eureka_registered,
        eureka_url: instance.eureka_url,
    }
}

pub fn haproxy_processes(report: AgentHaproxyReport) -> Vec<HaproxyProcessObservation> {
    report
        .processes
        .into_iter()
        .map(|process| HaproxyProcessObservation {
            name: process.name,
            backends: process
                .backends
                .into_iter()
                .map(|backend| HaproxyBackendObservation {
                    name: backend.name,
                    servers: backend
                        .servers
                        .into_iter()
                        .map(|server| HaproxyServerObservation {
                            name: server.name,
                            ip: server.ip,
                            port: server.port,
                            status: HaproxyStatus::parse(&server.status).as_str().to_string(),
                            weight: server.weight,
                            current_sessions: server.current_sessions,
                            max_sessions: server.max_sessions,
                            last_state_change_seconds: server.last_state_change,
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

pub fn eureka_applications(
    response: EurekaApplicationsResponse,
) -> Vec<EurekaApplicationObservation> {
    response
        .applications
        .application
        .into_iter()
        .map(|application| EurekaApplicationObservation {
            name: application.name,
            instances: application
                .instance
                .into_iter()
                .map(|instance| {
                    let port = instance.port_value();
                    let metadata = instance
                        .metadata
                        .as_ref()
                        .and_then(|m| serde_json::to_string(m).ok());
                    EurekaInstanceObservation {
                        instance_id: instance.instance_id,
                        hostname: instance.host_name,
                        ip: instance.ip_addr,
                        port,
                        status: EurekaStatus::parse(&instance.status).as_str().to_string(),
                        last_heartbeat: instance
                            .last_updated_timestamp
                            .and_then(millis_to_naive),
                        metadata,
                    }
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haproxy_status_is_normalized() {
        let report: AgentHaproxyReport = serde_json::from_str(
            r#"{"processes": [{"name": "haproxy", "backends": [{
                "name": "be", "servers": [{"name": "s1", "status": "UP 1/2"}]
            }]}]}"#,
        )
        .unwrap();
        let processes = haproxy_processes(report);
        assert_eq!(processes[0].backends[0].servers[0].status, "UP");
    }

    #[test]
    fn test_eureka_unknown_status_is_normalized() {
        let response: EurekaApplicationsResponse = serde_json::from_str(
            r#"{"applications": {"application": [{"name": "APP", "instance": [
                {"instanceId": "a", "ipAddr": "10.0.0.1", "status": "WEIRD"}
            ]}]}}"#,
        )
        .unwrap();
        let applications = eureka_applications(response);
        assert_eq!(applications[0].instances[0].status, "UNKNOWN");
        assert_eq!(applications[0].instances[0].port, None);
    }
}
