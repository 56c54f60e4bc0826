//! Pure reconciliation functions
//!
//! Each function is a pure computation over `(prior rows, observation batch)`
//! producing a delta the store applies in one transaction. Rules, in order:
//! match by natural key (reviving tombstones in place), upsert observed
//! fields, record audited changes, tombstone absent keys. Hard deletion
//! never happens here.

use std::collections::HashMap;

use flotilla_persistence::entity::{
    app_instance, eureka_application, eureka_instance, haproxy_backend, haproxy_instance,
    haproxy_server,
};
use flotilla_persistence::model::{
    EurekaApplicationCreate, EurekaApplicationObservation, EurekaApplicationUpdate, EurekaDelta,
    EurekaInstanceObservation, EurekaInstanceUpdate, FieldChange, HaproxyBackendCreate,
    HaproxyBackendObservation, HaproxyBackendUpdate, HaproxyDelta, HaproxyProcessCreate,
    HaproxyProcessObservation, HaproxyProcessUpdate, HaproxyServerObservation,
    HaproxyServerUpdate, InstanceDelta, InstanceObservation, InstanceUpdate,
};

/// Deduplicate observations by key, last one winning. Duplicates produce a
/// warning describing the key.
fn dedup_by_key<'a, T, K: std::hash::Hash + Eq + std::fmt::Debug>(
    items: &'a [T],
    key: impl Fn(&T) -> K,
    warnings: &mut Vec<String>,
) -> Vec<&'a T> {
    let mut order: Vec<K> = Vec::with_capacity(items.len());
    let mut seen: HashMap<K, &T> = HashMap::with_capacity(items.len());
    for item in items {
        let k = key(item);
        if seen.insert(key(item), item).is_some() {
            warnings.push(format!("duplicate natural key in observation: {:?}", k));
        } else {
            order.push(k);
        }
    }
    order.into_iter().map(|k| seen[&k]).collect()
}

fn change(
    field: &'static str,
    old: Option<&str>,
    new: Option<&str>,
    changes: &mut Vec<FieldChange>,
) {
    if old != new {
        changes.push(FieldChange {
            field,
            old: old.map(str::to_string),
            new: new.map(str::to_string),
        });
    }
}

/// Reconcile one agent batch against the prior rows of the same server.
pub fn reconcile_instances(
    prior: &[app_instance::Model],
    observed: &[InstanceObservation],
) -> InstanceDelta {
    let mut delta = InstanceDelta::default();

    let deduped = dedup_by_key(
        observed,
        |o| (o.instance_name.clone(), o.app_type.clone()),
        &mut delta.warnings,
    );

    let prior_by_key: HashMap<(&str, &str), &app_instance::Model> = prior
        .iter()
        .map(|row| ((row.instance_name.as_str(), row.app_type.as_str()), row))
        .collect();

    let mut observed_keys: Vec<(&str, &str)> = Vec::with_capacity(deduped.len());
    for obs in deduped {
        observed_keys.push(obs.natural_key());
        match prior_by_key.get(&obs.natural_key()) {
            None => delta.creates.push(obs.clone()),
            Some(row) => {
                let mut changes = Vec::new();
                change("status", Some(&row.status), Some(&obs.status), &mut changes);
                change(
                    "version",
                    row.version.as_deref(),
                    obs.version.as_deref(),
                    &mut changes,
                );
                change(
                    "container_image",
                    row.container_image.as_deref(),
                    obs.container_image.as_deref(),
                    &mut changes,
                );
                change(
                    "container_tag",
                    row.container_tag.as_deref(),
                    obs.container_tag.as_deref(),
                    &mut changes,
                );
                let endpoint_changed = row.ip != obs.ip || row.port != obs.port;
                delta.updates.push(InstanceUpdate {
                    id: row.id,
                    observed: obs.clone(),
                    revive: row.deleted_at.is_some(),
                    endpoint_changed,
                    changes,
                });
            }
        }
    }

    for row in prior {
        let key = (row.instance_name.as_str(), row.app_type.as_str());
        if row.deleted_at.is_none() && !observed_keys.contains(&key) {
            delta.tombstone_ids.push(row.id);
        }
    }
    delta
}

fn reconcile_backend(
    backend_row: &haproxy_backend::Model,
    prior_servers: &[haproxy_server::Model],
    observed: &HaproxyBackendObservation,
    warnings: &mut Vec<String>,
) -> HaproxyBackendUpdate {
    let mut update = HaproxyBackendUpdate {
        id: backend_row.id,
        revive: backend_row.removed_at.is_some(),
        server_creates: Vec::new(),
        server_updates: Vec::new(),
        server_tombstones: Vec::new(),
    };

    let deduped: Vec<&HaproxyServerObservation> =
        dedup_by_key(&observed.servers, |s| s.name.clone(), warnings);

    let prior_by_name: HashMap<&str, &haproxy_server::Model> = prior_servers
        .iter()
        .filter(|s| s.backend_id == backend_row.id)
        .map(|s| (s.name.as_str(), s))
        .collect();

    let mut observed_names: Vec<&str> = Vec::with_capacity(deduped.len());
    for obs in deduped {
        observed_names.push(obs.name.as_str());
        match prior_by_name.get(obs.name.as_str()) {
            None => update.server_creates.push(obs.clone()),
            Some(row) => {
                let status_change = if row.status != obs.status {
                    Some((Some(row.status.clone()), obs.status.clone()))
                } else {
                    None
                };
                update.server_updates.push(HaproxyServerUpdate {
                    id: row.id,
                    observed: obs.clone(),
                    revive: row.removed_at.is_some(),
                    status_change,
                });
            }
        }
    }

    for row in prior_servers.iter().filter(|s| s.backend_id == backend_row.id) {
        if row.removed_at.is_none() && !observed_names.contains(&row.name.as_str()) {
            update.server_tombstones.push(row.id);
        }
    }
    update
}

/// Reconcile one HAProxy batch against the prior tree of the same server.
///
/// A member that disappears from one backend and reappears in another within
/// one cycle becomes a delete plus a create: backend membership is part of
/// identity, so the matching below never crosses backends.
pub fn reconcile_haproxy(
    prior_processes: &[haproxy_instance::Model],
    prior_backends: &[haproxy_backend::Model],
    prior_servers: &[haproxy_server::Model],
    observed: &[HaproxyProcessObservation],
) -> HaproxyDelta {
    let mut delta = HaproxyDelta::default();

    let deduped: Vec<&HaproxyProcessObservation> =
        dedup_by_key(observed, |p| p.name.clone(), &mut delta.warnings);

    let prior_by_name: HashMap<&str, &haproxy_instance::Model> = prior_processes
        .iter()
        .map(|p| (p.name.as_str(), p))
        .collect();

    let mut observed_names: Vec<&str> = Vec::with_capacity(deduped.len());
    for process_obs in deduped {
        observed_names.push(process_obs.name.as_str());
        match prior_by_name.get(process_obs.name.as_str()) {
            None => {
                delta.process_creates.push(HaproxyProcessCreate {
                    name: process_obs.name.clone(),
                    backends: process_obs
                        .backends
                        .iter()
                        .map(|b| HaproxyBackendCreate {
                            name: b.name.clone(),
                            servers: b.servers.clone(),
                        })
                        .collect(),
                });
            }
            Some(process_row) => {
                let mut process_update = HaproxyProcessUpdate {
                    id: process_row.id,
                    revive: process_row.removed_at.is_some(),
                    backend_creates: Vec::new(),
                    backend_updates: Vec::new(),
                    backend_tombstones: Vec::new(),
                };

                let backend_rows: Vec<&haproxy_backend::Model> = prior_backends
                    .iter()
                    .filter(|b| b.haproxy_instance_id == process_row.id)
                    .collect();
                let deduped_backends: Vec<&HaproxyBackendObservation> = dedup_by_key(
                    &process_obs.backends,
                    |b| b.name.clone(),
                    &mut delta.warnings,
                );

                let mut observed_backends: Vec<&str> =
                    Vec::with_capacity(deduped_backends.len());
                for backend_obs in deduped_backends {
                    observed_backends.push(backend_obs.name.as_str());
                    match backend_rows.iter().find(|b| b.name == backend_obs.name) {
                        None => process_update.backend_creates.push(HaproxyBackendCreate {
                            name: backend_obs.name.clone(),
                            servers: backend_obs.servers.clone(),
                        }),
                        Some(backend_row) => process_update.backend_updates.push(
                            reconcile_backend(
                                backend_row,
                                prior_servers,
                                backend_obs,
                                &mut delta.warnings,
                            ),
                        ),
                    }
                }

                for backend_row in &backend_rows {
                    if backend_row.removed_at.is_none()
                        && !observed_backends.contains(&backend_row.name.as_str())
                    {
                        process_update.backend_tombstones.push(backend_row.id);
                    }
                }
                delta.process_updates.push(process_update);
            }
        }
    }

    for process_row in prior_processes {
        if process_row.removed_at.is_none()
            && !observed_names.contains(&process_row.name.as_str())
        {
            delta.process_tombstones.push(process_row.id);
        }
    }
    delta
}

/// Reconcile one Eureka registry snapshot against the prior tree of the same
/// registry endpoint.
pub fn reconcile_eureka(
    prior_applications: &[eureka_application::Model],
    prior_instances: &[eureka_instance::Model],
    observed: &[EurekaApplicationObservation],
) -> EurekaDelta {
    let mut delta = EurekaDelta::default();

    let deduped: Vec<&EurekaApplicationObservation> =
        dedup_by_key(observed, |a| a.name.clone(), &mut delta.warnings);

    let prior_by_name: HashMap<&str, &eureka_application::Model> = prior_applications
        .iter()
        .map(|a| (a.name.as_str(), a))
        .collect();

    let mut observed_names: Vec<&str> = Vec::with_capacity(deduped.len());
    for app_obs in deduped {
        observed_names.push(app_obs.name.as_str());
        match prior_by_name.get(app_obs.name.as_str()) {
            None => delta.application_creates.push(EurekaApplicationCreate {
                name: app_obs.name.clone(),
                instances: app_obs.instances.clone(),
            }),
            Some(app_row) => {
                let mut app_update = EurekaApplicationUpdate {
                    id: app_row.id,
                    revive: app_row.removed_at.is_some(),
                    instance_creates: Vec::new(),
                    instance_updates: Vec::new(),
                    instance_tombstones: Vec::new(),
                };

                let instance_rows: Vec<&eureka_instance::Model> = prior_instances
                    .iter()
                    .filter(|i| i.eureka_application_id == app_row.id)
                    .collect();
                let deduped_instances: Vec<&EurekaInstanceObservation> = dedup_by_key(
                    &app_obs.instances,
                    |i| i.instance_id.clone(),
                    &mut delta.warnings,
                );

                let mut observed_instances: Vec<&str> =
                    Vec::with_capacity(deduped_instances.len());
                for instance_obs in deduped_instances {
                    observed_instances.push(instance_obs.instance_id.as_str());
                    match instance_rows
                        .iter()
                        .find(|i| i.instance_id == instance_obs.instance_id)
                    {
                        None => app_update.instance_creates.push(instance_obs.clone()),
                        Some(instance_row) => {
                            let status_change = if instance_row.status != instance_obs.status {
                                Some((
                                    Some(instance_row.status.clone()),
                                    instance_obs.status.clone(),
                                ))
                            } else {
                                None
                            };
                            app_update.instance_updates.push(EurekaInstanceUpdate {
                                id: instance_row.id,
                                observed: instance_obs.clone(),
                                revive: instance_row.removed_at.is_some(),
                                status_change,
                            });
                        }
                    }
                }

                for instance_row in &instance_rows {
                    if instance_row.removed_at.is_none()
                        && !observed_instances.contains(&instance_row.instance_id.as_str())
                    {
                        app_update.instance_tombstones.push(instance_row.id);
                    }
                }
                delta.application_updates.push(app_update);
            }
        }
    }

    for app_row in prior_applications {
        if app_row.removed_at.is_none() && !observed_names.contains(&app_row.name.as_str()) {
            delta.application_tombstones.push(app_row.id);
        }
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn ts() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-08-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn instance_row(
        id: i64,
        name: &str,
        status: &str,
        version: Option<&str>,
        deleted: bool,
    ) -> app_instance::Model {
        app_instance::Model {
            id,
            server_id: 1,
            instance_name: name.to_string(),
            app_type: "java".to_string(),
            catalog_id: None,
            group_id: None,
            status: status.to_string(),
            version: version.map(str::to_string),
            pid: Some(4242),
            start_time: None,
            ip: Some("10.0.0.5".to_string()),
            port: Some(8080),
            app_path: None,
            log_path: None,
            container_id: None,
            container_image: None,
            container_tag: None,
            eureka_registered: false,
            eureka_url: None,
            custom_playbook: None,
            custom_distr_url: None,
            last_seen: Some(ts()),
            deleted_at: deleted.then(ts),
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn observation(name: &str, status: &str, version: Option<&str>) -> InstanceObservation {
        InstanceObservation {
            instance_name: name.to_string(),
            app_type: "java".to_string(),
            status: status.to_string(),
            version: version.map(str::to_string),
            pid: Some(4242),
            ip: Some("10.0.0.5".to_string()),
            port: Some(8080),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_instance_is_created() {
        let delta = reconcile_instances(&[], &[observation("app-1", "online", Some("1.0"))]);
        assert_eq!(delta.creates.len(), 1);
        assert!(delta.updates.is_empty());
        assert!(delta.tombstone_ids.is_empty());
    }

    #[test]
    fn test_known_instance_is_updated_not_recreated() {
        let prior = vec![instance_row(7, "app-1", "online", Some("1.0"), false)];
        let delta = reconcile_instances(&prior, &[observation("app-1", "online", Some("1.0"))]);
        assert!(delta.creates.is_empty());
        assert_eq!(delta.updates.len(), 1);
        assert_eq!(delta.updates[0].id, 7);
        assert!(delta.updates[0].changes.is_empty());
        assert!(delta.is_noop());
    }

    #[test]
    fn test_soft_deleted_twin_is_revived() {
        let prior = vec![instance_row(7, "app-1", "online", Some("1.0"), true)];
        let delta = reconcile_instances(&prior, &[observation("app-1", "online", Some("1.0"))]);
        assert!(delta.creates.is_empty());
        assert_eq!(delta.updates.len(), 1);
        assert!(delta.updates[0].revive);
    }

    #[test]
    fn test_absent_instance_is_tombstoned() {
        let prior = vec![
            instance_row(7, "app-1", "online", Some("1.0"), false),
            instance_row(8, "app-2", "online", Some("1.0"), false),
        ];
        let delta = reconcile_instances(&prior, &[observation("app-1", "online", Some("1.0"))]);
        assert_eq!(delta.tombstone_ids, vec![8]);
    }

    #[test]
    fn test_already_tombstoned_row_is_not_retombstoned() {
        let prior = vec![instance_row(8, "app-2", "online", None, true)];
        let delta = reconcile_instances(&prior, &[]);
        assert!(delta.tombstone_ids.is_empty());
        assert!(delta.is_noop());
    }

    #[test]
    fn test_audited_fields_produce_changes() {
        let prior = vec![instance_row(7, "app-1", "online", Some("1.0"), false)];
        let delta = reconcile_instances(&prior, &[observation("app-1", "offline", Some("1.1"))]);
        let changes = &delta.updates[0].changes;
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().any(|c| c.field == "status"));
        assert!(
            changes
                .iter()
                .any(|c| c.field == "version" && c.new.as_deref() == Some("1.1"))
        );
    }

    #[test]
    fn test_endpoint_change_is_flagged() {
        let prior = vec![instance_row(7, "app-1", "online", Some("1.0"), false)];
        let mut moved = observation("app-1", "online", Some("1.0"));
        moved.port = Some(9090);
        let delta = reconcile_instances(&prior, &[moved]);
        assert!(delta.updates[0].endpoint_changed);
        assert!(delta.updates[0].changes.is_empty());
    }

    #[test]
    fn test_duplicate_key_second_wins_with_warning() {
        let first = observation("app-1", "online", Some("1.0"));
        let second = observation("app-1", "offline", Some("2.0"));
        let delta = reconcile_instances(&[], &[first, second]);
        assert_eq!(delta.creates.len(), 1);
        assert_eq!(delta.creates[0].status, "offline");
        assert_eq!(delta.warnings.len(), 1);
    }

    #[test]
    fn test_second_run_with_same_batch_is_noop() {
        let batch = vec![observation("app-1", "online", Some("1.0"))];
        let first = reconcile_instances(&[], &batch);
        assert_eq!(first.creates.len(), 1);

        // Simulate the applied state and run again
        let prior = vec![instance_row(1, "app-1", "online", Some("1.0"), false)];
        let second = reconcile_instances(&prior, &batch);
        assert!(second.is_noop());
        assert!(second.updates[0].changes.is_empty());
    }

    // ------------------------------------------------------------------
    // HAProxy tree
    // ------------------------------------------------------------------

    fn haproxy_process_row(id: i64, name: &str) -> haproxy_instance::Model {
        haproxy_instance::Model {
            id,
            server_id: 1,
            name: name.to_string(),
            last_seen: Some(ts()),
            removed_at: None,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn haproxy_backend_row(id: i64, process_id: i64, name: &str) -> haproxy_backend::Model {
        haproxy_backend::Model {
            id,
            haproxy_instance_id: process_id,
            name: name.to_string(),
            last_seen: Some(ts()),
            removed_at: None,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn haproxy_server_row(
        id: i64,
        backend_id: i64,
        name: &str,
        status: &str,
    ) -> haproxy_server::Model {
        haproxy_server::Model {
            id,
            backend_id,
            name: name.to_string(),
            ip: Some("10.0.0.5".to_string()),
            port: Some(8080),
            status: status.to_string(),
            weight: Some(100),
            current_sessions: Some(0),
            max_sessions: Some(10),
            last_state_change_seconds: Some(60),
            last_seen: Some(ts()),
            removed_at: None,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn haproxy_observation(
        process: &str,
        backend: &str,
        servers: Vec<(&str, &str)>,
    ) -> HaproxyProcessObservation {
        HaproxyProcessObservation {
            name: process.to_string(),
            backends: vec![HaproxyBackendObservation {
                name: backend.to_string(),
                servers: servers
                    .into_iter()
                    .map(|(name, status)| HaproxyServerObservation {
                        name: name.to_string(),
                        ip: Some("10.0.0.5".to_string()),
                        port: Some(8080),
                        status: status.to_string(),
                        weight: Some(100),
                        current_sessions: Some(0),
                        max_sessions: Some(10),
                        last_state_change_seconds: Some(60),
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn test_haproxy_status_change_recorded() {
        let processes = vec![haproxy_process_row(1, "haproxy")];
        let backends = vec![haproxy_backend_row(10, 1, "billing_be")];
        let servers = vec![haproxy_server_row(100, 10, "web-01", "UP")];
        let observed = vec![haproxy_observation("haproxy", "billing_be", vec![(
            "web-01", "DRAIN",
        )])];
        let delta = reconcile_haproxy(&processes, &backends, &servers, &observed);
        let server_update = &delta.process_updates[0].backend_updates[0].server_updates[0];
        assert_eq!(
            server_update.status_change,
            Some((Some("UP".to_string()), "DRAIN".to_string()))
        );
    }

    #[test]
    fn test_haproxy_backend_move_is_delete_plus_create() {
        let processes = vec![haproxy_process_row(1, "haproxy")];
        let backends = vec![
            haproxy_backend_row(10, 1, "billing_be"),
            haproxy_backend_row(11, 1, "orders_be"),
        ];
        let servers = vec![haproxy_server_row(100, 10, "web-01", "UP")];
        // web-01 disappears from billing_be and shows up in orders_be
        let observed = vec![HaproxyProcessObservation {
            name: "haproxy".to_string(),
            backends: vec![
                HaproxyBackendObservation {
                    name: "billing_be".to_string(),
                    servers: vec![],
                },
                HaproxyBackendObservation {
                    name: "orders_be".to_string(),
                    servers: vec![HaproxyServerObservation {
                        name: "web-01".to_string(),
                        status: "UP".to_string(),
                        ..Default::default()
                    }],
                },
            ],
        }];
        let delta = reconcile_haproxy(&processes, &backends, &servers, &observed);
        let update = &delta.process_updates[0];
        let billing = update.backend_updates.iter().find(|b| b.id == 10).unwrap();
        let orders = update.backend_updates.iter().find(|b| b.id == 11).unwrap();
        assert_eq!(billing.server_tombstones, vec![100]);
        assert_eq!(orders.server_creates.len(), 1);
        assert!(orders.server_updates.is_empty());
    }

    #[test]
    fn test_haproxy_idempotent_second_run() {
        let processes = vec![haproxy_process_row(1, "haproxy")];
        let backends = vec![haproxy_backend_row(10, 1, "billing_be")];
        let servers = vec![haproxy_server_row(100, 10, "web-01", "UP")];
        let observed = vec![haproxy_observation("haproxy", "billing_be", vec![(
            "web-01", "UP",
        )])];
        let delta = reconcile_haproxy(&processes, &backends, &servers, &observed);
        assert!(delta.is_noop());
    }

    // ------------------------------------------------------------------
    // Eureka tree
    // ------------------------------------------------------------------

    fn eureka_app_row(id: i64, name: &str) -> eureka_application::Model {
        eureka_application::Model {
            id,
            eureka_server_id: 1,
            name: name.to_string(),
            last_seen: Some(ts()),
            removed_at: None,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn eureka_instance_row(id: i64, app_id: i64, instance_id: &str) -> eureka_instance::Model {
        eureka_instance::Model {
            id,
            eureka_application_id: app_id,
            instance_id: instance_id.to_string(),
            hostname: Some("web-01".to_string()),
            ip: "10.0.0.5".to_string(),
            port: Some(8080),
            status: "UP".to_string(),
            last_heartbeat: None,
            metadata: None,
            last_seen: Some(ts()),
            removed_at: None,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    #[test]
    fn test_eureka_instance_matched_by_instance_id() {
        let apps = vec![eureka_app_row(1, "BILLING")];
        let instances = vec![eureka_instance_row(10, 1, "web-01:billing:8080")];
        let observed = vec![EurekaApplicationObservation {
            name: "BILLING".to_string(),
            instances: vec![EurekaInstanceObservation {
                instance_id: "web-01:billing:8080".to_string(),
                ip: "10.0.0.5".to_string(),
                status: "OUT_OF_SERVICE".to_string(),
                ..Default::default()
            }],
        }];
        let delta = reconcile_eureka(&apps, &instances, &observed);
        let update = &delta.application_updates[0].instance_updates[0];
        assert_eq!(update.id, 10);
        assert_eq!(
            update.status_change,
            Some((Some("UP".to_string()), "OUT_OF_SERVICE".to_string()))
        );
    }

    #[test]
    fn test_eureka_vanished_application_tombstoned() {
        let apps = vec![eureka_app_row(1, "BILLING"), eureka_app_row(2, "ORDERS")];
        let instances = vec![eureka_instance_row(10, 1, "a"), eureka_instance_row(20, 2, "b")];
        let observed = vec![EurekaApplicationObservation {
            name: "BILLING".to_string(),
            instances: vec![EurekaInstanceObservation {
                instance_id: "a".to_string(),
                ip: "10.0.0.5".to_string(),
                status: "UP".to_string(),
                ..Default::default()
            }],
        }];
        let delta = reconcile_eureka(&apps, &instances, &observed);
        assert_eq!(delta.application_tombstones, vec![2]);
    }
}
