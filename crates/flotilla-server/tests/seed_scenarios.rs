// End-to-end logic checks for the documented operational scenarios, driven
// through the reconciler, planner, and mapping engine without a database.

use chrono::NaiveDateTime;

use flotilla_common::{INSTANCE_STATUS_ONLINE, STATUS_LOCK_TAG};
use flotilla_orchestrator::planner::{PartitionKey, plan};
use flotilla_persistence::entity::app_instance;
use flotilla_persistence::model::{
    BatchGrouping, InstanceObservation, MappingCandidate, MappingEntityType, PlanTarget,
    TaskType,
};
use flotilla_reconcile::mapping::{MapTarget, Resolution, resolve_candidates};
use flotilla_reconcile::reconciler::reconcile_instances;

fn ts() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2025-08-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

fn row(id: i64, name: &str, deleted: bool) -> app_instance::Model {
    app_instance::Model {
        id,
        server_id: 1,
        instance_name: name.to_string(),
        app_type: "java".to_string(),
        catalog_id: None,
        group_id: None,
        status: INSTANCE_STATUS_ONLINE.to_string(),
        version: Some("1.0".to_string()),
        pid: Some(100),
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

fn observation(name: &str) -> InstanceObservation {
    InstanceObservation {
        instance_name: name.to_string(),
        app_type: "java".to_string(),
        status: INSTANCE_STATUS_ONLINE.to_string(),
        version: Some("1.0".to_string()),
        pid: Some(100),
        ip: Some("10.0.0.5".to_string()),
        port: Some(8080),
        ..Default::default()
    }
}

/// Soft delete survives an agent outage: only a successful empty report
/// tombstones, and a re-appearing instance revives in place with no new
/// history.
#[test]
fn soft_delete_survives_outage() {
    // Cycle 1: agent reports app-1, the row is created
    let delta = reconcile_instances(&[], &[observation("app-1")]);
    assert_eq!(delta.creates.len(), 1);

    // Cycles 2..6: the agent is unreachable. Failed fetches never reach the
    // reconciler, so the row stays live - nothing to assert beyond the
    // collector contract: no batch, no delta, no tombstone.

    // Agent returns, reporting app-1: same row, no new history rows
    let prior = vec![row(1, "app-1", false)];
    let delta = reconcile_instances(&prior, &[observation("app-1")]);
    assert!(delta.creates.is_empty());
    assert!(delta.tombstone_ids.is_empty());
    assert!(delta.is_noop());

    // Agent returns reporting no instances: now the tombstone is set
    let delta = reconcile_instances(&prior, &[]);
    assert_eq!(delta.tombstone_ids, vec![1]);

    // And when it reappears later, the tombstoned row is revived, not
    // duplicated
    let tombstoned = vec![row(1, "app-1", true)];
    let delta = reconcile_instances(&tombstoned, &[observation("app-1")]);
    assert!(delta.creates.is_empty());
    assert_eq!(delta.updates.len(), 1);
    assert!(delta.updates[0].revive);
}

fn plan_target(id: i64, server_id: i64, group: Option<i64>) -> PlanTarget {
    PlanTarget {
        id,
        server_id,
        instance_name: format!("app-{}", id),
        app_type: "java".to_string(),
        status: INSTANCE_STATUS_ONLINE.to_string(),
        deleted: false,
        group_id: group,
        batch_grouping: if group.is_some() {
            BatchGrouping::ByGroup
        } else {
            BatchGrouping::OneAtATime
        },
        locks: Vec::new(),
    }
}

/// Multi-group update: one task per group; a rejected group does not affect
/// the other group's task.
#[test]
fn multi_group_update_partitions() {
    let targets = vec![
        plan_target(1, 1, Some(100)),
        plan_target(2, 2, Some(100)),
        plan_target(3, 3, Some(200)),
    ];
    let planned = plan(TaskType::Update, &targets);
    assert_eq!(planned.partitions.len(), 2);
    assert_eq!(planned.partitions[0].key, PartitionKey::Group(100));
    assert_eq!(planned.partitions[1].key, PartitionKey::Group(200));

    // Excluding group B leaves group A's task identical
    let without_b = plan(TaskType::Update, &targets[..2]);
    assert_eq!(without_b.partitions.len(), 1);
    assert_eq!(
        without_b.partitions[0].instance_ids,
        planned.partitions[0].instance_ids
    );
}

/// Two live instances share an IP with no port info: the new member stays
/// unmapped as ambiguous.
#[test]
fn ambiguous_auto_mapping_is_left_unmapped() {
    let candidates = vec![
        MappingCandidate {
            application_id: 5,
            server_name: "web-01".to_string(),
            instance_name: "billing-1".to_string(),
            ip: Some("10.0.0.5".to_string()),
            port: None,
        },
        MappingCandidate {
            application_id: 6,
            server_name: "web-01".to_string(),
            instance_name: "billing-2".to_string(),
            ip: Some("10.0.0.5".to_string()),
            port: None,
        },
    ];
    let target = MapTarget {
        entity_type: MappingEntityType::HaproxyServer,
        entity_id: 1,
        ip: Some("10.0.0.5".to_string()),
        port: None,
        name: Some("pool-member-7".to_string()),
    };
    assert_eq!(resolve_candidates(&target, &candidates), Resolution::Ambiguous);
}

/// A status lock rejects the stop with `precondition_failed(locked)` and no
/// task is created.
#[test]
fn status_lock_blocks_stop() {
    let mut locked = plan_target(4, 1, None);
    locked.locks.push(STATUS_LOCK_TAG.to_string());
    let planned = plan(TaskType::Stop, &[locked]);
    assert!(planned.partitions.is_empty());
    assert_eq!(planned.rejected.len(), 1);
    assert_eq!(planned.rejected[0].id, 4);
    assert_eq!(
        planned.rejected[0].reason.as_deref(),
        Some("precondition_failed(locked)")
    );
}
