//! Task plan expansion
//!
//! Pure validation and partitioning over preloaded targets: invalid targets
//! are dropped with per-target reasons, survivors are partitioned by their
//! group's batch grouping strategy. Instances without a group fall back to
//! one task per instance.

use std::collections::HashMap;

use flotilla_api::operator::TargetOutcome;
use flotilla_common::{INSTANCE_STATUS_ONLINE, STATUS_LOCK_TAG, VER_LOCK_TAG};
use flotilla_persistence::model::{BatchGrouping, PlanTarget, TaskType};

/// One task to be created
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    pub key: PartitionKey,
    /// Set when every member lives on one server
    pub server_id: Option<i64>,
    /// Set for single-instance partitions
    pub instance_id: Option<i64>,
    pub instance_ids: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PartitionKey {
    Group(i64),
    Server(i64),
    Instance(i64),
}

#[derive(Clone, Debug, Default)]
pub struct PlannedTasks {
    pub rejected: Vec<TargetOutcome>,
    pub partitions: Vec<Partition>,
}

fn validate(kind: TaskType, target: &PlanTarget) -> Option<String> {
    if target.deleted {
        return Some("not_found(deleted)".to_string());
    }
    let blocking_lock = match kind {
        TaskType::Start | TaskType::Stop | TaskType::Restart => STATUS_LOCK_TAG,
        TaskType::Update => VER_LOCK_TAG,
        _ => return Some(format!("precondition_failed(unsupported action {})", kind.as_str())),
    };
    if target.locks.iter().any(|lock| lock == blocking_lock) {
        return Some("precondition_failed(locked)".to_string());
    }
    match kind {
        TaskType::Start if target.status == INSTANCE_STATUS_ONLINE => {
            Some("precondition_failed(already online)".to_string())
        }
        TaskType::Stop | TaskType::Restart if target.status != INSTANCE_STATUS_ONLINE => {
            Some("precondition_failed(not online)".to_string())
        }
        _ => None,
    }
}

/// Expand a validated submission into partitions.
///
/// Partition order follows first appearance of each key in the target list,
/// so task creation order is deterministic.
pub fn plan(kind: TaskType, targets: &[PlanTarget]) -> PlannedTasks {
    let mut planned = PlannedTasks::default();
    let mut order: Vec<PartitionKey> = Vec::new();
    let mut members: HashMap<PartitionKey, Vec<&PlanTarget>> = HashMap::new();

    for target in targets {
        if let Some(reason) = validate(kind, target) {
            planned.rejected.push(TargetOutcome::rejected(target.id, reason));
            continue;
        }
        let key = match (target.batch_grouping, target.group_id) {
            (BatchGrouping::ByGroup, Some(group_id)) => PartitionKey::Group(group_id),
            (BatchGrouping::ByServer, _) => PartitionKey::Server(target.server_id),
            _ => PartitionKey::Instance(target.id),
        };
        if !members.contains_key(&key) {
            order.push(key.clone());
        }
        members.entry(key).or_default().push(target);
    }

    for key in order {
        let group = members.remove(&key).unwrap_or_default();
        let instance_ids: Vec<i64> = group.iter().map(|t| t.id).collect();
        let server_ids: Vec<i64> = group.iter().map(|t| t.server_id).collect();
        let same_server = server_ids.windows(2).all(|pair| pair[0] == pair[1]);
        planned.partitions.push(Partition {
            server_id: same_server.then(|| server_ids[0]),
            instance_id: (instance_ids.len() == 1).then(|| instance_ids[0]),
            instance_ids,
            key,
        });
    }
    planned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: i64, server_id: i64, group: Option<(i64, BatchGrouping)>) -> PlanTarget {
        PlanTarget {
            id,
            server_id,
            instance_name: format!("app-{}", id),
            app_type: "java".to_string(),
            status: INSTANCE_STATUS_ONLINE.to_string(),
            deleted: false,
            group_id: group.map(|(id, _)| id),
            batch_grouping: group.map(|(_, g)| g).unwrap_or_default(),
            locks: Vec::new(),
        }
    }

    #[test]
    fn test_by_group_partitions_one_task_per_group() {
        // i1 and i2 in group A, i3 in group B
        let targets = vec![
            target(1, 1, Some((100, BatchGrouping::ByGroup))),
            target(2, 2, Some((100, BatchGrouping::ByGroup))),
            target(3, 3, Some((200, BatchGrouping::ByGroup))),
        ];
        let planned = plan(TaskType::Update, &targets);
        assert!(planned.rejected.is_empty());
        assert_eq!(planned.partitions.len(), 2);
        assert_eq!(planned.partitions[0].key, PartitionKey::Group(100));
        assert_eq!(planned.partitions[0].instance_ids, vec![1, 2]);
        assert_eq!(planned.partitions[0].server_id, None);
        assert_eq!(planned.partitions[1].instance_ids, vec![3]);
        assert_eq!(planned.partitions[1].instance_id, Some(3));
    }

    #[test]
    fn test_by_server_partitions_per_server() {
        let targets = vec![
            target(1, 1, Some((100, BatchGrouping::ByServer))),
            target(2, 1, Some((100, BatchGrouping::ByServer))),
            target(3, 2, Some((100, BatchGrouping::ByServer))),
        ];
        let planned = plan(TaskType::Restart, &targets);
        assert_eq!(planned.partitions.len(), 2);
        assert_eq!(planned.partitions[0].key, PartitionKey::Server(1));
        assert_eq!(planned.partitions[0].server_id, Some(1));
        assert_eq!(planned.partitions[0].instance_ids, vec![1, 2]);
    }

    #[test]
    fn test_ungrouped_instances_run_one_at_a_time() {
        let targets = vec![target(1, 1, None), target(2, 1, None)];
        let planned = plan(TaskType::Restart, &targets);
        assert_eq!(planned.partitions.len(), 2);
        assert!(
            planned
                .partitions
                .iter()
                .all(|p| p.instance_ids.len() == 1 && p.instance_id.is_some())
        );
    }

    #[test]
    fn test_status_lock_rejects_lifecycle_actions() {
        let mut locked = target(4, 1, None);
        locked.locks.push(STATUS_LOCK_TAG.to_string());
        let planned = plan(TaskType::Stop, &[locked.clone()]);
        assert!(planned.partitions.is_empty());
        assert_eq!(planned.rejected.len(), 1);
        assert_eq!(
            planned.rejected[0].reason.as_deref(),
            Some("precondition_failed(locked)")
        );

        // The status lock does not block updates
        let planned = plan(TaskType::Update, &[locked]);
        assert!(planned.rejected.is_empty());
        assert_eq!(planned.partitions.len(), 1);
    }

    #[test]
    fn test_ver_lock_rejects_updates_only() {
        let mut locked = target(4, 1, None);
        locked.locks.push(VER_LOCK_TAG.to_string());
        let planned = plan(TaskType::Update, &[locked.clone()]);
        assert_eq!(
            planned.rejected[0].reason.as_deref(),
            Some("precondition_failed(locked)")
        );
        let planned = plan(TaskType::Restart, &[locked]);
        assert!(planned.rejected.is_empty());
    }

    #[test]
    fn test_action_preconditions() {
        let online = target(1, 1, None);
        let mut offline = target(2, 1, None);
        offline.status = "offline".to_string();

        let planned = plan(TaskType::Start, &[online.clone(), offline.clone()]);
        assert_eq!(planned.rejected.len(), 1);
        assert_eq!(planned.rejected[0].id, 1);
        assert_eq!(planned.partitions.len(), 1);

        let planned = plan(TaskType::Stop, &[online, offline]);
        assert_eq!(planned.rejected.len(), 1);
        assert_eq!(planned.rejected[0].id, 2);
        assert_eq!(
            planned.rejected[0].reason.as_deref(),
            Some("precondition_failed(not online)")
        );
    }

    #[test]
    fn test_deleted_target_rejected() {
        let mut gone = target(9, 1, None);
        gone.deleted = true;
        let planned = plan(TaskType::Restart, &[gone]);
        assert_eq!(
            planned.rejected[0].reason.as_deref(),
            Some("not_found(deleted)")
        );
    }

    #[test]
    fn test_rejected_target_does_not_affect_siblings() {
        let mut locked = target(1, 1, Some((100, BatchGrouping::ByGroup)));
        locked.locks.push(STATUS_LOCK_TAG.to_string());
        let ok = target(2, 1, Some((100, BatchGrouping::ByGroup)));
        let planned = plan(TaskType::Restart, &[locked, ok]);
        assert_eq!(planned.rejected.len(), 1);
        assert_eq!(planned.partitions.len(), 1);
        assert_eq!(planned.partitions[0].instance_ids, vec![2]);
    }
}
