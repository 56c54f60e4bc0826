//! Domain model types for persistence operations
//!
//! This module defines:
//! - Closed status/kind enums stored as strings in the database
//! - Observation types produced by the collectors
//! - Reconciliation delta types applied transactionally by the SQL backend
//! - Read models for the orchestrator and the HTTP surface

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::entity::{app_instance, app_mapping, event, haproxy_backend, tag};

// ============================================================================
// Closed enums (stored as strings)
// ============================================================================

/// Server reachability
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ServerStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl ServerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerStatus::Online => "online",
            ServerStatus::Offline => "offline",
            ServerStatus::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "online" => ServerStatus::Online,
            "offline" => ServerStatus::Offline,
            _ => ServerStatus::Unknown,
        }
    }
}

/// HAProxy member status as reported on the stats socket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HaproxyStatus {
    Up,
    Down,
    Maint,
    Drain,
    #[default]
    Unknown,
}

impl HaproxyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HaproxyStatus::Up => "UP",
            HaproxyStatus::Down => "DOWN",
            HaproxyStatus::Maint => "MAINT",
            HaproxyStatus::Drain => "DRAIN",
            HaproxyStatus::Unknown => "UNKNOWN",
        }
    }

    /// Normalize a raw stats value ("UP 1/2", "DOWN (agent)") to the closed set
    pub fn parse(raw: &str) -> Self {
        let head = raw.split_whitespace().next().unwrap_or("");
        match head.to_uppercase().as_str() {
            "UP" => HaproxyStatus::Up,
            "DOWN" => HaproxyStatus::Down,
            "MAINT" => HaproxyStatus::Maint,
            "DRAIN" => HaproxyStatus::Drain,
            _ => HaproxyStatus::Unknown,
        }
    }
}

/// Eureka instance status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EurekaStatus {
    Up,
    Down,
    Starting,
    OutOfService,
    #[default]
    Unknown,
}

impl EurekaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EurekaStatus::Up => "UP",
            EurekaStatus::Down => "DOWN",
            EurekaStatus::Starting => "STARTING",
            EurekaStatus::OutOfService => "OUT_OF_SERVICE",
            EurekaStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.to_uppercase().as_str() {
            "UP" => EurekaStatus::Up,
            "DOWN" => EurekaStatus::Down,
            "STARTING" => EurekaStatus::Starting,
            "OUT_OF_SERVICE" => EurekaStatus::OutOfService,
            _ => EurekaStatus::Unknown,
        }
    }
}

/// Batch grouping strategy of an application group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BatchGrouping {
    ByGroup,
    ByServer,
    #[default]
    OneAtATime,
}

impl BatchGrouping {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchGrouping::ByGroup => "by_group",
            BatchGrouping::ByServer => "by_server",
            BatchGrouping::OneAtATime => "one_at_a_time",
        }
    }
}

impl std::str::FromStr for BatchGrouping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "by_group" => Ok(BatchGrouping::ByGroup),
            "by_server" => Ok(BatchGrouping::ByServer),
            "one_at_a_time" => Ok(BatchGrouping::OneAtATime),
            _ => Err(format!("Invalid batch grouping: {}", s)),
        }
    }
}

/// Task types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Start,
    Stop,
    Restart,
    Update,
    Drain,
    Custom,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Start => "start",
            TaskType::Stop => "stop",
            TaskType::Restart => "restart",
            TaskType::Update => "update",
            TaskType::Drain => "drain",
            TaskType::Custom => "custom",
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(TaskType::Start),
            "stop" => Ok(TaskType::Stop),
            "restart" => Ok(TaskType::Restart),
            "update" => Ok(TaskType::Update),
            "drain" => Ok(TaskType::Drain),
            "custom" => Ok(TaskType::Custom),
            _ => Err(format!("Invalid task type: {}", s)),
        }
    }
}

/// Task lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// Transitions are monotone; terminal states accept nothing.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Cancelled)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Cancelled)
        )
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

/// External entity kinds a mapping can point at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingEntityType {
    HaproxyServer,
    EurekaInstance,
}

impl MappingEntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingEntityType::HaproxyServer => "haproxy_server",
            MappingEntityType::EurekaInstance => "eureka_instance",
        }
    }
}

impl std::str::FromStr for MappingEntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "haproxy_server" => Ok(MappingEntityType::HaproxyServer),
            "eureka_instance" => Ok(MappingEntityType::EurekaInstance),
            _ => Err(format!("Invalid mapping entity type: {}", s)),
        }
    }
}

/// Mapping history actions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingAction {
    Created,
    Changed,
    Removed,
}

impl MappingAction {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingAction::Created => "created",
            MappingAction::Changed => "changed",
            MappingAction::Removed => "removed",
        }
    }
}

/// Why a mapping history row was written
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingReason {
    Auto,
    Manual,
    OperatorUnmap,
    EntityDisappeared,
    IpChanged,
    Ambiguous,
}

impl MappingReason {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingReason::Auto => "auto",
            MappingReason::Manual => "manual",
            MappingReason::OperatorUnmap => "operator_unmap",
            MappingReason::EntityDisappeared => "entity_disappeared",
            MappingReason::IpChanged => "ip_changed",
            MappingReason::Ambiguous => "ambiguous",
        }
    }
}

// ============================================================================
// Observations (collector output, reconciler input)
// ============================================================================

/// One observed application instance, normalized from the agent payload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceObservation {
    pub instance_name: String,
    pub app_type: String,
    pub status: String,
    pub version: Option<String>,
    pub pid: Option<i64>,
    pub start_time: Option<NaiveDateTime>,
    pub ip: Option<String>,
    pub port: Option<i32>,
    pub app_path: Option<String>,
    pub log_path: Option<String>,
    pub container_id: Option<String>,
    pub container_image: Option<String>,
    pub container_tag: Option<String>,
    pub eureka_registered: bool,
    pub eureka_url: Option<String>,
}

impl InstanceObservation {
    pub fn natural_key(&self) -> (&str, &str) {
        (self.instance_name.as_str(), self.app_type.as_str())
    }
}

/// One observed HAProxy backend member
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HaproxyServerObservation {
    pub name: String,
    pub ip: Option<String>,
    pub port: Option<i32>,
    pub status: String,
    pub weight: Option<i32>,
    pub current_sessions: Option<i64>,
    pub max_sessions: Option<i64>,
    pub last_state_change_seconds: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HaproxyBackendObservation {
    pub name: String,
    pub servers: Vec<HaproxyServerObservation>,
}

/// One observed HAProxy process with its backend tree
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HaproxyProcessObservation {
    pub name: String,
    pub backends: Vec<HaproxyBackendObservation>,
}

/// One observed Eureka registry instance
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EurekaInstanceObservation {
    pub instance_id: String,
    pub hostname: Option<String>,
    pub ip: String,
    pub port: Option<i32>,
    pub status: String,
    pub last_heartbeat: Option<NaiveDateTime>,
    pub metadata: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EurekaApplicationObservation {
    pub name: String,
    pub instances: Vec<EurekaInstanceObservation>,
}

/// One successful fetch from one source endpoint, ready for reconciliation
#[derive(Clone, Debug)]
pub enum SourceBatch {
    Agent {
        server_id: i64,
        observed: Vec<InstanceObservation>,
    },
    Haproxy {
        server_id: i64,
        processes: Vec<HaproxyProcessObservation>,
    },
    Eureka {
        eureka_server_id: i64,
        applications: Vec<EurekaApplicationObservation>,
    },
}

// ============================================================================
// Reconciliation deltas
// ============================================================================

/// An audited field change that must produce a history/event row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Update of one existing application instance row
#[derive(Clone, Debug)]
pub struct InstanceUpdate {
    pub id: i64,
    pub observed: InstanceObservation,
    /// Clear the tombstone, preserving the row id
    pub revive: bool,
    /// The instance's ip or port differs from the prior row
    pub endpoint_changed: bool,
    /// Audited changes only (status, version, container image/tag)
    pub changes: Vec<FieldChange>,
}

/// Delta for one agent batch against one server
#[derive(Clone, Debug, Default)]
pub struct InstanceDelta {
    pub creates: Vec<InstanceObservation>,
    pub updates: Vec<InstanceUpdate>,
    pub tombstone_ids: Vec<i64>,
    pub warnings: Vec<String>,
}

impl InstanceDelta {
    /// True when applying this delta writes no new rows beyond `last_seen`
    pub fn is_noop(&self) -> bool {
        self.creates.is_empty()
            && self.tombstone_ids.is_empty()
            && self.updates.iter().all(|u| !u.revive && u.changes.is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct HaproxyServerUpdate {
    pub id: i64,
    pub observed: HaproxyServerObservation,
    pub revive: bool,
    /// `(old_status, new_status)` when the audited status changed
    pub status_change: Option<(Option<String>, String)>,
}

#[derive(Clone, Debug, Default)]
pub struct HaproxyBackendCreate {
    pub name: String,
    pub servers: Vec<HaproxyServerObservation>,
}

#[derive(Clone, Debug)]
pub struct HaproxyBackendUpdate {
    pub id: i64,
    pub revive: bool,
    pub server_creates: Vec<HaproxyServerObservation>,
    pub server_updates: Vec<HaproxyServerUpdate>,
    pub server_tombstones: Vec<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct HaproxyProcessCreate {
    pub name: String,
    pub backends: Vec<HaproxyBackendCreate>,
}

#[derive(Clone, Debug)]
pub struct HaproxyProcessUpdate {
    pub id: i64,
    pub revive: bool,
    pub backend_creates: Vec<HaproxyBackendCreate>,
    pub backend_updates: Vec<HaproxyBackendUpdate>,
    pub backend_tombstones: Vec<i64>,
}

/// Delta for one HAProxy batch against one server's HAProxy processes
#[derive(Clone, Debug, Default)]
pub struct HaproxyDelta {
    pub process_creates: Vec<HaproxyProcessCreate>,
    pub process_updates: Vec<HaproxyProcessUpdate>,
    pub process_tombstones: Vec<i64>,
    pub warnings: Vec<String>,
}

impl HaproxyDelta {
    pub fn is_noop(&self) -> bool {
        self.process_creates.is_empty()
            && self.process_tombstones.is_empty()
            && self.process_updates.iter().all(|p| {
                !p.revive
                    && p.backend_creates.is_empty()
                    && p.backend_tombstones.is_empty()
                    && p.backend_updates.iter().all(|b| {
                        !b.revive
                            && b.server_creates.is_empty()
                            && b.server_tombstones.is_empty()
                            && b.server_updates
                                .iter()
                                .all(|s| !s.revive && s.status_change.is_none())
                    })
            })
    }
}

#[derive(Clone, Debug)]
pub struct EurekaInstanceUpdate {
    pub id: i64,
    pub observed: EurekaInstanceObservation,
    pub revive: bool,
    pub status_change: Option<(Option<String>, String)>,
}

#[derive(Clone, Debug, Default)]
pub struct EurekaApplicationCreate {
    pub name: String,
    pub instances: Vec<EurekaInstanceObservation>,
}

#[derive(Clone, Debug)]
pub struct EurekaApplicationUpdate {
    pub id: i64,
    pub revive: bool,
    pub instance_creates: Vec<EurekaInstanceObservation>,
    pub instance_updates: Vec<EurekaInstanceUpdate>,
    pub instance_tombstones: Vec<i64>,
}

/// Delta for one Eureka batch against one registry endpoint
#[derive(Clone, Debug, Default)]
pub struct EurekaDelta {
    pub application_creates: Vec<EurekaApplicationCreate>,
    pub application_updates: Vec<EurekaApplicationUpdate>,
    pub application_tombstones: Vec<i64>,
    pub warnings: Vec<String>,
}

impl EurekaDelta {
    pub fn is_noop(&self) -> bool {
        self.application_creates.is_empty()
            && self.application_tombstones.is_empty()
            && self.application_updates.iter().all(|a| {
                !a.revive
                    && a.instance_creates.is_empty()
                    && a.instance_tombstones.is_empty()
                    && a.instance_updates
                        .iter()
                        .all(|i| !i.revive && i.status_change.is_none())
            })
    }
}

// ============================================================================
// Apply results (feed the mapping engine dispatch)
// ============================================================================

/// Outcome of applying an [`InstanceDelta`]
#[derive(Clone, Debug, Default)]
pub struct AppliedInstances {
    pub created_ids: Vec<i64>,
    /// Instances whose ip or port changed in this batch
    pub endpoint_changed_ids: Vec<i64>,
    pub tombstoned_ids: Vec<i64>,
}

/// Outcome of applying a [`HaproxyDelta`]
#[derive(Clone, Debug, Default)]
pub struct AppliedHaproxy {
    pub created_server_ids: Vec<i64>,
    pub tombstoned_server_ids: Vec<i64>,
}

/// Outcome of applying a [`EurekaDelta`]
#[derive(Clone, Debug, Default)]
pub struct AppliedEureka {
    pub created_instance_ids: Vec<i64>,
    pub tombstoned_instance_ids: Vec<i64>,
}

// ============================================================================
// Read models
// ============================================================================

/// Filters for the instance search endpoint
#[derive(Clone, Debug, Default)]
pub struct InstanceSearchFilter {
    pub server_id: Option<i64>,
    pub tag: Option<String>,
    pub q: Option<String>,
    pub include_deleted: bool,
}

/// Full instance view for `GET /applications/{id}`
#[derive(Clone, Debug, Serialize)]
pub struct InstanceDetail {
    pub instance: app_instance::Model,
    pub tags: Vec<tag::Model>,
    /// Tags inherited from the group, distinct from the instance's own
    pub group_tags: Vec<tag::Model>,
    pub mappings: Vec<app_mapping::Model>,
    pub events: Vec<event::Model>,
}

/// Backend with per-status member counts
#[derive(Clone, Debug, Serialize)]
pub struct BackendSummary {
    pub backend: haproxy_backend::Model,
    pub up: i64,
    pub down: i64,
    pub maint: i64,
    pub drain: i64,
    pub unknown: i64,
}

/// Task query filter
#[derive(Clone, Debug, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub limit: Option<u64>,
}

/// A task to be created by the planner
#[derive(Clone, Debug)]
pub struct NewTask {
    pub task_type: TaskType,
    pub params: String,
    pub server_id: Option<i64>,
    pub instance_id: Option<i64>,
    pub idempotency_key: Option<String>,
}

/// Everything the task planner needs to know about one target instance
#[derive(Clone, Debug)]
pub struct PlanTarget {
    pub id: i64,
    pub server_id: i64,
    pub instance_name: String,
    pub app_type: String,
    pub status: String,
    pub deleted: bool,
    pub group_id: Option<i64>,
    pub batch_grouping: BatchGrouping,
    /// System lock tags carried by the instance (own tags only)
    pub locks: Vec<String>,
}

/// Candidate row for the mapping engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingCandidate {
    pub application_id: i64,
    pub server_name: String,
    pub instance_name: String,
    pub ip: Option<String>,
    pub port: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_haproxy_status_parse_normalizes() {
        assert_eq!(HaproxyStatus::parse("UP 1/2"), HaproxyStatus::Up);
        assert_eq!(HaproxyStatus::parse("down"), HaproxyStatus::Down);
        assert_eq!(HaproxyStatus::parse("DRAIN"), HaproxyStatus::Drain);
        assert_eq!(HaproxyStatus::parse("no check"), HaproxyStatus::Unknown);
    }

    #[test]
    fn test_task_status_monotone_transitions() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Cancelled));

        assert!(!Running.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Cancelled.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_batch_grouping_round_trip() {
        for grouping in [
            BatchGrouping::ByGroup,
            BatchGrouping::ByServer,
            BatchGrouping::OneAtATime,
        ] {
            assert_eq!(
                BatchGrouping::from_str(grouping.as_str()).unwrap(),
                grouping
            );
        }
        assert!(BatchGrouping::from_str("by_rack").is_err());
    }

    #[test]
    fn test_empty_delta_is_noop() {
        let delta = InstanceDelta::default();
        assert!(delta.is_noop());

        let with_stamp_only = InstanceDelta {
            updates: vec![InstanceUpdate {
                id: 1,
                observed: InstanceObservation::default(),
                revive: false,
                endpoint_changed: false,
                changes: vec![],
            }],
            ..Default::default()
        };
        assert!(with_stamp_only.is_noop());

        let with_revive = InstanceDelta {
            updates: vec![InstanceUpdate {
                id: 1,
                observed: InstanceObservation::default(),
                revive: true,
                endpoint_changed: false,
                changes: vec![],
            }],
            ..Default::default()
        };
        assert!(!with_revive.is_noop());
    }
}
