//! Operator API request/response DTOs
//!
//! Batch endpoints always return per-target result arrays; the envelope
//! itself succeeds even when individual targets are rejected.

use serde::{Deserialize, Serialize};

/// Lifecycle actions accepted by `POST /applications/batch_action`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchAction {
    Start,
    Stop,
    Restart,
}

impl BatchAction {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchAction::Start => "start",
            BatchAction::Stop => "stop",
            BatchAction::Restart => "restart",
        }
    }
}

/// Update delivery modes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    #[serde(rename = "deliver")]
    Deliver,
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "night-restart")]
    NightRestart,
}

impl UpdateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateMode::Deliver => "deliver",
            UpdateMode::Immediate => "immediate",
            UpdateMode::NightRestart => "night-restart",
        }
    }

    /// Only the immediate mode quiesces traffic before installing
    pub fn drains(self) -> bool {
        matches!(self, UpdateMode::Immediate)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct BatchActionRequest {
    pub app_ids: Vec<i64>,
    pub action: BatchAction,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BatchUpdateRequest {
    pub app_ids: Vec<i64>,
    pub distr_url: String,
    pub mode: UpdateMode,
    #[serde(default)]
    pub orchestrator_playbook: Option<String>,
    /// Minutes to wait for sessions to drain, 0-60
    #[serde(default)]
    pub drain_wait_time: Option<u32>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Per-target outcome of a batch submission
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub id: i64,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TargetOutcome {
    pub fn accepted(id: i64) -> Self {
        Self {
            id,
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(id: i64, reason: impl Into<String>) -> Self {
        Self {
            id,
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchTaskResponse {
    pub task_ids: Vec<i64>,
    pub groups_count: usize,
    pub results: Vec<TargetOutcome>,
}

/// Tag assignment actions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagAction {
    Add,
    Remove,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BulkTagRequest {
    pub app_ids: Vec<i64>,
    pub tag_names: Vec<String>,
    pub action: TagAction,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MapRequest {
    pub application_id: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdatePlaybookRequest {
    /// New playbook path; empty or missing clears the override
    #[serde(default)]
    pub playbook: Option<String>,
}

/// One artifact from the artifact repository proxy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&UpdateMode::NightRestart).unwrap(),
            "\"night-restart\""
        );
        let mode: UpdateMode = serde_json::from_str("\"immediate\"").unwrap();
        assert!(mode.drains());
        let mode: UpdateMode = serde_json::from_str("\"deliver\"").unwrap();
        assert!(!mode.drains());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = serde_json::from_str::<BatchActionRequest>(
            r#"{"app_ids": [1], "action": "reboot"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_batch_action_request_parses() {
        let request: BatchActionRequest =
            serde_json::from_str(r#"{"app_ids": [1, 2], "action": "stop"}"#).unwrap();
        assert_eq!(request.action, BatchAction::Stop);
        assert!(request.idempotency_key.is_none());
    }
}
