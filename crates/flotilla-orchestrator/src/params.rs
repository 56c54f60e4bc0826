//! Task parameter bundle
//!
//! Serialized into the task row's `params` JSON and, extended with the
//! callback URL, handed to the playbook runner on stdin.

use serde::{Deserialize, Serialize};

use flotilla_api::operator::UpdateMode;
use flotilla_persistence::model::TaskType;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskParams {
    pub action: TaskType,
    pub instance_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<UpdateMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_playbook: Option<String>,
    #[serde(default)]
    pub drain_wait_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl TaskParams {
    pub fn action_only(action: TaskType, instance_ids: Vec<i64>, actor: Option<String>) -> Self {
        Self {
            action,
            instance_ids,
            distr_url: None,
            mode: None,
            orchestrator_playbook: None,
            drain_wait_minutes: 0,
            actor,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("task params are always serializable")
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Whether this task quiesces traffic before installing
    pub fn drains(&self) -> bool {
        self.action == TaskType::Update && self.mode.map(|m| m.drains()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_round_trip() {
        let params = TaskParams {
            action: TaskType::Update,
            instance_ids: vec![1, 2],
            distr_url: Some("https://repo/billing-2.0.tar.gz".to_string()),
            mode: Some(UpdateMode::Immediate),
            orchestrator_playbook: None,
            drain_wait_minutes: 2,
            actor: Some("ops".to_string()),
        };
        let parsed = TaskParams::from_json(&params.to_json()).unwrap();
        assert_eq!(parsed.instance_ids, vec![1, 2]);
        assert!(parsed.drains());
    }

    #[test]
    fn test_deliver_mode_does_not_drain() {
        let params = TaskParams {
            action: TaskType::Update,
            instance_ids: vec![1],
            distr_url: None,
            mode: Some(UpdateMode::Deliver),
            orchestrator_playbook: None,
            drain_wait_minutes: 5,
            actor: None,
        };
        assert!(!params.drains());

        let restart = TaskParams::action_only(TaskType::Restart, vec![1], None);
        assert!(!restart.drains());
    }
}
