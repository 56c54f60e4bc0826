//! Task progress schema and playbook runner callbacks
//!
//! Progress is a closed variant set; arbitrary keys do not accumulate in the
//! persisted progress JSON. The runner posts `RunnerEvent`s during execution
//! and exactly one `RunnerCompletion` at the end.

use serde::{Deserialize, Serialize};

/// Closed set of task phases
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TaskPhase {
    Draining { sessions_remaining: i64 },
    Installing,
    Restarting,
    Verifying,
    Failed,
}

impl TaskPhase {
    /// Parse a runner-reported phase label.
    ///
    /// The draining phase is produced by the orchestrator itself and is not a
    /// valid runner label.
    pub fn from_runner_label(label: &str) -> Option<Self> {
        match label {
            "installing" => Some(TaskPhase::Installing),
            "restarting" => Some(TaskPhase::Restarting),
            "verifying" => Some(TaskPhase::Verifying),
            "failed" => Some(TaskPhase::Failed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskPhase::Draining { .. } => "draining",
            TaskPhase::Installing => "installing",
            TaskPhase::Restarting => "restarting",
            TaskPhase::Verifying => "verifying",
            TaskPhase::Failed => "failed",
        }
    }
}

/// The progress JSON persisted on a task row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    #[serde(flatten)]
    pub phase: TaskPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskProgress {
    pub fn phase(phase: TaskPhase) -> Self {
        Self {
            phase,
            percent: None,
            host: None,
            message: None,
        }
    }

    pub fn draining(sessions_remaining: i64) -> Self {
        Self::phase(TaskPhase::Draining { sessions_remaining })
    }
}

/// Progress event posted by the playbook runner to the callback URL
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunnerEvent {
    pub task_id: String,
    pub phase: String,
    #[serde(default)]
    pub percent: Option<u8>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Final event posted by the playbook runner
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunnerCompletion {
    pub task_id: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Version the targets ended up on, when the runner knows it
    #[serde(default)]
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draining_progress_shape() {
        let progress = TaskProgress::draining(7);
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["phase"], "draining");
        assert_eq!(json["sessions_remaining"], 7);
        assert!(json.get("percent").is_none());
    }

    #[test]
    fn test_progress_round_trip() {
        let progress = TaskProgress {
            phase: TaskPhase::Installing,
            percent: Some(40),
            host: Some("web-01".to_string()),
            message: Some("unpacking artifact".to_string()),
        };
        let json = serde_json::to_string(&progress).unwrap();
        let back: TaskProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, progress);
    }

    #[test]
    fn test_unknown_runner_phase_rejected() {
        assert!(TaskPhase::from_runner_label("rebooting").is_none());
        assert!(TaskPhase::from_runner_label("draining").is_none());
        assert_eq!(
            TaskPhase::from_runner_label("verifying"),
            Some(TaskPhase::Verifying)
        );
    }

    #[test]
    fn test_unknown_progress_phase_fails_deserialization() {
        let json = r#"{"phase": "exploding"}"#;
        assert!(serde_json::from_str::<TaskProgress>(json).is_err());
    }
}
