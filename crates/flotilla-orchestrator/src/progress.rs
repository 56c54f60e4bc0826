//! Progress router
//!
//! The runner posts progress to the server's callback endpoint; the router
//! forwards each event to the executor owning the task over a buffered
//! channel, so a slow store write never blocks the next event. Events for
//! tasks without a registered executor (finished, cancelled, unknown) are
//! dropped.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use flotilla_api::progress::{RunnerCompletion, RunnerEvent};

/// A message from the playbook runner
#[derive(Clone, Debug)]
pub enum RunnerMessage {
    Progress(RunnerEvent),
    Complete(RunnerCompletion),
}

const CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
pub struct ProgressRouter {
    channels: DashMap<i64, mpsc::Sender<RunnerMessage>>,
}

impl ProgressRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task's executor, returning its message receiver
    pub fn register(&self, task_id: i64) -> mpsc::Receiver<RunnerMessage> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.channels.insert(task_id, tx);
        rx
    }

    pub fn unregister(&self, task_id: i64) {
        self.channels.remove(&task_id);
    }

    /// Route a message to the owning executor. Returns false when no
    /// executor accepts events for this task.
    pub fn route(&self, task_id: i64, message: RunnerMessage) -> bool {
        match self.channels.get(&task_id) {
            Some(sender) => match sender.try_send(message) {
                Ok(()) => true,
                Err(err) => {
                    debug!(task_id, "progress event dropped: {}", err);
                    false
                }
            },
            None => {
                debug!(task_id, "progress event for unregistered task dropped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(task_id: &str, phase: &str) -> RunnerEvent {
        RunnerEvent {
            task_id: task_id.to_string(),
            phase: phase.to_string(),
            percent: Some(10),
            host: None,
            message: None,
        }
    }

    #[tokio::test]
    async fn test_route_to_registered_task() {
        let router = ProgressRouter::new();
        let mut rx = router.register(1);
        assert!(router.route(1, RunnerMessage::Progress(event("1", "installing"))));
        match rx.recv().await.unwrap() {
            RunnerMessage::Progress(e) => assert_eq!(e.phase, "installing"),
            _ => panic!("expected progress"),
        }
    }

    #[test]
    fn test_route_after_unregister_is_dropped() {
        let router = ProgressRouter::new();
        let _rx = router.register(1);
        router.unregister(1);
        assert!(!router.route(1, RunnerMessage::Progress(event("1", "installing"))));
    }
}
