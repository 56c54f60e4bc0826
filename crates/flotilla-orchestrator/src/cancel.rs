//! Cooperative cancellation tokens
//!
//! One token per running task, registered by the executor and triggered by
//! the operator cancel endpoint. Waiters wake within the same tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve once the token is cancelled
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Registry of cancel tokens for running tasks
#[derive(Default)]
pub struct CancelRegistry {
    tokens: DashMap<i64, CancelToken>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a task about to run
    pub fn register(&self, task_id: i64) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.insert(task_id, token.clone());
        token
    }

    /// Trigger a running task's token. Returns false when the task is not
    /// currently executing.
    pub fn cancel(&self, task_id: i64) -> bool {
        match self.tokens.get(&task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, task_id: i64) {
        self.tokens.remove(&task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
            true
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        let woke = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(woke);
    }

    #[tokio::test]
    async fn test_already_cancelled_resolves_immediately() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }

    #[test]
    fn test_registry_cancel_unknown_task() {
        let registry = CancelRegistry::new();
        assert!(!registry.cancel(42));
        let token = registry.register(42);
        assert!(registry.cancel(42));
        assert!(token.is_cancelled());
    }
}
