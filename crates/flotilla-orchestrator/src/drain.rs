//! Drain wait loop
//!
//! Not a sleep: a timed loop re-reading the member's current sessions every
//! second until zero, the deadline, or cancellation - whichever comes first.
//! Cancellation is honoured within one tick.

use std::time::Duration;

use async_trait::async_trait;

use crate::cancel::CancelToken;

/// Where the loop reads `scur` from (the store, refreshed by the HAProxy
/// collector)
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn current_sessions(&self, haproxy_server_id: i64) -> anyhow::Result<Option<i64>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Sessions reached zero
    Drained,
    /// The wait budget elapsed; the update proceeds regardless
    DeadlineElapsed,
    Cancelled,
}

const TICK: Duration = Duration::from_secs(1);

/// Wait for one member to quiesce. `report` receives the remaining session
/// count on every observation.
pub async fn wait_for_drain<S, F>(
    sessions: &S,
    haproxy_server_id: i64,
    max_wait: Duration,
    cancel: &CancelToken,
    mut report: F,
) -> anyhow::Result<DrainOutcome>
where
    S: SessionSource + ?Sized,
    F: FnMut(i64),
{
    let deadline = tokio::time::Instant::now() + max_wait;
    loop {
        if cancel.is_cancelled() {
            return Ok(DrainOutcome::Cancelled);
        }
        let remaining = sessions
            .current_sessions(haproxy_server_id)
            .await?
            .unwrap_or(0);
        report(remaining);
        if remaining == 0 {
            return Ok(DrainOutcome::Drained);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(DrainOutcome::DeadlineElapsed);
        }
        tokio::select! {
            _ = cancel.cancelled() => return Ok(DrainOutcome::Cancelled),
            _ = tokio::time::sleep_until(deadline.min(tokio::time::Instant::now() + TICK)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedSessions {
        counts: Mutex<Vec<i64>>,
    }

    impl ScriptedSessions {
        fn new(counts: Vec<i64>) -> Self {
            Self {
                counts: Mutex::new(counts),
            }
        }
    }

    #[async_trait]
    impl SessionSource for ScriptedSessions {
        async fn current_sessions(&self, _id: i64) -> anyhow::Result<Option<i64>> {
            let mut counts = self.counts.lock().unwrap();
            Ok(Some(if counts.len() > 1 {
                counts.remove(0)
            } else {
                counts[0]
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drains_to_zero() {
        let source = ScriptedSessions::new(vec![7, 3, 0]);
        let cancel = CancelToken::new();
        let mut seen = Vec::new();
        let outcome = wait_for_drain(&source, 1, Duration::from_secs(60), &cancel, |n| {
            seen.push(n)
        })
        .await
        .unwrap();
        assert_eq!(outcome, DrainOutcome::Drained);
        assert_eq!(seen, vec![7, 3, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses_with_sessions_remaining() {
        let source = ScriptedSessions::new(vec![5]);
        let cancel = CancelToken::new();
        let outcome = wait_for_drain(&source, 1, Duration::from_secs(3), &cancel, |_| {})
            .await
            .unwrap();
        assert_eq!(outcome, DrainOutcome::DeadlineElapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let source = ScriptedSessions::new(vec![5]);
        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            canceller.cancel();
        });
        let started = tokio::time::Instant::now();
        let outcome = wait_for_drain(&source, 1, Duration::from_secs(120), &cancel, |_| {})
            .await
            .unwrap();
        assert_eq!(outcome, DrainOutcome::Cancelled);
        // Honoured within roughly one tick, never the full two minutes
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
