//! Per-endpoint fetch-status tracking
//!
//! The tracker is the single owner of fetch-status state; other components
//! read it through this API. Nothing here is persisted: reachability
//! derived from it is written to the store by the collectors.

use dashmap::DashMap;

use flotilla_common::Source;

/// Classification of one fetch attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok,
    /// Countable failure; the endpoint may still come back
    SoftFailure(String),
    /// Authoritative "this endpoint is gone"
    HardFailure(String),
}

/// Last-known state of one endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchState {
    Ok,
    SoftFailure,
    HardFailure,
    /// Never polled yet
    Unknown,
}

impl FetchState {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchState::Ok => "ok",
            FetchState::SoftFailure => "soft_failure",
            FetchState::HardFailure => "hard_failure",
            FetchState::Unknown => "unknown",
        }
    }
}

/// Fetch-status tuple per endpoint
#[derive(Clone, Debug)]
pub struct FetchStatus {
    pub state: FetchState,
    pub error: Option<String>,
    /// Epoch milliseconds of the last attempt
    pub attempted_at: i64,
    /// Increments on any non-ok result, resets on ok
    pub consecutive_failures: u32,
}

/// In-memory fetch-status registry keyed by `(source, endpoint id)`
#[derive(Default)]
pub struct FetchStatusTracker {
    statuses: DashMap<(Source, i64), FetchStatus>,
}

impl FetchStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt outcome, returning the consecutive failure count
    /// after this attempt.
    pub fn record(&self, source: Source, endpoint_id: i64, outcome: &FetchOutcome) -> u32 {
        let attempted_at = chrono::Utc::now().timestamp_millis();
        let mut entry = self
            .statuses
            .entry((source, endpoint_id))
            .or_insert(FetchStatus {
                state: FetchState::Unknown,
                error: None,
                attempted_at,
                consecutive_failures: 0,
            });
        match outcome {
            FetchOutcome::Ok => {
                entry.state = FetchState::Ok;
                entry.error = None;
                entry.consecutive_failures = 0;
            }
            FetchOutcome::SoftFailure(error) => {
                entry.state = FetchState::SoftFailure;
                entry.error = Some(error.clone());
                entry.consecutive_failures += 1;
            }
            FetchOutcome::HardFailure(error) => {
                entry.state = FetchState::HardFailure;
                entry.error = Some(error.clone());
                entry.consecutive_failures += 1;
            }
        }
        entry.attempted_at = attempted_at;
        entry.consecutive_failures
    }

    pub fn get(&self, source: Source, endpoint_id: i64) -> Option<FetchStatus> {
        self.statuses
            .get(&(source, endpoint_id))
            .map(|entry| entry.clone())
    }

    /// Drop state for endpoints that no longer exist
    pub fn forget(&self, source: Source, endpoint_id: i64) {
        self.statuses.remove(&(source, endpoint_id));
    }

    /// Snapshot for the read API
    pub fn snapshot(&self) -> Vec<((Source, i64), FetchStatus)> {
        self.statuses
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_failures_count_and_reset() {
        let tracker = FetchStatusTracker::new();
        assert_eq!(
            tracker.record(Source::Agent, 1, &FetchOutcome::SoftFailure("boom".into())),
            1
        );
        assert_eq!(
            tracker.record(Source::Agent, 1, &FetchOutcome::SoftFailure("boom".into())),
            2
        );
        assert_eq!(
            tracker.record(Source::Agent, 1, &FetchOutcome::HardFailure("gone".into())),
            3
        );
        assert_eq!(tracker.record(Source::Agent, 1, &FetchOutcome::Ok), 0);
        let status = tracker.get(Source::Agent, 1).unwrap();
        assert_eq!(status.state, FetchState::Ok);
        assert!(status.error.is_none());
    }

    #[test]
    fn test_sources_are_tracked_independently() {
        let tracker = FetchStatusTracker::new();
        tracker.record(Source::Agent, 1, &FetchOutcome::SoftFailure("x".into()));
        tracker.record(Source::Haproxy, 1, &FetchOutcome::Ok);
        assert_eq!(
            tracker.get(Source::Agent, 1).unwrap().consecutive_failures,
            1
        );
        assert_eq!(
            tracker.get(Source::Haproxy, 1).unwrap().consecutive_failures,
            0
        );
    }
}
