//! Flotilla Collector - long-lived pollers over the fleet's sources
//!
//! Three collectors (agent, HAProxy, Eureka), each owning a poll interval,
//! a per-fetch timeout, and a concurrency cap over endpoints. Every cycle
//! snapshots the enabled endpoints from the store, fans out bounded-parallel
//! fetches, records a fetch-status per endpoint, and hands successful
//! observations as one batch to the reconcile driver over a bounded channel.
//!
//! A failed fetch never tombstones anything: only observations from a
//! successful fetch may mark children removed.

pub mod agent;
pub mod client;
pub mod convert;
pub mod eureka;
pub mod haproxy;
pub mod status;

pub use agent::AgentCollector;
pub use client::{AgentClient, EurekaClient};
pub use eureka::EurekaCollector;
pub use haproxy::HaproxyCollector;
pub use status::{FetchOutcome, FetchState, FetchStatus, FetchStatusTracker};

use std::time::Duration;

/// Per-source collector settings
#[derive(Clone, Debug)]
pub struct CollectorConfig {
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    /// Bounded parallelism over endpoints within one cycle
    pub concurrency: usize,
    /// Consecutive failures before an endpoint's server is marked offline
    pub failure_threshold: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(5),
            concurrency: 8,
            failure_threshold: 3,
        }
    }
}
