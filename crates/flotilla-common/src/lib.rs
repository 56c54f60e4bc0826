//! Flotilla Common - Shared types and utilities
//!
//! This crate provides the foundational types used across all Flotilla components:
//! - Error types with stable API error kinds
//! - Shared constants (lock tags, source names, defaults)
//! - Utility functions and macros

pub mod error;
pub mod macros;
pub mod utils;

// Re-exports for convenience
pub use error::{ErrorKind, FlotillaError};
pub use utils::{now_utc, truncate_message};

/// System tag that blocks start/stop/restart operations on an instance
pub const STATUS_LOCK_TAG: &str = "status.lock";

/// System tag that blocks update operations on an instance
pub const VER_LOCK_TAG: &str = "ver.lock";

/// Instance status value reported by the agent for a running instance
pub const INSTANCE_STATUS_ONLINE: &str = "online";

/// Instance status value reported by the agent for a stopped instance
pub const INSTANCE_STATUS_OFFLINE: &str = "offline";

/// Default agent HTTP port when a server is registered without one
pub const DEFAULT_AGENT_PORT: i32 = 8670;

/// Default Eureka HTTP port used when a Eureka node carries no explicit URL
pub const DEFAULT_EUREKA_PORT: i32 = 8761;

/// Observation source identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Agent,
    Haproxy,
    Eureka,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Agent => "agent",
            Source::Haproxy => "haproxy",
            Source::Eureka => "eureka",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(Source::Agent),
            "haproxy" => Ok(Source::Haproxy),
            "eureka" => Ok(Source::Eureka),
            _ => Err(format!("Invalid source: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_source_round_trip() {
        for source in [Source::Agent, Source::Haproxy, Source::Eureka] {
            assert_eq!(Source::from_str(source.as_str()).unwrap(), source);
        }
        assert!(Source::from_str("consul").is_err());
    }

    #[test]
    fn test_lock_tags_are_distinct() {
        assert_ne!(STATUS_LOCK_TAG, VER_LOCK_TAG);
    }
}
