//! Data models module
//!
//! Shared state, configuration, and response envelope types for the server.

pub mod app_state;
pub mod config;
pub mod response;

pub use app_state::AppState;
pub use config::Configuration;
pub use response::{failure, ok, ok_empty};
