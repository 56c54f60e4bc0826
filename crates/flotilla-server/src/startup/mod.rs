//! Application startup utilities

mod http;
mod logging;
mod shutdown;

pub use http::api_server;
pub use logging::init_logging;
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
