//! Operator API handlers

pub mod applications;
pub mod haproxy;
pub mod internal;
pub mod route;
pub mod servers;
pub mod tags;
pub mod tasks;

use actix_web::HttpRequest;

/// Operator identity for history rows; authentication is out of scope, the
/// UI passes the operator name through this header.
pub(crate) fn actor(req: &HttpRequest) -> String {
    req.headers()
        .get("x-operator")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or("operator")
        .to_string()
}
