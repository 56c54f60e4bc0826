//! Response envelope
//!
//! Every response carries `success`; failures add the stable error kind
//! verbatim plus a human-readable message. Bulk endpoints succeed at the
//! envelope level and report per-item results - they never 5xx because some
//! items failed.

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;

use flotilla_common::{ErrorKind, FlotillaError};

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    message: String,
}

/// 200 with `{success: true, data}`
pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        success: true,
        data: Some(data),
    })
}

/// 200 with `{success: true}`
pub fn ok_empty() -> HttpResponse {
    HttpResponse::Ok().json(Envelope::<()> {
        success: true,
        data: None,
    })
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
        ErrorKind::RemoteUnavailable | ErrorKind::RemoteMalformed => StatusCode::BAD_GATEWAY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Cancelled => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error response with the kind string verbatim
pub fn failure(err: anyhow::Error) -> HttpResponse {
    let typed = FlotillaError::from_anyhow(err);
    let kind = typed.kind();
    HttpResponse::build(status_for(kind)).json(ErrorEnvelope {
        success: false,
        error: kind.as_str().to_string(),
        message: typed.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::PreconditionFailed),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(status_for(ErrorKind::Timeout), StatusCode::GATEWAY_TIMEOUT);
    }
}
