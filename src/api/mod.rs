pub mod attendance;
pub mod face;
pub mod leave_request;
pub mod quota;

use actix_web::HttpResponse;
use serde_json::json;

use crate::engine::error::EngineError;

/// Maps engine errors onto HTTP responses. Check-phase failures carry no
/// state change, so a plain status + message is all the client needs.
pub(crate) fn engine_error_response(err: &EngineError) -> HttpResponse {
    let body = json!({ "message": err.to_string() });
    match err {
        EngineError::InvalidRange(_)
        | EngineError::MissingReason
        | EngineError::InsufficientQuota { .. } => HttpResponse::BadRequest().json(body),
        EngineError::NotAuthorized | EngineError::FaceMismatch { .. } => {
            HttpResponse::Forbidden().json(body)
        }
        EngineError::AlreadyTerminal
        | EngineError::AlreadyClockedIn
        | EngineError::NotClockedIn => HttpResponse::Conflict().json(body),
    }
}
