use rust_decimal::Decimal;
use thiserror::Error;

/// Engine-level failures. Every variant is terminal for the call that raised
/// it; the API layer maps each to an HTTP status and a JSON message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid range: {0}")]
    InvalidRange(&'static str),

    #[error("reason is required for leave requests")]
    MissingReason,

    #[error("insufficient quota: requested {requested}, remaining {remaining}")]
    InsufficientQuota {
        requested: Decimal,
        remaining: Decimal,
    },

    #[error("actor is not allowed to decide this tier")]
    NotAuthorized,

    #[error("request is already finalized")]
    AlreadyTerminal,

    #[error("already clocked in today")]
    AlreadyClockedIn,

    #[error("no open clock-in found for today")]
    NotClockedIn,

    #[error("face verification failed (distance {distance:.3})")]
    FaceMismatch { distance: f32 },
}
