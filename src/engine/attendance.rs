use chrono::NaiveTime;
use serde::Serialize;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::engine::error::EngineError;

/// Derived per-day clock state. Never stored; always recomputed from the
/// clock fields of the day's attendance row. Strictly forward-only within a
/// calendar day, no undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClockStatus {
    NotClockedIn,
    ClockedIn,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClockAction {
    ClockIn,
    ClockOut,
}

/// `clock_in` is None when no row exists for the day yet.
pub fn clock_status(clock_in: Option<NaiveTime>, clock_out: Option<NaiveTime>) -> ClockStatus {
    match (clock_in, clock_out) {
        (None, _) => ClockStatus::NotClockedIn,
        (Some(_), None) => ClockStatus::ClockedIn,
        (Some(_), Some(_)) => ClockStatus::Completed,
    }
}

/// Admission check shared by the check and confirm phases. The confirm
/// phase re-checks against the database row with a conditional write, so a
/// race between two callers still commits at most once.
pub fn ensure_can_clock(status: ClockStatus, action: ClockAction) -> Result<(), EngineError> {
    match action {
        ClockAction::ClockIn => match status {
            ClockStatus::NotClockedIn => Ok(()),
            _ => Err(EngineError::AlreadyClockedIn),
        },
        ClockAction::ClockOut => match status {
            ClockStatus::ClockedIn => Ok(()),
            _ => Err(EngineError::NotClockedIn),
        },
    }
}

/// Payload of the confirm response once a clock action committed.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClockCommit {
    pub action: ClockAction,
    pub status: ClockStatus,
    #[schema(example = "Head Office")]
    pub location: String,
    pub is_offsite: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn status_is_derived_from_clock_fields() {
        assert_eq!(clock_status(None, None), ClockStatus::NotClockedIn);
        assert_eq!(clock_status(Some(t(9, 0)), None), ClockStatus::ClockedIn);
        assert_eq!(
            clock_status(Some(t(9, 0)), Some(t(18, 0))),
            ClockStatus::Completed
        );
    }

    #[test]
    fn clock_in_only_from_not_clocked_in() {
        assert!(ensure_can_clock(ClockStatus::NotClockedIn, ClockAction::ClockIn).is_ok());
        assert_eq!(
            ensure_can_clock(ClockStatus::ClockedIn, ClockAction::ClockIn),
            Err(EngineError::AlreadyClockedIn)
        );
        assert_eq!(
            ensure_can_clock(ClockStatus::Completed, ClockAction::ClockIn),
            Err(EngineError::AlreadyClockedIn)
        );
    }

    #[test]
    fn clock_out_only_while_clocked_in() {
        assert!(ensure_can_clock(ClockStatus::ClockedIn, ClockAction::ClockOut).is_ok());
        assert_eq!(
            ensure_can_clock(ClockStatus::NotClockedIn, ClockAction::ClockOut),
            Err(EngineError::NotClockedIn)
        );
        assert_eq!(
            ensure_can_clock(ClockStatus::Completed, ClockAction::ClockOut),
            Err(EngineError::NotClockedIn)
        );
    }
}
