use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::prelude::FromRow;
use utoipa::ToSchema;

use crate::engine::attendance::{ClockStatus, clock_status};

/// An `attendance_records` row. One row per (employee, date); the row only
/// exists once a clock-in committed.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AttendanceRow {
    #[schema(example = 42)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:02:11", value_type = String)]
    pub clock_in: NaiveTime,
    #[schema(example = "18:01:40", value_type = Option<String>)]
    pub clock_out: Option<NaiveTime>,
    #[schema(example = "Head Office")]
    pub location: String,
    #[schema(example = false)]
    pub is_offsite: bool,
}

impl AttendanceRow {
    pub fn status(&self) -> ClockStatus {
        clock_status(Some(self.clock_in), self.clock_out)
    }
}
