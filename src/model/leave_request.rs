use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::prelude::FromRow;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::engine::approval::{ApprovalState, RequestKind, TierStatus, strip_tag};

/// A `leave_requests` row as stored. Tier statuses are kept as strings at
/// this layer and parsed into engine enums on demand.
#[derive(Debug, Clone, FromRow)]
pub struct LeaveRequestRow {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub total_days: Decimal,
    pub reason: String,
    pub status: String,
    pub expected_approver1_id: u64,
    pub expected_approver2_id: Option<u64>,
    pub tier1_status: String,
    pub tier2_status: String,
    pub tier1_by: Option<u64>,
    pub tier1_at: Option<DateTime<Utc>>,
    pub tier2_by: Option<u64>,
    pub tier2_at: Option<DateTime<Utc>>,
    pub is_bypass: bool,
    pub quota_applied: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl LeaveRequestRow {
    pub fn kind(&self) -> RequestKind {
        RequestKind::from_stored(self.leave_type_id, &self.reason)
    }

    /// Rebuilds the approval machine state from the stored columns. A status
    /// string outside the domain means the row was edited out of band.
    pub fn approval_state(&self) -> Result<ApprovalState, strum::ParseError> {
        Ok(ApprovalState {
            expected_approver1_id: self.expected_approver1_id,
            expected_approver2_id: self.expected_approver2_id,
            tier1_status: TierStatus::from_str(&self.tier1_status)?,
            tier2_status: TierStatus::from_str(&self.tier2_status)?,
            tier1_by: self.tier1_by,
            tier1_at: self.tier1_at,
            tier2_by: self.tier2_by,
            tier2_at: self.tier2_at,
            is_bypass: self.is_bypass,
        })
    }
}

#[derive(Serialize, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "employee_id": 1000,
    "kind": "leave",
    "leave_type_id": 2,
    "start_at": "2026-03-09T00:00:00",
    "end_at": "2026-03-10T00:00:00",
    "total_days": 1.0,
    "reason": "family matters",
    "status": "pending",
    "tier1_status": "pending",
    "tier2_status": "pending",
    "is_bypass": false,
    "created_at": "2026-03-02T09:00:00Z"
}))]
pub struct LeaveResponse {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    /// "leave" or "overtime"
    #[schema(example = "leave")]
    pub kind: String,
    #[schema(example = 2)]
    pub leave_type_id: u64,
    #[schema(example = "2026-03-09T00:00:00", format = "date-time", value_type = String)]
    pub start_at: NaiveDateTime,
    #[schema(example = "2026-03-10T00:00:00", format = "date-time", value_type = String)]
    pub end_at: NaiveDateTime,
    /// Days for leave, hours for overtime.
    #[schema(example = 1.0, value_type = f64)]
    pub total_days: Decimal,
    /// Reason with any `[OT]` tag stripped for display.
    #[schema(example = "family matters")]
    pub reason: String,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(example = "pending")]
    pub tier1_status: String,
    pub tier1_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub tier1_at: Option<DateTime<Utc>>,
    #[schema(example = "pending")]
    pub tier2_status: String,
    pub tier2_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub tier2_at: Option<DateTime<Utc>>,
    pub expected_approver1_id: u64,
    pub expected_approver2_id: Option<u64>,
    pub is_bypass: bool,
    #[schema(example = "2026-03-02T09:00:00Z", format = "date-time", value_type = String)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<LeaveRequestRow> for LeaveResponse {
    fn from(row: LeaveRequestRow) -> Self {
        let kind = if row.kind().is_overtime() {
            "overtime"
        } else {
            "leave"
        };
        LeaveResponse {
            id: row.id,
            employee_id: row.employee_id,
            kind: kind.to_string(),
            leave_type_id: row.leave_type_id,
            start_at: row.start_at,
            end_at: row.end_at,
            total_days: row.total_days,
            reason: strip_tag(&row.reason).to_string(),
            status: row.status,
            tier1_status: row.tier1_status,
            tier1_by: row.tier1_by,
            tier1_at: row.tier1_at,
            tier2_status: row.tier2_status,
            tier2_by: row.tier2_by,
            tier2_at: row.tier2_at,
            expected_approver1_id: row.expected_approver1_id,
            expected_approver2_id: row.expected_approver2_id,
            is_bypass: row.is_bypass,
            created_at: row.created_at,
        }
    }
}
