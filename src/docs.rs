use crate::api::attendance::{
    ClockCheckReq, ClockCheckResponse, ClockConfirmReq, TodayResponse,
};
use crate::api::face::RegisterFace;
use crate::api::leave_request::{
    CreateLeave, DecideLeave, LeaveFilter, LeaveListResponse, RequestKindDto,
};
use crate::api::quota::QuotaQuery;
use crate::engine::attendance::{ClockAction, ClockCommit, ClockStatus};
use crate::engine::geofence::GeofenceCheck;
use crate::engine::quota::QuotaBalance;
use crate::model::attendance::AttendanceRow;
use crate::model::leave_request::LeaveResponse;
use crate::model::work_location::WorkLocation;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Self-Service Portal API",
        version = "1.0.0",
        description = r#"
## HR Self-Service Portal

Backend for employee self-service: attendance with geofencing and face
verification, and a two-tier leave/overtime approval workflow.

### Key Features
- **Leave & Overtime Requests**
  - Submit against an annual quota; supervisor then HR sign-off; explicit
    HR bypass of a pending supervisor tier
- **Attendance**
  - Two-phase clock-in/out: check (face gate + geofence advisory) then
    confirm, serialized per employee and day
- **Quota**
  - Per employee, leave type, and year; unlimited sentinel supported

### Security
All portal endpoints are protected with **JWT Bearer authentication**.
Tier decisions are restricted to the configured approvers; HR/Admin carry
an override capability that is always flagged on the record.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::pending_leaves,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::leave_list,

        crate::api::attendance::clock_in_check,
        crate::api::attendance::clock_in_confirm,
        crate::api::attendance::clock_out_check,
        crate::api::attendance::clock_out_confirm,
        crate::api::attendance::attendance_today,

        crate::api::quota::get_quota,

        crate::api::face::register_face,
        crate::api::face::face_status
    ),
    components(
        schemas(
            CreateLeave,
            DecideLeave,
            RequestKindDto,
            LeaveFilter,
            LeaveResponse,
            LeaveListResponse,
            ClockCheckReq,
            ClockCheckResponse,
            ClockConfirmReq,
            ClockCommit,
            ClockAction,
            ClockStatus,
            TodayResponse,
            AttendanceRow,
            GeofenceCheck,
            WorkLocation,
            QuotaQuery,
            QuotaBalance,
            RegisterFace
        )
    ),
    tags(
        (name = "Leave", description = "Leave and overtime approval APIs"),
        (name = "Attendance", description = "Clock-in/out APIs"),
        (name = "Quota", description = "Leave quota APIs"),
        (name = "Face", description = "Face descriptor APIs"),
    )
)]
pub struct ApiDoc;
