use crate::api::engine_error_response;
use crate::auth::auth::AuthUser;
use crate::engine::approval::{
    Outcome, RequestKind, Submission, Tier, Transition, tag_reason, validate_submission,
};
use crate::engine::error::EngineError;
use crate::model::employee::ApproverAssignment;
use crate::model::leave_quota::LeaveQuotaRow;
use crate::model::leave_request::{LeaveRequestRow, LeaveResponse};
use crate::utils::notify;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestKindDto {
    Leave,
    Overtime,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "leave")]
    pub kind: RequestKindDto,
    /// Required for leave; ignored for overtime.
    #[schema(example = 2)]
    pub leave_type_id: Option<u64>,
    #[schema(example = "2026-03-09T00:00:00", format = "date-time", value_type = String)]
    pub start_at: NaiveDateTime,
    #[schema(example = "2026-03-10T00:00:00", format = "date-time", value_type = String)]
    pub end_at: NaiveDateTime,
    /// Days for leave, hours for overtime.
    #[schema(example = 1.0, value_type = f64)]
    pub total_days: Decimal,
    #[schema(example = "family matters")]
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct DecideLeave {
    /// 1 = supervisor tier, 2 = HR tier.
    #[schema(example = 1)]
    pub tier: u8,
    /// Explicit confirmation for the HR bypass of a still-pending tier-1.
    #[schema(example = false)]
    pub force: Option<bool>,
}

async fn quota_balance(
    pool: &MySqlPool,
    employee_id: u64,
    leave_type_id: u64,
    year: i32,
) -> Result<Option<LeaveQuotaRow>, sqlx::Error> {
    sqlx::query_as::<_, LeaveQuotaRow>(
        r#"
        SELECT total, used, remaining
        FROM leave_quotas
        WHERE employee_id = ? AND leave_type_id = ? AND year = ?
        "#,
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(year)
    .fetch_optional(pool)
    .await
}

/* =========================
Submit leave / overtime request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = CreateLeave,
        description = "Leave or overtime request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Request submitted", body = Object, example = json!({
            "message": "Request submitted",
            "id": 7,
            "status": "pending"
        })),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;

    let kind = match payload.kind {
        RequestKindDto::Overtime => RequestKind::Overtime,
        RequestKindDto::Leave => match payload.leave_type_id {
            Some(id) if id > 0 => RequestKind::Leave { leave_type_id: id },
            _ => {
                return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                    "message": "leave_type_id is required for leave requests"
                })));
            }
        },
    };

    let assignment = sqlx::query_as::<_, ApproverAssignment>(
        r#"SELECT id, approver1_id, approver2_id FROM employees WHERE id = ?"#,
    )
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Approver lookup failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(assignment) = assignment else {
        return Ok(HttpResponse::Forbidden().json(serde_json::json!({
            "message": "No approver assignment for this employee"
        })));
    };

    // Quota is read here, at submission time, so the request cannot
    // over-commit the balance before any approval lands.
    let balance = match kind {
        RequestKind::Leave { leave_type_id } => quota_balance(
            pool.get_ref(),
            employee_id,
            leave_type_id,
            payload.start_at.year(),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Quota lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?
        .map(|row| row.balance()),
        RequestKind::Overtime => None,
    };

    let reason = payload.reason.as_deref().unwrap_or("").trim();
    let submission = Submission {
        kind,
        start_at: payload.start_at,
        end_at: payload.end_at,
        total_days: payload.total_days,
        reason,
    };

    if let Err(e) = validate_submission(&submission, balance.as_ref()) {
        return Ok(engine_error_response(&e));
    }

    let stored_reason = tag_reason(kind, reason);

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type_id, start_at, end_at, total_days, reason,
             status, expected_approver1_id, expected_approver2_id,
             tier1_status, tier2_status, is_bypass, quota_applied)
        VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?, 'pending', 'pending', 0, 0)
        "#,
    )
    .bind(employee_id)
    .bind(kind.leave_type_id())
    .bind(payload.start_at)
    .bind(payload.end_at)
    .bind(payload.total_days)
    .bind(&stored_reason)
    .bind(assignment.approver1_id)
    .bind(assignment.approver2_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Failed to create request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let id = result.last_insert_id();
    let notify_kind = if kind.is_overtime() {
        notify::KIND_OVERTIME
    } else {
        notify::KIND_LEAVE
    };
    notify::dispatch(
        pool.get_ref(),
        assignment.approver1_id,
        format!("Request #{id} from employee {employee_id} awaits your approval"),
        notify_kind,
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Request submitted",
        "id": id,
        "status": "pending"
    })))
}

/* =========================
Tier decision (approve / reject)
========================= */
async fn decide(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<DecideLeave>,
    outcome: Outcome,
) -> actix_web::Result<HttpResponse> {
    let actor = auth.actor()?;
    let leave_id = path.into_inner();

    let Some(tier) = Tier::from_number(body.tier) else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "tier must be 1 or 2"
        })));
    };
    let force = body.force.unwrap_or(false);

    let row = sqlx::query_as::<_, LeaveRequestRow>(
        r#"
        SELECT id, employee_id, leave_type_id, start_at, end_at, total_days, reason,
               status, expected_approver1_id, expected_approver2_id,
               tier1_status, tier2_status, tier1_by, tier1_at, tier2_by, tier2_at,
               is_bypass, quota_applied, created_at
        FROM leave_requests
        WHERE id = ?
        "#,
    )
    .bind(leave_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(row) = row else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Request not found"
        })));
    };

    let mut state = row.approval_state().map_err(|e| {
        tracing::error!(error = %e, leave_id, "Request row has an invalid tier status");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let transition = match state.decide(tier, &actor, outcome, force, Utc::now()) {
        Ok(t) => t,
        Err(e) => return Ok(engine_error_response(&e)),
    };

    let committed = persist_transition(pool.get_ref(), &row, &state, &transition)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, leave_id, "Decision commit failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if !committed {
        // A concurrent decision won the compare-and-swap.
        return Ok(engine_error_response(&EngineError::AlreadyTerminal));
    }

    send_decision_notifications(pool.get_ref(), &row, &transition);

    let overall = transition.overall.to_string();
    let message = match outcome {
        Outcome::Approved => "Request approved",
        Outcome::Rejected => "Request rejected",
    };
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": message,
        "status": overall,
        "is_bypass": state.is_bypass
    })))
}

/// Applies a decided transition with a compare-and-swap on the tier status
/// columns, plus the at-most-once quota debit, in one transaction. Returns
/// false when the CAS found the row already moved on.
async fn persist_transition(
    pool: &MySqlPool,
    row: &LeaveRequestRow,
    state: &crate::engine::approval::ApprovalState,
    transition: &Transition,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let overall = transition.overall.to_string();

    let updated = match transition.tier {
        Tier::First => {
            sqlx::query(
                r#"
                UPDATE leave_requests
                SET tier1_status = ?, tier1_by = ?, tier1_at = ?, status = ?
                WHERE id = ? AND status = 'pending' AND tier1_status = 'pending'
                "#,
            )
            .bind(state.tier1_status.to_string())
            .bind(state.tier1_by)
            .bind(state.tier1_at)
            .bind(&overall)
            .bind(row.id)
            .execute(&mut *tx)
            .await?
        }
        Tier::Second => {
            sqlx::query(
                r#"
                UPDATE leave_requests
                SET tier2_status = ?, tier2_by = ?, tier2_at = ?, status = ?, is_bypass = ?
                WHERE id = ? AND status = 'pending' AND tier2_status = 'pending'
                  AND (tier1_status = 'approved' OR ?)
                "#,
            )
            .bind(state.tier2_status.to_string())
            .bind(state.tier2_by)
            .bind(state.tier2_at)
            .bind(&overall)
            .bind(state.is_bypass)
            .bind(row.id)
            .bind(transition.bypass)
            .execute(&mut *tx)
            .await?
        }
    };

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    // Quota debit, keyed on the request id via the quota_applied latch so a
    // retried approval cannot debit twice.
    if transition.overall == crate::engine::approval::RequestStatus::Approved {
        if let RequestKind::Leave { leave_type_id } = row.kind() {
            let latched = sqlx::query(
                r#"UPDATE leave_requests SET quota_applied = 1 WHERE id = ? AND quota_applied = 0"#,
            )
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

            if latched.rows_affected() == 1 {
                sqlx::query(
                    r#"
                    UPDATE leave_quotas
                    SET used = used + ?,
                        remaining = IF(remaining = -1, -1, remaining - ?)
                    WHERE employee_id = ? AND leave_type_id = ? AND year = ?
                    "#,
                )
                .bind(row.total_days)
                .bind(row.total_days)
                .bind(row.employee_id)
                .bind(leave_type_id)
                .bind(row.start_at.year())
                .execute(&mut *tx)
                .await?;
            }
        }
    }

    tx.commit().await?;
    Ok(true)
}

fn send_decision_notifications(pool: &MySqlPool, row: &LeaveRequestRow, transition: &Transition) {
    use crate::engine::approval::RequestStatus;

    let notify_kind = if row.kind().is_overtime() {
        notify::KIND_OVERTIME
    } else {
        notify::KIND_LEAVE
    };

    match transition.overall {
        RequestStatus::Approved => notify::dispatch(
            pool,
            row.employee_id,
            format!("Your request #{} was approved", row.id),
            notify_kind,
        ),
        RequestStatus::Rejected => notify::dispatch(
            pool,
            row.employee_id,
            format!("Your request #{} was rejected", row.id),
            notify_kind,
        ),
        RequestStatus::Pending => {
            // tier-1 approved, tier-2 now unblocked
            if let Some(approver2) = row.expected_approver2_id {
                notify::dispatch(
                    pool,
                    approver2,
                    format!("Request #{} awaits your approval", row.id),
                    notify_kind,
                );
            }
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "Request to approve")),
    request_body = DecideLeave,
    responses(
        (status = 200, description = "Tier decision recorded", body = Object, example = json!({
            "message": "Request approved", "status": "approved", "is_bypass": false
        })),
        (status = 403, description = "Not the expected approver for this tier"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already finalized"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<DecideLeave>,
) -> actix_web::Result<impl Responder> {
    decide(auth, pool, path, body, Outcome::Approved).await
}

#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "Request to reject")),
    request_body = DecideLeave,
    responses(
        (status = 200, description = "Tier decision recorded", body = Object, example = json!({
            "message": "Request rejected", "status": "rejected", "is_bypass": false
        })),
        (status = 403, description = "Not the expected approver for this tier"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already finalized"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<DecideLeave>,
) -> actix_web::Result<impl Responder> {
    decide(auth, pool, path, body, Outcome::Rejected).await
}

/* =========================
Pending queue for the calling approver
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave/pending",
    responses(
        (status = 200, description = "Requests awaiting the caller's decision", body = [LeaveResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn pending_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let is_hr = auth.role.has_hr_capability();
    let employee_id = match auth.employee_id {
        Some(id) => id,
        // HR service accounts without an employee link still see the queue
        None if is_hr => 0,
        None => return Err(actix_web::error::ErrorForbidden("No employee profile")),
    };

    // Mirrors ApprovalState::visible_to: HR sees every pending request, a
    // tier-2 approver only sees rows once tier-1 has approved.
    let rows = sqlx::query_as::<_, LeaveRequestRow>(
        r#"
        SELECT id, employee_id, leave_type_id, start_at, end_at, total_days, reason,
               status, expected_approver1_id, expected_approver2_id,
               tier1_status, tier2_status, tier1_by, tier1_at, tier2_by, tier2_at,
               is_bypass, quota_applied, created_at
        FROM leave_requests
        WHERE status = 'pending'
          AND (
                ?
                OR (expected_approver1_id = ? AND tier1_status = 'pending')
                OR (expected_approver2_id = ? AND tier1_status = 'approved'
                    AND tier2_status = 'pending')
          )
        ORDER BY created_at ASC
        "#,
    )
    .bind(is_hr)
    .bind(employee_id)
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch pending requests");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let responses: Vec<LeaveResponse> = rows.into_iter().map(LeaveResponse::from).collect();
    Ok(HttpResponse::Ok().json(responses))
}

/* =========================
Request detail
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "Request to fetch")),
    responses(
        (status = 200, description = "Request found", body = LeaveResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let row = sqlx::query_as::<_, LeaveRequestRow>(
        r#"
        SELECT id, employee_id, leave_type_id, start_at, end_at, total_days, reason,
               status, expected_approver1_id, expected_approver2_id,
               tier1_status, tier2_status, tier1_by, tier1_at, tier2_by, tier2_at,
               is_bypass, quota_applied, created_at
        FROM leave_requests
        WHERE id = ?
        "#,
    )
    .bind(leave_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(row) = row else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Request not found"
        })));
    };

    // Owner, either expected approver, or HR capability.
    let involved = auth.employee_id.is_some_and(|id| {
        id == row.employee_id
            || id == row.expected_approver1_id
            || row.expected_approver2_id == Some(id)
    });
    if !involved && !auth.role.has_hr_capability() {
        return Err(actix_web::error::ErrorForbidden("Not involved in this request"));
    }

    Ok(HttpResponse::Ok().json(LeaveResponse::from(row)))
}

/* =========================
Filtered history list (HR/Admin)
========================= */
#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    #[schema(example = 123)]
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    #[schema(example = "pending")]
    /// Filter by overall status
    pub status: Option<String>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated request list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = query.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = query.status.as_deref() {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count requests");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        r#"
        SELECT id, employee_id, leave_type_id, start_at, end_at, total_days, reason,
               status, expected_approver1_id, expected_approver2_id,
               tier1_status, tier2_status, tier1_by, tier1_at, tier2_by, tier2_at,
               is_bypass, quota_applied, created_at
        FROM leave_requests
        {}
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, LeaveRequestRow>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let rows = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch request list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let response = LeaveListResponse {
        data: rows.into_iter().map(LeaveResponse::from).collect(),
        page: page as u32,
        per_page: per_page as u32,
        total,
    };

    Ok(HttpResponse::Ok().json(response))
}
