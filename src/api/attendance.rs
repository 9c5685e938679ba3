use crate::api::engine_error_response;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::engine::attendance::{ClockAction, ClockCommit, ClockStatus, clock_status, ensure_can_clock};
use crate::engine::{face, geofence};
use crate::model::attendance::AttendanceRow;
use crate::model::face::FaceDescriptorRow;
use crate::utils::{clock_token, location_cache};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct ClockCheckReq {
    #[schema(example = 23.7771)]
    pub latitude: f64,
    #[schema(example = 90.3991)]
    pub longitude: f64,
    /// Live-captured 128-d face descriptor. Mandatory on clock-in when a
    /// reference descriptor is registered; ignored on clock-out.
    pub face_descriptor: Option<Vec<f32>>,
}

#[derive(Serialize, ToSchema)]
pub struct ClockCheckResponse {
    /// Single-use confirm token; the client presents it after the user has
    /// reviewed the geofence result.
    #[schema(example = "0b4ef7f2-4b1a-4b52-9e55-2d6a8f0b3c11")]
    pub token: String,
    pub action: ClockAction,
    pub geofence: geofence::GeofenceCheck,
    /// Distance of the live face capture to the stored reference, when the
    /// face gate ran.
    #[schema(example = 0.41)]
    pub face_distance: Option<f32>,
    #[schema(example = 120)]
    pub expires_in_secs: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct ClockConfirmReq {
    #[schema(example = "0b4ef7f2-4b1a-4b52-9e55-2d6a8f0b3c11")]
    pub token: String,
}

fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

async fn load_today(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
) -> Result<Option<AttendanceRow>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRow>(
        r#"
        SELECT id, employee_id, date, clock_in, clock_out, location, is_offsite
        FROM attendance_records
        WHERE employee_id = ? AND date = ?
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .fetch_optional(pool)
    .await
}

fn current_status(row: &Option<AttendanceRow>) -> ClockStatus {
    match row {
        Some(r) => clock_status(Some(r.clock_in), r.clock_out),
        None => clock_status(None, None),
    }
}

/// Clock-in check phase: face gate (hard), then geofence (advisory). No
/// writes happen here; the caller gets a confirm token and may still abort.
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-in/check",
    request_body = ClockCheckReq,
    responses(
        (status = 200, description = "Check passed; confirm token issued", body = ClockCheckResponse),
        (status = 400, description = "Face descriptor required but missing"),
        (status = 403, description = "Face verification failed"),
        (status = 409, description = "Already clocked in today"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_in_check(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<ClockCheckReq>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;
    let today = today_local();

    let row = load_today(pool.get_ref(), employee_id, today)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Attendance lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if let Err(e) = ensure_can_clock(current_status(&row), ClockAction::ClockIn) {
        return Ok(engine_error_response(&e));
    }

    // Face gate, only for employees with a registered reference.
    let reference = sqlx::query_as::<_, FaceDescriptorRow>(
        r#"SELECT employee_id, descriptor FROM face_descriptors WHERE employee_id = ?"#,
    )
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Face descriptor lookup failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let face_distance = match &reference {
        Some(stored) => {
            let Some(live) = payload.face_descriptor.as_deref() else {
                return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                    "message": "Face descriptor is required for clock-in"
                })));
            };
            let stored_vec = stored.vector().map_err(|e| {
                tracing::error!(error = %e, employee_id, "Stored face descriptor is corrupt");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?;
            match face::verify(&stored_vec, live, config.face_match_threshold) {
                Ok(distance) => Some(distance),
                Err(e) => return Ok(engine_error_response(&e)),
            }
        }
        None => None,
    };

    let locations = location_cache::active_locations(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Work location load failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;
    let check = geofence::resolve(&locations, payload.latitude, payload.longitude);

    let token = clock_token::issue(employee_id, ClockAction::ClockIn, today, check.clone()).await;

    Ok(HttpResponse::Ok().json(ClockCheckResponse {
        token,
        action: ClockAction::ClockIn,
        geofence: check,
        face_distance,
        expires_in_secs: config.clock_token_ttl_secs,
    }))
}

/// Clock-in confirm phase: consumes the token and commits the day's row.
/// The UNIQUE (employee_id, date) key is the serialization point: of two
/// racing confirms exactly one row wins, the loser sees a duplicate key.
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-in/confirm",
    request_body = ClockConfirmReq,
    responses(
        (status = 200, description = "Clocked in", body = ClockCommit),
        (status = 409, description = "Already clocked in today"),
        (status = 410, description = "Token expired or invalid"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_in_confirm(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ClockConfirmReq>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;
    let today = today_local();

    let Some(pending) =
        clock_token::take(&payload.token, employee_id, ClockAction::ClockIn, today).await
    else {
        return Ok(HttpResponse::Gone().json(serde_json::json!({
            "message": "Clock-in token expired or invalid; run the check again"
        })));
    };

    let is_offsite = pending.geofence.is_offsite();
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records (employee_id, date, clock_in, location, is_offsite)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(today)
    .bind(Local::now().time())
    .bind(&pending.geofence.label)
    .bind(is_offsite)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => Ok(HttpResponse::Ok().json(ClockCommit {
            action: ClockAction::ClockIn,
            status: ClockStatus::ClockedIn,
            location: pending.geofence.label,
            is_offsite,
        })),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Ok(engine_error_response(
                        &crate::engine::error::EngineError::AlreadyClockedIn,
                    ));
                }
            }
            tracing::error!(error = %e, employee_id, "Clock-in commit failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Clock-out check phase: geofence only, no face gate.
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-out/check",
    request_body = ClockCheckReq,
    responses(
        (status = 200, description = "Check passed; confirm token issued", body = ClockCheckResponse),
        (status = 409, description = "No open clock-in today"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_out_check(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<ClockCheckReq>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;
    let today = today_local();

    let row = load_today(pool.get_ref(), employee_id, today)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Attendance lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if let Err(e) = ensure_can_clock(current_status(&row), ClockAction::ClockOut) {
        return Ok(engine_error_response(&e));
    }

    let locations = location_cache::active_locations(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Work location load failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;
    let check = geofence::resolve(&locations, payload.latitude, payload.longitude);

    let token = clock_token::issue(employee_id, ClockAction::ClockOut, today, check.clone()).await;

    Ok(HttpResponse::Ok().json(ClockCheckResponse {
        token,
        action: ClockAction::ClockOut,
        geofence: check,
        face_distance: None,
        expires_in_secs: config.clock_token_ttl_secs,
    }))
}

/// Clock-out confirm phase. The conditional `clock_out IS NULL` update is
/// the compare-and-swap; a second confirm finds no row to change.
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-out/confirm",
    request_body = ClockConfirmReq,
    responses(
        (status = 200, description = "Clocked out", body = ClockCommit),
        (status = 409, description = "No open clock-in today"),
        (status = 410, description = "Token expired or invalid"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_out_confirm(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ClockConfirmReq>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;
    let today = today_local();

    let Some(pending) =
        clock_token::take(&payload.token, employee_id, ClockAction::ClockOut, today).await
    else {
        return Ok(HttpResponse::Gone().json(serde_json::json!({
            "message": "Clock-out token expired or invalid; run the check again"
        })));
    };

    let result = sqlx::query(
        r#"
        UPDATE attendance_records
        SET clock_out = ?
        WHERE employee_id = ? AND date = ? AND clock_out IS NULL
        "#,
    )
    .bind(Local::now().time())
    .bind(employee_id)
    .bind(today)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Clock-out commit failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(engine_error_response(
            &crate::engine::error::EngineError::NotClockedIn,
        ));
    }

    Ok(HttpResponse::Ok().json(ClockCommit {
        action: ClockAction::ClockOut,
        status: ClockStatus::Completed,
        is_offsite: pending.geofence.is_offsite(),
        location: pending.geofence.label,
    }))
}

#[derive(Serialize, ToSchema)]
pub struct TodayResponse {
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub status: ClockStatus,
    pub record: Option<AttendanceRow>,
}

/// Today's derived clock state for the calling employee.
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today",
    responses(
        (status = 200, description = "Today's attendance state", body = TodayResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;
    let today = today_local();

    let row = load_today(pool.get_ref(), employee_id, today)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Attendance lookup failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(TodayResponse {
        date: today,
        status: current_status(&row),
        record: row,
    }))
}
