use crate::auth::auth::AuthUser;
use crate::engine::quota::QuotaBalance;
use crate::model::leave_quota::LeaveQuotaRow;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Local};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct QuotaQuery {
    #[schema(example = 2)]
    pub leave_type_id: u64,
    /// Defaults to the current year.
    #[schema(example = 2026)]
    pub year: Option<i32>,
    /// HR/Admin may read another employee's balance.
    #[schema(example = 1000)]
    pub employee_id: Option<u64>,
}

/// Remaining balance for one (employee, leave type, year) bucket.
/// `remaining = -1` means unlimited.
#[utoipa::path(
    get,
    path = "/api/v1/quota",
    params(QuotaQuery),
    responses(
        (status = 200, description = "Quota balance", body = QuotaBalance),
        (status = 404, description = "No quota configured for this bucket"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Quota"
)]
pub async fn get_quota(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<QuotaQuery>,
) -> actix_web::Result<impl Responder> {
    let self_id = auth.require_employee_id()?;
    let employee_id = match query.employee_id {
        Some(other) if other != self_id => {
            auth.require_hr_or_admin()?;
            other
        }
        _ => self_id,
    };

    let year = query.year.unwrap_or_else(|| Local::now().year());

    let row = sqlx::query_as::<_, LeaveQuotaRow>(
        r#"
        SELECT total, used, remaining
        FROM leave_quotas
        WHERE employee_id = ? AND leave_type_id = ? AND year = ?
        "#,
    )
    .bind(employee_id)
    .bind(query.leave_type_id)
    .bind(year)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Quota lookup failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match row {
        Some(row) => Ok(HttpResponse::Ok().json(row.balance())),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "No quota configured for this leave type and year"
        }))),
    }
}
