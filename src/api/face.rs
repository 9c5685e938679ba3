use crate::auth::auth::AuthUser;
use crate::engine::face::DESCRIPTOR_LEN;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct RegisterFace {
    /// 128-d reference descriptor captured at registration.
    pub descriptor: Vec<f32>,
}

/// Registers the face reference for an employee. Write-once: the stored
/// descriptor is immutable, re-registration means deleting the row out of
/// band first.
#[utoipa::path(
    post,
    path = "/api/v1/face/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee to register")),
    request_body = RegisterFace,
    responses(
        (status = 201, description = "Descriptor registered"),
        (status = 400, description = "Descriptor has the wrong shape"),
        (status = 409, description = "Descriptor already registered"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Face"
)]
pub async fn register_face(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RegisterFace>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();

    if payload.descriptor.len() != DESCRIPTOR_LEN
        || payload.descriptor.iter().any(|v| !v.is_finite())
    {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": format!("descriptor must be {DESCRIPTOR_LEN} finite numbers")
        })));
    }

    let serialized = serde_json::to_string(&payload.descriptor).map_err(|e| {
        tracing::error!(error = %e, employee_id, "Descriptor serialization failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let result = sqlx::query(
        r#"INSERT INTO face_descriptors (employee_id, descriptor) VALUES (?, ?)"#,
    )
    .bind(employee_id)
    .bind(&serialized)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => Ok(HttpResponse::Created().json(serde_json::json!({
            "message": "Face descriptor registered"
        }))),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Ok(HttpResponse::Conflict().json(serde_json::json!({
                        "message": "Face descriptor already registered for this employee"
                    })));
                }
            }
            tracing::error!(error = %e, employee_id, "Descriptor insert failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Whether the calling employee has a registered face reference, i.e.
/// whether clock-in will demand a live capture.
#[utoipa::path(
    get,
    path = "/api/v1/face/me",
    responses(
        (status = 200, description = "Registration state", body = Object, example = json!({
            "registered": true
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Face"
)]
pub async fn face_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;

    let registered = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM face_descriptors WHERE employee_id = ? LIMIT 1)",
    )
    .bind(employee_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Face status lookup failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "registered": registered })))
}
