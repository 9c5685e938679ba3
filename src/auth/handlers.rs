use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    models::{LoginReq, RegisterReq, TokenType, UserRow},
};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, instrument};

#[derive(Serialize, Deserialize)]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

/// User registration handler. Role assignment and the employee link are
/// trusted input here; account provisioning policy lives outside this
/// service.
pub async fn register(user: web::Json<RegisterReq>, pool: web::Data<MySqlPool>) -> impl Responder {
    let username = user.username.trim();

    if username.is_empty() || user.password.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "Username and password must not be empty"
        }));
    }

    let hashed = match hash_password(&user.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(error = %e, "Password hashing failed");
            return HttpResponse::InternalServerError().json(json!({
                "error": "Failed to register user"
            }));
        }
    };

    let result = sqlx::query(
        r#"INSERT INTO users (username, password, role_id, employee_id) VALUES (?, ?, ?, ?)"#,
    )
    .bind(username)
    .bind(&hashed)
    .bind(user.role_id)
    .bind(user.employee_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => HttpResponse::Created().json(json!({
            "message": "User registered successfully"
        })),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return HttpResponse::Conflict().json(json!({
                        "error": "Username already exists"
                    }));
                }
            }
            tracing::error!(error = %e, "User insert failed");
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to register user"
            }))
        }
    }
}

#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    if user.username.trim().is_empty() || user.password.is_empty() {
        return HttpResponse::BadRequest().body("Username or password required");
    }

    let row = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, username, password, role_id, employee_id
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim())
    .fetch_optional(pool.get_ref())
    .await;

    let row = match row {
        Ok(Some(row)) => row,
        Ok(None) => {
            return HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}));
        }
        Err(e) => {
            tracing::error!(error = %e, "Login lookup failed");
            return HttpResponse::InternalServerError().body("Internal Server Error");
        }
    };

    if verify_password(&user.password, &row.password).is_err() {
        return HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}));
    }

    info!(user_id = row.id, "Login successful");

    let access_token = generate_access_token(
        row.id,
        row.username.clone(),
        row.role_id,
        row.employee_id,
        &config.jwt_secret,
        config.access_token_ttl,
    );
    let refresh_token = generate_refresh_token(
        row.id,
        row.username,
        row.role_id,
        row.employee_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    );

    HttpResponse::Ok().json(TokenPair {
        access_token,
        refresh_token,
    })
}

#[derive(Deserialize)]
pub struct RefreshReq {
    refresh_token: String,
}

pub async fn refresh_token(
    payload: web::Json<RefreshReq>,
    config: web::Data<Config>,
) -> impl Responder {
    let claims = match verify_token(&payload.refresh_token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            return HttpResponse::Unauthorized()
                .json(json!({"error": "Invalid or expired refresh token", "details": e}));
        }
    };

    if claims.token_type != TokenType::Refresh {
        return HttpResponse::Unauthorized().json(json!({"error": "Not a refresh token"}));
    }

    let access_token = generate_access_token(
        claims.user_id,
        claims.sub,
        claims.role,
        claims.employee_id,
        &config.jwt_secret,
        config.access_token_ttl,
    );

    HttpResponse::Ok().json(json!({ "access_token": access_token }))
}
