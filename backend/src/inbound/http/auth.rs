//! Auth API handlers.
//!
//! ```text
//! POST /api/register         {"name":"Ana","email":"ana@x.io","password":"...","role":"volunteer"}
//! POST /api/login            {"email":"ana@x.io","password":"..."}
//! POST /api/forgot-password  {"email":"ana@x.io"}
//! POST /api/verify-otp       {"email":"ana@x.io","otp":123456}
//! POST /api/reset-password   {"email":"ana@x.io","password":"...","confirm_password":"..."}
//! GET  /api/test-protected   (bearer required)
//! ```

use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::domain::auth::RegisterProfile;
use crate::domain::{validate, Error};
use crate::inbound::http::bearer::BearerClaims;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::ApiResult;

/// Registration request body for `POST /api/register`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, alias = "phoneNumber")]
    pub phone_number: Option<String>,
    pub role: String,
}

/// Login request body for `POST /api/login`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response carrying the bearer token.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

/// OTP verification body; the code is accepted as a number or a string.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    #[schema(value_type = i64)]
    pub otp: Value,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub password: String,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
}

/// Register a new user.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
#[post("/register")]
pub async fn register(
    state: web::Data<HttpState>,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let profile = state
        .auth
        .register(RegisterProfile {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            phone_number: payload.phone_number,
            role: payload.role,
        })
        .await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "user registered",
        "user": profile,
    })))
}

/// Authenticate and mint a bearer token.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login success", body = LoginResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
#[post("/login")]
pub async fn login(
    state: web::Data<HttpState>,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let success = state.auth.login(&payload.email, &payload.password).await?;
    Ok(HttpResponse::Ok().json(LoginResponse {
        token: success.token,
        expires_in: success.expires_in.to_string(),
    }))
}

/// Issue a password-reset code by email.
#[utoipa::path(
    post,
    path = "/api/forgot-password",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset code sent"),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "No account for that email"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
#[post("/forgot-password")]
pub async fn forgot_password(
    state: web::Data<HttpState>,
    payload: web::Json<EmailRequest>,
) -> ApiResult<HttpResponse> {
    state.auth.forgot_password(&payload.email).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "password reset code sent",
    })))
}

/// Check a password-reset code.
#[utoipa::path(
    post,
    path = "/api/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code accepted"),
        (status = 400, description = "Missing, incorrect, or expired code"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
#[post("/verify-otp")]
pub async fn verify_otp(
    state: web::Data<HttpState>,
    payload: web::Json<VerifyOtpRequest>,
) -> ApiResult<HttpResponse> {
    let otp = parse_otp(&payload.otp)?;
    state.auth.verify_otp(&payload.email, otp).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "reset code verified",
    })))
}

/// Set a new password after a reset code was issued.
#[utoipa::path(
    post,
    path = "/api/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "No account for that email"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
#[post("/reset-password")]
pub async fn reset_password(
    state: web::Data<HttpState>,
    payload: web::Json<ResetPasswordRequest>,
) -> ApiResult<HttpResponse> {
    state
        .auth
        .reset_password(&payload.email, &payload.password, &payload.confirm_password)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "password updated",
    })))
}

/// Echo the verified claims; exercises the bearer middleware end to end.
#[utoipa::path(
    get,
    path = "/api/test-protected",
    responses(
        (status = 200, description = "Token accepted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role not permitted")
    ),
    tag = "auth"
)]
#[get("/test-protected")]
pub async fn test_protected(claims: BearerClaims) -> ApiResult<HttpResponse> {
    let BearerClaims(claims) = claims;
    if !validate::role_ok(&claims.role) && claims.role != "user" {
        return Err(Error::forbidden("role is not permitted to access this resource"));
    }
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "token verified",
        "user": { "uid": claims.uid, "email": claims.email, "role": claims.role },
    })))
}

fn parse_otp(raw: &Value) -> Result<i64, Error> {
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        Error::invalid_request("otp must be a six digit code")
            .with_details(json!({ "field": "otp" }))
    })
}
