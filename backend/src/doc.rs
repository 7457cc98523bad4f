//! OpenAPI document served by Swagger UI in debug builds.

use utoipa::OpenApi;

use crate::inbound::http::auth::{
    EmailRequest, LoginRequest, LoginResponse, RegisterRequest, ResetPasswordRequest,
    VerifyOtpRequest,
};

/// Aggregate API description.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "fieldsync backend",
        description = "Offline-first field-operations sync and auth API"
    ),
    paths(
        crate::inbound::http::auth::register,
        crate::inbound::http::auth::login,
        crate::inbound::http::auth::forgot_password,
        crate::inbound::http::auth::verify_otp,
        crate::inbound::http::auth::reset_password,
        crate::inbound::http::auth::test_protected,
        crate::inbound::http::sync::sync_entity,
        crate::inbound::http::sync::resolve_entity,
        crate::inbound::http::down_sync::down_sync_entity,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        LoginResponse,
        EmailRequest,
        VerifyOtpRequest,
        ResetPasswordRequest,
    ))
)]
pub struct ApiDoc;
