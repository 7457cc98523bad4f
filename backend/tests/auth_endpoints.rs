//! End-to-end coverage of the auth endpoints, including the
//! uid-reconciliation repair inside password reset.

mod support;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use serde_json::{json, Value};

use backend::domain::auth::TokenKit;
use backend::domain::ports::{AuthStore, DocStore};
use backend::server::configure_api;
use support::{test_context, JWT_SECRET};

macro_rules! init_app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data($ctx.state.clone())
                .configure(configure_api),
        )
        .await
    };
}

macro_rules! post_json {
    ($app:expr, $uri:expr, $body:expr) => {{
        let res = test::call_service(
            $app,
            test::TestRequest::post()
                .uri($uri)
                .set_json($body)
                .to_request(),
        )
        .await;
        let status = res.status();
        let body: Value = test::read_body_json(res).await;
        (status, body)
    }};
}

fn register_body() -> Value {
    json!({
        "name": "Ana", "email": "ana@x.io",
        "password": "secret123", "role": "volunteer"
    })
}

async fn stored_otp(ctx: &support::TestContext, email: &str) -> i64 {
    ctx.store
        .get("otps", email)
        .await
        .expect("get")
        .expect("otp record")
        .get("otp")
        .and_then(Value::as_i64)
        .expect("otp value")
}

#[actix_web::test]
async fn register_login_and_protected_round_trip() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let (status, body) = post_json!(&app, "/api/register", register_body());
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "ana@x.io");

    let (status, _) = post_json!(&app, "/api/register", register_body());
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = post_json!(
        &app,
        "/api/login",
        json!({"email": "ana@x.io", "password": "secret123"})
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expiresIn"], "2h");
    let token = body["token"].as_str().expect("token").to_string();

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/test-protected")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["user"]["email"], "ana@x.io");
    assert_eq!(body["user"]["role"], "volunteer");
}

#[actix_web::test]
async fn login_with_wrong_password_is_unauthorized() {
    let ctx = test_context();
    let app = init_app!(ctx);
    post_json!(&app, "/api/register", register_body());
    let (status, _) = post_json!(
        &app,
        "/api/login",
        json!({"email": "ana@x.io", "password": "wrong-pass"})
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn protected_route_rejects_missing_and_bad_tokens() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let res = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/test-protected").to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/test-protected")
            .insert_header(("Authorization", "Bearer not.a.token"))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/test-protected")
            .insert_header(("Authorization", "Basic abc"))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn protected_route_forbids_unknown_roles() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let token = TokenKit::new(JWT_SECRET)
        .mint("u1", "ana@x.io", "overlord")
        .expect("mint");
    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/test-protected")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn forgot_password_for_unknown_email_is_not_found() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let (status, _) = post_json!(&app, "/api/forgot-password", json!({"email": "ghost@x.io"}));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(ctx.mailer.sent().is_empty());
}

#[actix_web::test]
async fn forgot_verify_reset_flow() {
    let ctx = test_context();
    let app = init_app!(ctx);
    post_json!(&app, "/api/register", register_body());

    let (status, _) = post_json!(&app, "/api/forgot-password", json!({"email": "ana@x.io"}));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx.mailer.sent().len(), 1);

    let otp = stored_otp(&ctx, "ana@x.io").await;
    let (status, _) = post_json!(
        &app,
        "/api/verify-otp",
        json!({"email": "ana@x.io", "otp": otp})
    );
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json!(
        &app,
        "/api/verify-otp",
        json!({"email": "ana@x.io", "otp": otp + 1})
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json!(
        &app,
        "/api/reset-password",
        json!({
            "email": "ana@x.io",
            "password": "fresh-secret",
            "confirm_password": "fresh-secret"
        })
    );
    assert_eq!(status, StatusCode::OK);
    assert!(ctx
        .store
        .get("otps", "ana@x.io")
        .await
        .expect("get")
        .is_none());

    let (status, _) = post_json!(
        &app,
        "/api/login",
        json!({"email": "ana@x.io", "password": "fresh-secret"})
    );
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn reset_repairs_a_uid_mismatch_between_stores() {
    let ctx = test_context();
    let app = init_app!(ctx);

    // The profile lives under d1 while the identity provider knows the
    // same email under a different uid.
    let auth_uid = ctx
        .auth
        .create_user("ana@x.io", "old-secret", "Ana")
        .await
        .expect("auth user");
    let profile = json!({
        "user_id": "d1", "name": "Ana", "email": "ana@x.io",
        "role": "volunteer", "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    });
    ctx.store
        .set("users", "d1", profile.as_object().expect("fixture").clone())
        .await
        .expect("seed profile");

    let (status, _) = post_json!(
        &app,
        "/api/reset-password",
        json!({
            "email": "ana@x.io",
            "password": "fresh-secret",
            "confirm_password": "fresh-secret"
        })
    );
    assert_eq!(status, StatusCode::OK);

    assert!(ctx.store.get("users", "d1").await.expect("get").is_none());
    let migrated = ctx
        .store
        .get("users", &auth_uid)
        .await
        .expect("get")
        .expect("migrated profile");
    assert_eq!(migrated["user_id"].as_str(), Some(auth_uid.as_str()));

    let (status, _) = post_json!(
        &app,
        "/api/login",
        json!({"email": "ana@x.io", "password": "fresh-secret"})
    );
    assert_eq!(status, StatusCode::OK);
}
