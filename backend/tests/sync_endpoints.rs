//! End-to-end coverage of the sync endpoints.

mod support;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use serde_json::{json, Value};

use backend::server::configure_api;
use support::test_context;

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

fn ana(updated_at: &str) -> Value {
    json!({
        "user_id": "u1", "name": "Ana", "email": "ana@x.io",
        "role": "volunteer", "updated_at": updated_at
    })
}

#[actix_web::test]
async fn fresh_user_syncs_and_appears_in_down_sync() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let (status, body) = post_json!(&app, "/api/sync/user", ana("2024-03-01T10:00:00Z"));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user_id"], "u1");
    assert_eq!(body["isNewUser"], true);
    assert_eq!(body["data"]["updated_at"], "2024-03-01T10:00:00Z");

    let res = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/down-sync/user").to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let listing: Value = test::read_body_json(res).await;
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["data"][0]["user_id"], "u1");
}

#[actix_web::test]
async fn stale_user_update_returns_conflict_with_strategies() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let (status, _) = post_json!(&app, "/api/sync/user", ana("2024-03-01T10:00:00Z"));
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json!(&app, "/api/sync/user", ana("2024-02-01T10:00:00Z"));
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["conflict_field"], "updated_at");
    assert_eq!(
        body["allowed_strategies"],
        json!(["client_wins", "server_wins", "merge", "update_data"])
    );
    assert_eq!(body["client_id"], "u1");
    assert_eq!(body["server_id"], "u1");
    assert_eq!(body["latest_data"]["updated_at"], "2024-03-01T10:00:00Z");
}

#[actix_web::test]
async fn registration_unique_collision_is_reported() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let first = json!({
        "registration_id": "r1", "user_id": "u1", "person_name": "Ram",
        "age": 40, "gender": "male", "location_id": "loc-1",
        "contact": "111", "status": "pending",
        "timestamp": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:00:00Z"
    });
    let (status, _) = post_json!(&app, "/api/sync/registration", first);
    assert_eq!(status, StatusCode::OK);

    let second = json!({
        "registration_id": "r2", "user_id": "u2", "person_name": "Ram",
        "age": 40, "gender": "male", "location_id": "loc-9",
        "contact": "999", "status": "pending",
        "timestamp": "2024-03-01T11:00:00Z",
        "updated_at": "2024-03-01T11:00:00Z"
    });
    let (status, body) = post_json!(&app, "/api/sync/registration", second);
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["conflict_type"], "unique_constraint");
    assert_eq!(body["allowed_strategies"], json!(["client_wins"]));
    assert_eq!(body["server_id"], "r1");
}

#[actix_web::test]
async fn duplicate_registration_of_same_person_is_auto_merged() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let first = json!({
        "registration_id": "r1", "user_id": "u1", "person_name": "Ram",
        "age": 40, "gender": "male", "location_id": "loc-1",
        "contact": "111", "status": "pending",
        "timestamp": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:00:00Z"
    });
    let (status, _) = post_json!(&app, "/api/sync/registration", first);
    assert_eq!(status, StatusCode::OK);

    let duplicate = json!({
        "registration_id": "r2", "user_id": "u2", "person_name": "Ram Kumar",
        "age": 41, "gender": "male", "location_id": "loc-1",
        "contact": "111", "status": "pending",
        "timestamp": "2024-03-01T11:00:00Z",
        "updated_at": "2024-03-01T11:00:00Z"
    });
    let (status, body) = post_json!(&app, "/api/sync/registration", duplicate);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resolved_as"], "same_registration_detected");
    assert_eq!(body["registration_id"], "r1");
    assert_eq!(ctx.store.len("registrations"), 1);
}

#[actix_web::test]
async fn task_merge_resolution_joins_the_status_lattice() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let task = json!({
        "task_id": "t1", "title": "Fix pump", "created_by": "u1",
        "status": "in_progress", "priority": "normal",
        "due_date": "2024-04-01", "updated_at": "2024-03-01T10:00:00Z"
    });
    let (status, _) = post_json!(&app, "/api/sync/task", task);
    assert_eq!(status, StatusCode::OK);

    let resolve = json!({
        "strategy": "merge",
        "clientData": {
            "task_id": "t1", "title": "Fix pump", "status": "completed",
            "updated_at": "2024-02-01T10:00:00Z"
        }
    });
    let (status, body) = post_json!(&app, "/api/sync/task/resolve-conflict", resolve);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "resolved");
    assert_eq!(body["resolution_strategy"], "merge");
    assert_eq!(body["resolvedData"]["status"], "completed");
    assert_eq!(body["isNewTask"], false);
}

#[actix_web::test]
async fn supply_sum_resolution_adds_quantities() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let supply = json!({
        "supply_id": "s1", "user_id": "u1", "item_name": "Gauze",
        "quantity": 5, "expiry_date": "2025-01-01", "location_id": "loc-1",
        "status": "active", "timestamp": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:00:00Z"
    });
    let (status, _) = post_json!(&app, "/api/sync/supply", supply);
    assert_eq!(status, StatusCode::OK);

    let resolve = json!({
        "strategy": "sum_quantities",
        "clientData": { "supply_id": "s1", "quantity": 3 }
    });
    let (status, body) = post_json!(&app, "/api/sync/supply/resolve-conflict", resolve);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resolvedData"]["quantity"], 8);
    assert!(body["allowed_strategies"]
        .as_array()
        .expect("strategies")
        .contains(&json!("average_quantities")));
}

#[actix_web::test]
async fn unknown_entity_kind_is_not_found() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let (status, _) = post_json!(&app, "/api/sync/widget", json!({"widget_id": "w1"}));
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn invalid_payload_is_a_bad_request_with_field_details() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let (status, body) = post_json!(
        &app,
        "/api/sync/registration",
        json!({
            "registration_id": "r1", "user_id": "u1", "person_name": "Ram",
            "age": 151, "gender": "male", "location_id": "loc-1",
            "status": "pending", "timestamp": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        })
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
    assert_eq!(body["details"]["field"], "age");
}

#[actix_web::test]
async fn unknown_strategy_is_a_bad_request() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let (status, body) = post_json!(
        &app,
        "/api/sync/task/resolve-conflict",
        json!({"strategy": "make_it_so", "clientData": {"task_id": "t1"}})
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}

#[actix_web::test]
async fn responses_carry_a_trace_header_when_wrapped() {
    use backend::Trace;
    let ctx = test_context();
    let app = test::init_service(
        App::new()
            .app_data(ctx.state.clone())
            .wrap(Trace)
            .configure(configure_api),
    )
    .await;
    let res = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/down-sync/user").to_request(),
    )
    .await;
    assert!(res.headers().contains_key("trace-id"));
}
