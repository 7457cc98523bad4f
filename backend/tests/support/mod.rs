//! Shared helpers for the HTTP integration suites.
#![allow(dead_code)]

use std::sync::Arc;

use actix_web::web;
use chrono::Duration;

use backend::inbound::http::state::HttpState;
use backend::outbound::memory::{MemoryAuthStore, MemoryDocStore, RecordingMailer};
use backend::server::build_http_state;

pub const JWT_SECRET: &str = "integration-test-secret";

/// The service bundle plus direct handles on the in-memory adapters so
/// tests can seed and inspect state behind the API.
pub struct TestContext {
    pub store: Arc<MemoryDocStore>,
    pub auth: Arc<MemoryAuthStore>,
    pub mailer: Arc<RecordingMailer>,
    pub state: web::Data<HttpState>,
}

pub fn test_context() -> TestContext {
    let store = Arc::new(MemoryDocStore::new());
    let auth = Arc::new(MemoryAuthStore::with_cost(4));
    let mailer = Arc::new(RecordingMailer::new());
    let state = web::Data::new(build_http_state(
        store.clone(),
        auth.clone(),
        mailer.clone(),
        JWT_SECRET,
        Duration::minutes(10),
    ));
    TestContext {
        store,
        auth,
        mailer,
        state,
    }
}
