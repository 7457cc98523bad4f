//! Server construction and middleware wiring.

mod config;

pub use config::ServerConfig;

use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use chrono::Duration;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
use crate::domain::auth::{AuthService, TokenKit};
use crate::domain::ports::{AuthStore, DocStore, Mailer};
use crate::domain::sync::SyncEngine;
use crate::inbound::http::auth::{
    forgot_password, login, register, reset_password, test_protected, verify_otp,
};
use crate::inbound::http::down_sync::down_sync_entity;
use crate::inbound::http::health::{live, ready, HealthState};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::sync::{resolve_entity, sync_entity};
use crate::middleware::Trace;
use crate::outbound::memory::{MemoryAuthStore, MemoryDocStore, RecordingMailer};

/// Wire the domain services over explicit port implementations.
pub fn build_http_state(
    store: Arc<dyn DocStore>,
    auth_store: Arc<dyn AuthStore>,
    mailer: Arc<dyn Mailer>,
    jwt_secret: &str,
    otp_ttl: Duration,
) -> HttpState {
    let tokens = TokenKit::new(jwt_secret);
    let sync = Arc::new(SyncEngine::new(store.clone(), auth_store.clone()));
    let auth = Arc::new(AuthService::new(
        auth_store,
        store,
        mailer,
        tokens.clone(),
        otp_ttl,
    ));
    HttpState::new(sync, auth, tokens)
}

/// Wire the domain services over the in-memory reference adapters.
pub fn build_default_state(config: &ServerConfig) -> HttpState {
    build_http_state(
        Arc::new(MemoryDocStore::new()),
        Arc::new(MemoryAuthStore::new()),
        Arc::new(RecordingMailer::new()),
        &config.jwt_secret,
        config.otp_ttl,
    )
}

/// Register every `/api` endpoint on a service config.
///
/// Shared between the real server and integration tests so both exercise
/// the same route table.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(register)
            .service(login)
            .service(forgot_password)
            .service(verify_otp)
            .service(reset_password)
            .service(test_protected)
            .service(sync_entity)
            .service(resolve_entity)
            .service(down_sync_entity),
    );
}

/// Construct an Actix HTTP server using the provided health state and
/// configuration.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let http_state = web::Data::new(build_default_state(&config));
    let server_health_state = health_state.clone();

    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(server_health_state.clone())
            .app_data(http_state.clone())
            .wrap(Trace)
            .configure(configure_api)
            .service(ready)
            .service(live);

        #[cfg(debug_assertions)]
        let app = app
            .service(SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()));

        app
    })
    .bind(config.bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}
