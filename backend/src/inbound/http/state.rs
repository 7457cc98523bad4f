//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain services and remain testable without real
//! infrastructure behind the ports.

use std::sync::Arc;

use crate::domain::auth::{AuthService, TokenKit};
use crate::domain::sync::SyncEngine;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub sync: Arc<SyncEngine>,
    pub auth: Arc<AuthService>,
    pub tokens: TokenKit,
}

impl HttpState {
    /// Construct state from explicit service instances.
    pub fn new(sync: Arc<SyncEngine>, auth: Arc<AuthService>, tokens: TokenKit) -> Self {
        Self { sync, auth, tokens }
    }
}
