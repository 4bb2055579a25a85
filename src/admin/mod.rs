//! Admin status API.
//!
//! Read-only view over the status table and the health check registry.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::health::HealthCheck;
use crate::runtime::Services;

use self::auth::admin_auth_middleware;
use self::handlers::{get_backends, get_status};

#[derive(Clone)]
pub struct AdminState {
    pub health: HealthCheck,
    pub services: Arc<Services>,
    /// Bearer token; empty disables authentication.
    pub api_key: Arc<str>,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/api/health/status", get(get_status))
        .route("/api/health/backends", get(get_backends))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
