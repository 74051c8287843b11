// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Middleware pipeline, health route, and router construction.
//!
//! This module is `pub` so that integration tests can build a test router directly
//! without starting the full binary.

use crate::models::health::HealthResponse;
use crate::routes::ModuleRoutes;
use crate::services::body_parser::{parse_form_body, parse_json_body, BodyParserConfig};
use axum::{middleware, routing::get, Json, Router};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Application version extracted from `Cargo.toml` at compile time.
/// The patch segment can be overridden via `API_SERVER_PATCH_VERSION` (see `build.rs`).
pub const VERSION: &str = env!("API_SERVER_VERSION");

/// Prefix every module route is mounted under.
pub const API_PREFIX: &str = "/api/v1";

/// GET / - Liveness check.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Build the Axum application router.
///
/// Every request passes, in order, through: request id and tracing, the JSON
/// body parser, the urlencoded form parser, permissive CORS, and the cookie
/// manager. Module routes are nested under [`API_PREFIX`].
pub fn create_router(modules: ModuleRoutes, body_config: BodyParserConfig) -> Router {
    let pipeline = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(middleware::from_fn_with_state(body_config, parse_json_body))
        .layer(middleware::from_fn_with_state(body_config, parse_form_body))
        .layer(CorsLayer::permissive())
        .layer(CookieManagerLayer::new());

    Router::new()
        .route("/", get(health_handler))
        .nest(API_PREFIX, modules.into_router())
        .layer(pipeline)
}
