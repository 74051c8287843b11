// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Authentication routes.
//!
//! Every request under the mount point is relayed, prefix stripped, to the
//! external authentication service. Cookies, parsed bodies and the upstream
//! `Set-Cookie` headers pass through unchanged.

use crate::services::upstream::{UpstreamClient, UpstreamError};
use axum::{
    extract::{OriginalUri, Request, State},
    response::Response,
    routing::any,
    Router,
};

/// Create the auth router. It matches every method and path below its mount point.
pub fn user_routes(client: UpstreamClient) -> Router {
    Router::new()
        .route("/", any(forward_handler))
        .route("/{*path}", any(forward_handler))
        .with_state(client)
}

/// ANY /auth/* - Relay to the authentication service.
async fn forward_handler(
    State(client): State<UpstreamClient>,
    OriginalUri(original_uri): OriginalUri,
    request: Request,
) -> Result<Response, UpstreamError> {
    let prefix = mounted_prefix(original_uri.path(), request.uri().path());
    client.forward(request, &prefix).await
}

/// Recover the mount prefix from the original path and the path seen after stripping.
pub fn mounted_prefix(original_path: &str, stripped_path: &str) -> String {
    if stripped_path == "/" {
        return original_path.trim_end_matches('/').to_string();
    }
    original_path
        .strip_suffix(stripped_path)
        .unwrap_or_default()
        .to_string()
}
