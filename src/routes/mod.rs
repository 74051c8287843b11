// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! API route table.
//!
//! Module routers are mounted, in insertion order, under their path prefix.
//! Axum strips the prefix before a request reaches the module router, so
//! `/auth/login` arrives at the auth router as `/login`, and both `/auth` and
//! `/auth/` arrive as `/`.

pub mod user;

pub use user::user_routes;

use axum::{
    extract::Request,
    http::{uri::PathAndQuery, Uri},
    routing::any,
    Router,
};
use tower::ServiceExt;

/// Route table construction errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("route prefix must start with '/': {0:?}")]
    MissingLeadingSlash(String),
    #[error("route prefix must not be the root path")]
    RootPrefix,
    #[error("route prefix must not contain a wildcard: {0}")]
    WildcardPrefix(String),
    #[error("route prefix already mounted: {0}")]
    DuplicatePrefix(String),
}

/// A module router and the path prefix it is mounted under.
#[derive(Debug)]
pub struct RouteEntry {
    pub path: String,
    pub router: Router,
}

/// Ordered table of module routes. Built once at startup.
#[derive(Debug, Default)]
pub struct ModuleRoutes {
    entries: Vec<RouteEntry>,
}

impl ModuleRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module router under `path`.
    ///
    /// Trailing slashes are ignored, so `/auth/` and `/auth` name the same
    /// prefix.
    pub fn mount(mut self, path: &str, router: Router) -> Result<Self, RouteTableError> {
        if !path.starts_with('/') {
            return Err(RouteTableError::MissingLeadingSlash(path.to_string()));
        }
        let path = path.trim_end_matches('/');
        if path.is_empty() {
            return Err(RouteTableError::RootPrefix);
        }
        if path.contains('*') {
            return Err(RouteTableError::WildcardPrefix(path.to_string()));
        }
        if self.entries.iter().any(|entry| entry.path == path) {
            return Err(RouteTableError::DuplicatePrefix(path.to_string()));
        }

        self.entries.push(RouteEntry {
            path: path.to_string(),
            router,
        });
        Ok(self)
    }

    /// Mounted prefixes in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compose every entry into a single router.
    pub fn into_router(self) -> Router {
        self.entries
            .into_iter()
            .fold(Router::new(), |router, entry| {
                tracing::debug!(prefix = %entry.path, "Mounting module routes");
                // `nest` only matches the bare prefix; `{prefix}/` needs its own route.
                let module = entry.router.clone();
                router
                    .route(
                        &format!("{}/", entry.path),
                        any(move |request: Request| {
                            let module = module.clone();
                            async move { module.oneshot(rewrite_to_root(request)).await }
                        }),
                    )
                    .nest(&entry.path, entry.router)
            })
    }
}

/// Point `request` at `/`, keeping its query string.
fn rewrite_to_root(mut request: Request) -> Request {
    let path_and_query = match request.uri().query() {
        Some(query) => format!("/?{query}"),
        None => "/".to_string(),
    };
    let mut parts = request.uri().clone().into_parts();
    if let Ok(root) = PathAndQuery::try_from(path_and_query) {
        parts.path_and_query = Some(root);
    }
    if let Ok(uri) = Uri::from_parts(parts) {
        *request.uri_mut() = uri;
    }
    request
}

/// Build the API route table.
pub fn module_routes(user_router: Router) -> Result<ModuleRoutes, RouteTableError> {
    ModuleRoutes::new().mount("/auth", user_router)
}
