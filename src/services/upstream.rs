// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! HTTP client that relays requests to the external authentication service.

use crate::app::VERSION;
use crate::models::response::MessageResponse;
use crate::services::logging::redact_cookie_header;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use http_body_util::LengthLimitError;
use std::time::Duration;
use url::Url;

/// Header carrying the path prefix that was stripped before forwarding.
pub const FORWARDED_PREFIX_HEADER: &str = "x-forwarded-prefix";

/// Connection-scoped headers that must not be relayed (RFC 9110 section 7.6.1).
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },
    #[error("failed to read request body: {0}")]
    ReadBody(String),
    #[error("authentication service timed out")]
    Timeout,
    #[error("authentication service unavailable: {0}")]
    Unavailable(String),
}

impl UpstreamError {
    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UpstreamError::ReadBody(_) => StatusCode::BAD_REQUEST,
            UpstreamError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            UpstreamError::Unavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Unavailable(err.to_string())
        }
    }
}

impl IntoResponse for UpstreamError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "Auth service request failed");
        }
        (status, Json(MessageResponse::error(self.to_string()))).into_response()
    }
}

/// Client for the external authentication service.
///
/// Cheap to clone: the underlying `reqwest::Client` shares its connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    body_limit: usize,
}

impl UpstreamClient {
    pub fn new(base_url: Url, timeout: Duration, body_limit: usize) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("api-server/{VERSION}"))
            .build()
            .context("Failed to build HTTP client for the auth service")?;

        Ok(Self {
            http,
            base_url,
            body_limit,
        })
    }

    /// Join the service base URL with a request path and query.
    pub fn target_url(&self, path_and_query: &str) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            path_and_query
        )
    }

    /// Relay `request` to the auth service and return its response unchanged.
    ///
    /// `mount_prefix` is the path prefix stripped before the request reached here;
    /// it is passed along in `X-Forwarded-Prefix`.
    pub async fn forward(
        &self,
        request: Request,
        mount_prefix: &str,
    ) -> Result<Response, UpstreamError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = self.target_url(path_and_query);

        let limit = self.body_limit;
        let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
            let inner = e.into_inner();
            if inner.downcast_ref::<LengthLimitError>().is_some() {
                UpstreamError::BodyTooLarge { limit }
            } else {
                UpstreamError::ReadBody(inner.to_string())
            }
        })?;

        let mut headers = end_to_end_headers(&parts.headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        if let Ok(prefix) = HeaderValue::from_str(mount_prefix) {
            headers.insert(FORWARDED_PREFIX_HEADER, prefix);
        }

        let cookies = parts
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(redact_cookie_header)
            .unwrap_or_default();
        tracing::debug!(
            method = %parts.method,
            url = %url,
            cookies = %cookies,
            "Forwarding request to auth service"
        );

        let upstream = self
            .http
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let mut headers = end_to_end_headers(upstream.headers());
        headers.remove(header::CONTENT_LENGTH);
        let body = upstream.bytes().await?;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Copy `headers`, dropping hop-by-hop headers and any header named in `Connection`.
fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let connection_scoped: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .collect();

    let mut relayed = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name_str = name.as_str();
        if HOP_BY_HOP_HEADERS.contains(&name_str) || connection_scoped.iter().any(|c| c == name_str)
        {
            continue;
        }
        relayed.append(name.clone(), value.clone());
    }
    relayed
}
