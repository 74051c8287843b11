// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Request body parsing middleware for Axum.
//!
//! Provides two middleware functions and the extractor that reads their output:
//! - `parse_json_body`: parses `application/json` bodies (object or array only)
//! - `parse_form_body`: parses `application/x-www-form-urlencoded` bodies
//! - `ParsedBody`: the parsed body, or an empty object when no parser matched
//!
//! Both parsers re-attach the raw bytes, so handlers can still consume the body.
//!
//! JSON accepts the `utf-8` and `utf-16` charsets (`utf-16` honours a byte order
//! mark and defaults to little endian). Form bodies accept `utf-8` only.

use crate::config::DEFAULT_BODY_LIMIT_BYTES;
use crate::models::response::MessageResponse;
use crate::services::urlencoded::{self, FormError};
use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use std::convert::Infallible;

pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// Settings shared by both body parsers.
#[derive(Debug, Clone, Copy)]
pub struct BodyParserConfig {
    /// Maximum body size in bytes.
    pub limit: usize,
}

impl Default for BodyParserConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

/// Body parsing failures. Each maps to a 4xx response.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("request body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
    #[error("unsupported charset \"{0}\"")]
    UnsupportedCharset(String),
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),
    #[error("JSON body must be an object or an array")]
    NotObjectOrArray,
    #[error("invalid form body: {0}")]
    InvalidForm(String),
    #[error("too many parameters")]
    TooManyParameters,
    #[error("failed to read request body: {0}")]
    Read(String),
}

impl BodyError {
    pub fn status(&self) -> StatusCode {
        match self {
            BodyError::TooLarge { .. } | BodyError::TooManyParameters => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            BodyError::UnsupportedCharset(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BodyError::InvalidJson(_)
            | BodyError::NotObjectOrArray
            | BodyError::InvalidForm(_)
            | BodyError::Read(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<FormError> for BodyError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::TooManyParameters => BodyError::TooManyParameters,
            FormError::InvalidUtf8(_) => BodyError::InvalidForm(err.to_string()),
        }
    }
}

impl IntoResponse for BodyError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "Rejected request body");
        (self.status(), Json(MessageResponse::error(self.to_string()))).into_response()
    }
}

/// Parsed request body, available to any handler behind the parsers.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

impl ParsedBody {
    pub fn empty() -> Self {
        ParsedBody(Value::Object(Map::new()))
    }

    /// Look up a top-level field of an object body.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ParsedBody {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ParsedBody>()
            .cloned()
            .unwrap_or_else(ParsedBody::empty))
    }
}

/// Middleware: parse `application/json` request bodies into `ParsedBody`.
pub async fn parse_json_body(
    State(config): State<BodyParserConfig>,
    request: Request,
    next: Next,
) -> Result<Response, BodyError> {
    let Some(charset) = media_type_charset(request.headers(), JSON_MEDIA_TYPE) else {
        return Ok(next.run(request).await);
    };
    let encoding = JsonEncoding::from_charset(&charset)?;

    let (mut parts, bytes) = read_limited(request, config.limit).await?;
    parts.extensions.insert(ParsedBody(parse_json(&bytes, encoding)?));
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Middleware: parse `application/x-www-form-urlencoded` request bodies into `ParsedBody`.
pub async fn parse_form_body(
    State(config): State<BodyParserConfig>,
    request: Request,
    next: Next,
) -> Result<Response, BodyError> {
    let Some(charset) = media_type_charset(request.headers(), FORM_MEDIA_TYPE) else {
        return Ok(next.run(request).await);
    };
    if charset != "utf-8" {
        return Err(BodyError::UnsupportedCharset(charset));
    }

    let (mut parts, bytes) = read_limited(request, config.limit).await?;
    parts.extensions.insert(ParsedBody(parse_form(&bytes)?));
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Match the request media type against `expected`, ignoring case and parameters.
///
/// Returns the lowercased charset (`utf-8` when absent), or `None` when the
/// media type differs.
fn media_type_charset(headers: &HeaderMap, expected: &str) -> Option<String> {
    let raw = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())?;

    let mut segments = raw.split(';');
    let essence = segments.next().unwrap_or_default().trim();
    if !essence.eq_ignore_ascii_case(expected) {
        return None;
    }

    let charset = segments
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
        .unwrap_or_else(|| "utf-8".to_string());
    Some(charset)
}

/// Text encodings accepted for JSON bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    /// Byte order taken from the BOM, little endian without one.
    Utf16,
}

impl JsonEncoding {
    fn from_charset(charset: &str) -> Result<Self, BodyError> {
        match charset {
            "utf-8" => Ok(JsonEncoding::Utf8),
            "utf-16le" => Ok(JsonEncoding::Utf16Le),
            "utf-16be" => Ok(JsonEncoding::Utf16Be),
            "utf-16" => Ok(JsonEncoding::Utf16),
            other => Err(BodyError::UnsupportedCharset(other.to_string())),
        }
    }

    /// Decode `bytes` to text, dropping a leading byte order mark.
    fn decode(self, bytes: &[u8]) -> Result<String, BodyError> {
        let text = match self {
            JsonEncoding::Utf8 => std::str::from_utf8(bytes)
                .map_err(|e| BodyError::InvalidJson(e.to_string()))?
                .to_string(),
            JsonEncoding::Utf16Le => decode_utf16(bytes, u16::from_le_bytes)?,
            JsonEncoding::Utf16Be => decode_utf16(bytes, u16::from_be_bytes)?,
            JsonEncoding::Utf16 => match bytes {
                [0xfe, 0xff, rest @ ..] => decode_utf16(rest, u16::from_be_bytes)?,
                [0xff, 0xfe, rest @ ..] => decode_utf16(rest, u16::from_le_bytes)?,
                _ => decode_utf16(bytes, u16::from_le_bytes)?,
            },
        };
        Ok(match text.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_string(),
            None => text,
        })
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, BodyError> {
    if bytes.len() % 2 != 0 {
        return Err(BodyError::InvalidJson(
            "truncated UTF-16 code unit".to_string(),
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| BodyError::InvalidJson(e.to_string()))
}

/// Buffer the request body up to `limit` bytes.
async fn read_limited(request: Request, limit: usize) -> Result<(Parts, Bytes), BodyError> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(BodyError::TooLarge { limit });
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
        let inner = e.into_inner();
        if inner.downcast_ref::<LengthLimitError>().is_some() {
            BodyError::TooLarge { limit }
        } else {
            BodyError::Read(inner.to_string())
        }
    })?;
    Ok((parts, bytes))
}

/// Strict JSON: only objects and arrays are accepted at the top level.
/// An empty body parses as an empty object.
fn parse_json(bytes: &[u8], encoding: JsonEncoding) -> Result<Value, BodyError> {
    if bytes.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let text = encoding.decode(bytes)?;
    let value: Value =
        serde_json::from_str(&text).map_err(|e| BodyError::InvalidJson(e.to_string()))?;
    match value {
        Value::Object(_) | Value::Array(_) => Ok(value),
        _ => Err(BodyError::NotObjectOrArray),
    }
}

/// Decode a urlencoded body, with bracket keys building nested values.
fn parse_form(bytes: &[u8]) -> Result<Value, BodyError> {
    Ok(urlencoded::decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::post, Router};
    use serde_json::json;
    use tower::ServiceExt;

    async fn echo_handler(ParsedBody(parsed): ParsedBody, raw: Bytes) -> Json<Value> {
        Json(json!({ "parsed": parsed, "raw_len": raw.len() }))
    }

    fn create_test_router(limit: usize) -> Router {
        let config = BodyParserConfig { limit };
        Router::new()
            .route("/echo", post(echo_handler))
            .layer(middleware::from_fn_with_state(config, parse_form_body))
            .layer(middleware::from_fn_with_state(config, parse_json_body))
    }

    async fn send(
        router: Router,
        content_type: Option<&str>,
        body: impl Into<Body>,
    ) -> (StatusCode, Value) {
        let mut builder = axum::http::Request::builder().method("POST").uri("/echo");
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        let response = router
            .oneshot(builder.body(body.into()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_json_body_is_parsed_and_still_readable() {
        let (status, body) = send(
            create_test_router(1024),
            Some("application/json"),
            r#"{"x":1}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parsed"], json!({ "x": 1 }));
        assert_eq!(body["raw_len"], 7);
    }

    #[tokio::test]
    async fn test_json_media_type_match_ignores_case_and_params() {
        let (status, body) = send(
            create_test_router(1024),
            Some("Application/JSON; charset=UTF-8"),
            "[1,2]",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parsed"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let (status, body) = send(
            create_test_router(1024),
            Some("application/json"),
            r#"{"x":"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("invalid JSON body"));
    }

    #[tokio::test]
    async fn test_scalar_json_is_rejected() {
        let (status, _) = send(create_test_router(1024), Some("application/json"), "42").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_json_body_parses_as_empty_object() {
        let (status, body) = send(create_test_router(1024), Some("application/json"), "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parsed"], json!({}));
    }

    #[tokio::test]
    async fn test_unsupported_charset_is_rejected() {
        let (status, _) = send(
            create_test_router(1024),
            Some("application/json; charset=latin1"),
            "{}",
        )
        .await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_utf16_json_is_parsed() {
        let utf16le: Vec<u8> = r#"{"name":"Zoë"}"#
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        let (status, body) = send(
            create_test_router(1024),
            Some("application/json; charset=utf-16le"),
            utf16le,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parsed"], json!({ "name": "Zoë" }));

        let mut utf16_bom = vec![0xfe, 0xff];
        utf16_bom.extend("[1,2]".encode_utf16().flat_map(u16::to_be_bytes));
        let (status, body) = send(
            create_test_router(1024),
            Some("application/json; charset=UTF-16"),
            utf16_bom,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parsed"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_truncated_utf16_json_is_rejected() {
        let (status, _) = send(
            create_test_router(1024),
            Some("application/json; charset=utf-16be"),
            vec![0x00, 0x7b, 0x00],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsupported_utf_charset_is_rejected() {
        let (status, body) = send(
            create_test_router(1024),
            Some("application/json; charset=utf-32"),
            "{}",
        )
        .await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["message"], "unsupported charset \"utf-32\"");
    }

    #[tokio::test]
    async fn test_form_with_non_utf8_charset_is_rejected() {
        let (status, _) = send(
            create_test_router(1024),
            Some("application/x-www-form-urlencoded; charset=utf-16"),
            "a=1",
        )
        .await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let (status, body) = send(
            create_test_router(8),
            Some("application/json"),
            r#"{"field":"too long for the limit"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_oversized_declared_length_is_rejected() {
        let response = create_test_router(8)
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .header("content-length", "64")
                    .body(Body::from("a=1"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_form_body_is_parsed() {
        let (status, body) = send(
            create_test_router(1024),
            Some("application/x-www-form-urlencoded"),
            "name=Ada+Lovelace&tag=a&email=ada%40example.com&tag=b",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["parsed"],
            json!({
                "name": "Ada Lovelace",
                "email": "ada@example.com",
                "tag": ["a", "b"],
            })
        );
    }

    #[tokio::test]
    async fn test_nested_form_body_is_parsed() {
        let (status, body) = send(
            create_test_router(1024),
            Some("application/x-www-form-urlencoded"),
            "user[name]=ada&user[email]=a%40b.c&a[]=1&a[]=2",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["parsed"],
            json!({
                "user": { "name": "ada", "email": "a@b.c" },
                "a": ["1", "2"],
            })
        );
    }

    #[tokio::test]
    async fn test_form_invalid_percent_escape_is_rejected() {
        let (status, body) = send(
            create_test_router(1024),
            Some("application/x-www-form-urlencoded"),
            "x=%FF",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("invalid form body"));
    }

    #[tokio::test]
    async fn test_other_media_types_pass_through() {
        let (status, body) = send(create_test_router(4), Some("text/plain"), "not parsed").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parsed"], json!({}));
        assert_eq!(body["raw_len"], 10);
    }

    #[tokio::test]
    async fn test_missing_content_type_passes_through() {
        let (status, body) = send(create_test_router(1024), None, "{\"x\":1}").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parsed"], json!({}));
    }

    #[test]
    fn test_parse_form_triple_repeat() {
        let value = parse_form(b"k=1&k=2&k=3").unwrap();
        assert_eq!(value, json!({ "k": ["1", "2", "3"] }));
    }

    #[test]
    fn test_parse_form_rejects_invalid_utf8() {
        assert!(matches!(
            parse_form(&[0x61, 0x3d, 0xff]),
            Err(BodyError::InvalidForm(_))
        ));
    }

    #[test]
    fn test_body_error_status_codes() {
        assert_eq!(
            BodyError::TooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            BodyError::UnsupportedCharset("latin1".to_string()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            BodyError::NotObjectOrArray.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BodyError::TooManyParameters.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
