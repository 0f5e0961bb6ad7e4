//! Return-value normalization.
//!
//! Turns whatever a handler entry point returned into a status, headers and
//! a body:
//! - `()` → 204 with no body
//! - string → text body, blob → binary body
//! - `reply(body, status[, headers])` → explicit status and headers
//! - anything else (maps, arrays, numbers, bools) → JSON, status 200

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use rhai::{Blob, Dynamic};

use crate::runtime::engine::Reply;

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Body of a normalized handler response.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Empty,
    Json(serde_json::Value),
    Text(String),
    Binary(Vec<u8>),
}

/// A handler response ready to be written to the client.
#[derive(Debug, Clone)]
pub struct HandlerReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ReplyBody,
}

impl HandlerReply {
    /// Empty 204 response (pre-flight requests, unit returns).
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: ReplyBody::Empty,
        }
    }

    /// Normalize a handler return value.
    pub fn from_dynamic(value: Dynamic) -> Result<Self, String> {
        if value.is_unit() {
            return Ok(Self::no_content());
        }
        if value.is::<Reply>() {
            let reply = value.cast::<Reply>();
            return Self::from_explicit(reply);
        }
        Ok(Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: normalize_body(value)?,
        })
    }

    fn from_explicit(reply: Reply) -> Result<Self, String> {
        let status = u16::try_from(reply.status)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .filter(|s| (100..=599).contains(&s.as_u16()))
            .ok_or_else(|| format!("invalid status code {}", reply.status))?;

        let mut headers = HeaderMap::new();
        for (name, value) in reply.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("invalid header name '{}'", name))?;
            let value = HeaderValue::from_str(&value.to_string())
                .map_err(|_| format!("invalid value for header '{}'", name))?;
            headers.insert(name, value);
        }

        let body = if reply.body.is_unit() {
            ReplyBody::Empty
        } else {
            normalize_body(reply.body)?
        };

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Content type implied by the body, unless the handler set one.
    pub fn content_type(&self) -> Option<HeaderValue> {
        if let Some(explicit) = self.headers.get(header::CONTENT_TYPE) {
            return Some(explicit.clone());
        }
        match self.body {
            ReplyBody::Empty => None,
            ReplyBody::Json(_) => Some(HeaderValue::from_static("application/json")),
            ReplyBody::Text(_) => Some(HeaderValue::from_static(TEXT_CONTENT_TYPE)),
            ReplyBody::Binary(_) => Some(HeaderValue::from_static(BINARY_CONTENT_TYPE)),
        }
    }
}

fn normalize_body(value: Dynamic) -> Result<ReplyBody, String> {
    if value.is_string() {
        let text = value.into_string().map_err(|t| format!("expected string, got {}", t))?;
        return Ok(ReplyBody::Text(text));
    }
    if value.is::<Blob>() {
        return Ok(ReplyBody::Binary(value.cast::<Blob>()));
    }
    let type_name = value.type_name();
    rhai::serde::from_dynamic::<serde_json::Value>(&value)
        .map(ReplyBody::Json)
        .map_err(|e| format!("cannot serialize {} return value: {}", type_name, e))
}
