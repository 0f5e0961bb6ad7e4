//! Response rendering for normalized handler replies.

use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};

use serde::Serialize;

use crate::error::DispatchError;
use crate::runtime::{HandlerReply, ReplyBody};

impl IntoResponse for HandlerReply {
    fn into_response(self) -> Response {
        let content_type = self.content_type();

        let body = match self.body {
            ReplyBody::Empty => Body::empty(),
            ReplyBody::Json(value) => match json_body(&value) {
                Ok(body) => body,
                Err(e) => return e.into_response(),
            },
            ReplyBody::Text(text) => Body::from(text),
            ReplyBody::Binary(bytes) => Body::from(bytes),
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        if let Some(content_type) = content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

fn json_body<T: Serialize>(value: &T) -> Result<Body, DispatchError> {
    serde_json::to_vec(value).map(Body::from).map_err(|e| {
        DispatchError::HandlerRuntimeError(format!("reply is not serializable as JSON: {}", e))
    })
}
