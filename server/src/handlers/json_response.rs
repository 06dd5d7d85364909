use std::convert::Infallible;

use anyhow::{Result, anyhow};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::{Response, StatusCode, header};
use serde::Serialize;
use tracing::{debug, error};

use shared::types::json_error::ErrorResponse;

pub type JsonResponse = Response<BoxBody<Bytes, Infallible>>;

/// Serialize any `Serialize` type and deliver it as a JSON response.
/// Handlers use this instead of one-off serialization + builder blocks.
pub fn json_response<T: Serialize>(data: &T, status: StatusCode) -> Result<JsonResponse> {
    let json = serde_json::to_string(data).map_err(|e| anyhow!("Failed to serialize: {}", e))?;

    debug!("Delivering JSON response, size: {} bytes", json.len());

    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(json)).boxed())
        .map_err(|e| anyhow!("Failed to build JSON response: {}", e))?;

    Ok(response)
}

/// Delivers a JSON error body with the given code, message, and status.
pub fn json_error(code: &str, message: &str, status: StatusCode) -> Result<JsonResponse> {
    error!(
        "Delivering error JSON: {} - {} ({})",
        status.as_u16(),
        code,
        message
    );

    let body = ErrorResponse::new(code, message).to_json();

    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)).boxed())
        .map_err(|e| anyhow!("Failed to build error JSON response: {}", e))?;

    Ok(response)
}

/// Last-resort 500 built infallibly, for when a handler itself errored.
pub fn internal_error() -> JsonResponse {
    let mut res = Response::new(
        Full::new(Bytes::from_static(
            br#"{"status":"error","code":"INTERNAL_ERROR","message":"An internal error occurred"}"#,
        ))
        .boxed(),
    );
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    res
}
