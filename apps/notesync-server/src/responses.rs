use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::error;

pub const PROBLEM_JSON: &str = "application/problem+json";

pub fn problem(status: StatusCode, title: &str, detail: impl Into<String>) -> Response {
    let mut res = (
        status,
        Json(json!({
            "type": "about:blank",
            "title": title,
            "status": status.as_u16(),
            "detail": detail.into(),
        })),
    )
        .into_response();
    res.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
    res
}

/// Fatal failures never leak as validation codes; the detail stays in the log.
pub fn internal_error(context: &str, err: anyhow::Error) -> Response {
    error!(error = ?err, "{context} failed");
    problem(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error",
        format!("{context} failed"),
    )
}

/// Validation payload rendered as plain JSON.
pub fn payload(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}
