//! Rejection responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::ratelimit::WindowStatus;

/// Build the response sent instead of forwarding a rejected request.
///
/// `429 Too Many Requests` with a plain-text body and a `Retry-After`
/// header counting the seconds until the client's window resets.
pub fn too_many_requests(message: &str, status: &WindowStatus) -> Response {
    let retry_after = status.reset_after_secs.max(1);

    let mut response = (StatusCode::TOO_MANY_REQUESTS, message.to_owned()).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}
