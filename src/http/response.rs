use hyper::{StatusCode, header};

use super::{ByteBody, Response};


pub(crate) fn json(status: StatusCode, body: Vec<u8>) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(ByteBody::from(body))
        .unwrap()
}

pub(crate) fn html(body: String) -> Response {
    Response::builder()
        .header(header::CONTENT_TYPE, "text/html; charset=UTF-8")
        .body(ByteBody::from(body))
        .unwrap()
}

fn plain(status: StatusCode, body: impl Into<ByteBody>) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=UTF-8")
        .body(body.into())
        .unwrap()
}

pub(crate) fn bad_request(msg: impl Into<String>) -> Response {
    plain(StatusCode::BAD_REQUEST, msg.into())
}

pub(crate) fn unauthorized() -> Response {
    let mut res = plain(StatusCode::UNAUTHORIZED, "401 Unauthorized: invalid access token");
    res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        header::HeaderValue::from_static(r#"Bearer error="invalid_token""#),
    );
    res
}

pub(crate) fn not_found() -> Response {
    plain(StatusCode::NOT_FOUND, "404 Not found")
}

pub(crate) fn method_not_allowed(allow: &'static str) -> Response {
    let mut res = plain(StatusCode::METHOD_NOT_ALLOWED, "405 Method not allowed");
    res.headers_mut().insert(header::ALLOW, header::HeaderValue::from_static(allow));
    res
}

pub(crate) fn payload_too_large() -> Response {
    plain(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload too large")
}

pub(crate) fn internal_server_error() -> Response {
    plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
