use crate::errors::RelayError;
use crate::payload::RawSelection;
use hyper::body::Bytes;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, HeaderMap, HeaderValue,
};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

pub const DELIVERED_MESSAGE: &str = "City route data sent to n8n successfully";

const TEST_PAGE: &str = include_str!("test_page.html");

#[derive(Serialize)]
struct DeliveredBody<'a> {
    success: bool,
    message: &'static str,
    n8n_response: &'a Value,
    timestamp: &'a str,
    route_id: &'a str,
}

#[derive(Serialize)]
struct FailureBody<'a> {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    n8n_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    received_data: Option<&'a RawSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<&'a str>,
}

/// Headers every response carries, errors included.
pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

/// CORS preflight answer: 200 with an empty body.
pub fn preflight() -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    apply_cors(response.headers_mut());
    response
}

/// The manual test page served to browsers.
pub fn test_page() -> Response<Bytes> {
    let mut response = Response::new(Bytes::from_static(TEST_PAGE.as_bytes()));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    apply_cors(response.headers_mut());
    response
}

pub fn delivered(n8n_response: &Value, timestamp: &str, route_id: &str) -> Response<Bytes> {
    json_response(
        StatusCode::OK,
        &DeliveredBody {
            success: true,
            message: DELIVERED_MESSAGE,
            n8n_response,
            timestamp,
            route_id,
        },
    )
}

/// Shapes a failed request. `received` echoes the caller's payload back
/// together with the time it was handled, when the payload was valid.
pub fn failure(error: &RelayError, received: Option<(&RawSelection, &str)>) -> Response<Bytes> {
    let n8n_error = match error {
        RelayError::Delivery(failure) => Some(failure.to_string()),
        _ => None,
    };

    json_response(
        error.status_code(),
        &FailureBody {
            success: false,
            error: error.to_string(),
            n8n_error,
            received_data: received.map(|(data, _)| data),
            timestamp: received.map(|(_, timestamp)| timestamp),
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Bytes> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, Bytes::from(bytes)),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response body");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"success":false,"error":"Internal error"}"#),
            )
        }
    };

    let mut response = Response::new(bytes);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    apply_cors(response.headers_mut());
    response
}
