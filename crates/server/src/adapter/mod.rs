//! Connection adapter (C8): translates the paired GET-subscribe/PUT-push HTTP surface into
//! coordinator and CRDT-registry calls. The only component that produces the wire messages.

pub mod crdt;
pub mod ot;

use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use futures::Stream;

/// Build the long-lived subscription response: status 209, `Content-Type: application/json`,
/// a newline-delimited stream of message frames. Matches how this codebase already answers
/// page/document subscriptions rather than a raw socket upgrade.
pub fn subscription_response<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
{
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::from_u16(209).expect("209 is a valid status code");
    response.headers_mut().insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn frame<T: serde::Serialize>(value: &T) -> Bytes {
    let mut line = serde_json::to_vec(value).unwrap_or_default();
    line.push(b'\n');
    Bytes::from(line)
}
