//! Outgoing response type and the [`IntoResponse`] conversion trait.
//!
//! A [`Response`] is runtime-agnostic: a status, a JSON body and a header
//! list. Runtime adapters serialize it into their own representation.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, response_from_error};

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing response.
///
/// # Shortcuts (200 OK)
///
/// ```rust
/// use hookwork::Response;
/// use serde_json::json;
///
/// Response::json(json!({ "message": "pong" }));
/// Response::text("pong");
/// Response::status(http::StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use hookwork::Response;
/// use serde_json::json;
///
/// Response::builder()
///     .status(http::StatusCode::CREATED)
///     .header("location", "/v1/timeout/42")
///     .json(json!({ "id": 42 }));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub(crate) status: u16,
    pub(crate) body: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) headers: Vec<(String, String)>,
}

impl Response {
    /// `200 OK` with a JSON body.
    pub fn json(body: Value) -> Self {
        Self { status: 200, body, headers: Vec::new() }
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: impl Into<u16>) -> Self {
        Self { status: code.into(), body: Value::Null, headers: Vec::new() }
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: 200 }
    }

    pub fn status_code(&self) -> u16 { self.status }
    pub fn body(&self) -> &Value { &self.body }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn into_body(self) -> Value { self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the response with `code` as its status.
    pub fn with_status(mut self, code: impl Into<u16>) -> Self {
        self.status = code.into();
        self
    }

    /// Returns the response with one more header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Serializes into the `http` crate's representation.
    ///
    /// Strings are sent raw when a content type was set explicitly; every
    /// other body is JSON-encoded. A status outside `100..=999` becomes 500.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let explicit_type = self.header("content-type").is_some();

        let (body, content_type) = match self.body {
            Value::Null => (Bytes::new(), None),
            Value::String(text) if explicit_type => (Bytes::from(text), None),
            other => (
                Bytes::from(serde_json::to_vec(&other).unwrap_or_default()),
                (!explicit_type).then_some("application/json"),
            ),
        };

        let mut builder = http::Response::builder().status(status);
        if let Some(content_type) = content_type {
            builder = builder.header(http::header::CONTENT_TYPE, content_type);
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder.body(Full::new(body)).unwrap_or_else(|_| {
            let mut fallback = http::Response::new(Full::new(Bytes::new()));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

/// `200 OK`, empty JSON object body, no headers.
impl Default for Response {
    fn default() -> Self {
        Self::json(Value::Object(Map::new()))
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to 200.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: u16,
}

impl ResponseBuilder {
    pub fn status(mut self, code: impl Into<u16>) -> Self {
        self.status = code.into();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body.
    pub fn json(self, body: Value) -> Response {
        Response { status: self.status, body, headers: self.headers }
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        let mut headers = vec![("content-type".to_owned(), "text/plain; charset=utf-8".to_owned())];
        headers.extend(self.headers);
        Response { status: self.status, body: Value::String(body.into()), headers }
    }

    /// Terminate with no body (e.g. 204, 301).
    pub fn no_body(self) -> Response {
        Response { status: self.status, body: Value::Null, headers: self.headers }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion of a handler's successful result into a [`Response`].
///
/// A `Response` converts to itself; anything else becomes the body of a
/// `200 OK`.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for Value {
    fn into_response(self) -> Response { Response::json(self) }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// A handler with nothing to say answers with the default response.
impl IntoResponse for () {
    fn into_response(self) -> Response { Response::default() }
}

/// Return a status directly: `Ok(StatusCode::NO_CONTENT)`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

/// Serializes any `T: Serialize` into a JSON body.
///
/// ```rust
/// use hookwork::{Error, Json, Props};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Pong { message: &'static str }
///
/// async fn ping(_props: Props) -> Result<Json<Pong>, Error> {
///     Ok(Json(Pong { message: "pong" }))
/// }
/// ```
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_value(&self.0) {
            Ok(body) => Response::json(body),
            Err(e) => response_from_error(Error::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::json;

    #[test]
    fn values_wrap_into_ok_responses() {
        let response = json!({ "message": "success" }).into_response();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.body(), &json!({ "message": "success" }));
    }

    #[test]
    fn responses_convert_to_themselves() {
        let response = Response::builder().status(201u16).json(json!({ "id": 1 }));
        assert_eq!(response.clone().into_response(), response);
    }

    #[test]
    fn unit_is_the_default_response() {
        assert_eq!(().into_response(), Response::default());
        assert_eq!(Response::default().body(), &json!({}));
    }

    #[tokio::test]
    async fn json_bodies_get_a_content_type() {
        let http = Response::json(json!({ "ok": true })).into_http();
        assert_eq!(http.headers()["content-type"], "application/json");
        let bytes = http.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn text_bodies_are_sent_raw() {
        let http = Response::text("pong").into_http();
        assert_eq!(http.headers()["content-type"], "text/plain; charset=utf-8");
        let bytes = http.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"pong");
    }

    #[test]
    fn out_of_range_status_degrades_to_500() {
        let http = Response::status(42u16).into_http();
        assert_eq!(http.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
