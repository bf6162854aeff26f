//! Error values raised inside a pipeline, and their normalization.
//!
//! Hooks and handlers fail by returning an [`Error`]. Nothing below the
//! [`Endpoint`](crate::Endpoint) turns an error into a response: the endpoint
//! does it exactly once, through [`response_from_error`].
//!
//! | Variant | Normalized response |
//! |---|---|
//! | [`Error::Response`] | the carried response, untouched |
//! | [`Error::Json`] | `status` of the error, body = the error's fields |
//! | [`Error::Unknown`] | `500`, body `{"message": "Unknown Error"}` |

use std::fmt;

use serde_json::{Map, Value, json};
use tracing::error;

use crate::response::Response;

/// Boxed error used for causes hookwork does not know anything about.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ── JsonError ─────────────────────────────────────────────────────────────────

/// A failure with a caller-facing status, message and machine-readable key.
///
/// This is the only sanctioned way for a hook deep in the chain to stop the
/// whole request with a specific status.
///
/// ```rust
/// use hookwork::{Error, JsonError};
///
/// let err: Error = JsonError::not_found("Timeout not found")
///     .key("cb.err.timeout.find.unfound")
///     .note("Timeout with the id 42 was not found in the database")
///     .into();
/// assert_eq!(err.status(), 404);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonError {
    pub status: u16,
    pub message: String,
    pub key: String,
    pub cause: Option<String>,
    pub info: Option<String>,
    pub note: Option<String>,
}

impl JsonError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            key: "hookwork.err.unknown".to_owned(),
            cause: None,
            info: None,
            note: None,
        }
    }

    /// `400`: arguments did not have the declared shape.
    pub fn validation(info: impl Into<String>) -> Self {
        Self::new(400, "Validation Failed")
            .key("hookwork.err.validation")
            .cause("VALIDATION_ERROR")
            .info(info)
    }

    /// `401`: credential missing or invalid.
    pub fn not_authenticated(info: impl Into<String>) -> Self {
        Self::new(401, "Not Authenticated")
            .key("hookwork.err.not-authenticated")
            .cause("NOT_AUTHENTICATED")
            .info(info)
    }

    /// `404`: a domain lookup came back empty.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
            .key("hookwork.err.not-found")
            .cause("NOT_FOUND")
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// The response body: every populated field, `status` included.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("status".to_owned(), json!(self.status));
        body.insert("message".to_owned(), json!(self.message));
        body.insert("key".to_owned(), json!(self.key));
        for (name, field) in [("cause", &self.cause), ("info", &self.info), ("note", &self.note)] {
            if let Some(text) = field {
                body.insert(name.to_owned(), json!(text));
            }
        }
        Value::Object(body)
    }
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.status, self.message, self.key)
    }
}

impl std::error::Error for JsonError {}

// ── Error ─────────────────────────────────────────────────────────────────────

/// Everything a hook or handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller-facing failure with its own status.
    #[error("{0}")]
    Json(JsonError),

    /// A complete response used to short-circuit the chain.
    #[error("short-circuit response with status {}", .0.status_code())]
    Response(Response),

    /// Anything else. Never shown to the caller.
    #[error("unknown error: {0}")]
    Unknown(#[source] BoxError),
}

impl Error {
    pub fn unknown(source: impl Into<BoxError>) -> Self {
        Self::Unknown(source.into())
    }

    /// The status this error normalizes to, without normalizing it.
    pub fn status(&self) -> u16 {
        match self {
            Self::Json(e) => e.status,
            Self::Response(r) => r.status_code(),
            Self::Unknown(_) => 500,
        }
    }
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Self {
        Self::Json(e)
    }
}

impl From<Response> for Error {
    fn from(r: Response) -> Self {
        Self::Response(r)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::unknown(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::unknown(e)
    }
}

// ── Normalization ─────────────────────────────────────────────────────────────

/// Converts any [`Error`] into a well-formed [`Response`].
///
/// Idempotent on responses: `response_from_error(Error::from(r)) == r`.
pub fn response_from_error(error: Error) -> Response {
    match error {
        Error::Response(response) => response,
        Error::Json(e) => Response::builder().status(e.status).json(e.to_body()),
        Error::Unknown(source) => {
            error!(error = %source, "unhandled error, responding with 500");
            Response::builder()
                .status(500u16)
                .json(json!({ "message": "Unknown Error" }))
        }
    }
}

/// Infrastructure failures of the bundled hyper adapter.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddr(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_passes_through_unchanged() {
        let response = Response::default();
        assert_eq!(response_from_error(Error::from(response.clone())), response);
    }

    #[test]
    fn unknown_errors_hide_their_message() {
        let err = Error::unknown(std::io::Error::other("BrokenPipe"));
        let response = response_from_error(err);
        assert_eq!(response.status_code(), 500);
        assert_eq!(response.body(), &json!({ "message": "Unknown Error" }));
    }

    #[test]
    fn json_error_keeps_its_status() {
        let err = JsonError::new(499, "Client went away").key("exo.err.test");
        let response = response_from_error(err.into());
        assert_eq!(response.status_code(), 499);
        assert_eq!(response.body()["status"], json!(499));
        assert_eq!(response.body()["key"], json!("exo.err.test"));
        assert!(response.body().get("format").is_none());
        assert!(response.body().get("note").is_none());
    }

    #[test]
    fn status_matches_normalized_status() {
        let errors = [
            Error::from(JsonError::not_authenticated("no key")),
            Error::from(Response::builder().status(302u16).no_body()),
            Error::unknown("boom"),
        ];
        for err in errors {
            let expected = err.status();
            assert_eq!(response_from_error(err).status_code(), expected);
        }
    }
}
