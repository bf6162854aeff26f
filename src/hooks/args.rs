//! Hooks that populate `args`: path params, JSON body and query string.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, JsonError};
use crate::handler::BoxedHandler;
use crate::hook::Hook;
use crate::path::PathPattern;

// ── PathParams ────────────────────────────────────────────────────────────────

/// Matches the request path against a pattern and merges the placeholder
/// bindings into `args` as strings.
///
/// A path that does not fit the pattern stops the chain with a 404.
pub struct PathParams {
    pattern: Arc<PathPattern>,
}

impl PathParams {
    pub fn new(pattern: &str) -> Self {
        Self { pattern: Arc::new(PathPattern::parse(pattern)) }
    }
}

impl Hook for PathParams {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let pattern = Arc::clone(&self.pattern);
        BoxedHandler::from_fn(move |props| {
            let matched = pattern.matches(props.request().path());
            let next = next.clone();
            async move {
                let params: Map<String, Value> = matched?
                    .into_iter()
                    .map(|(name, value)| (name, Value::String(value)))
                    .collect();
                next.call(props.with_args(params)).await
            }
        })
    }
}

// ── JsonBody ──────────────────────────────────────────────────────────────────

/// Parses the request body as JSON, checks it against the shape `T`, and
/// merges `T`'s fields into `args`.
///
/// The shape is whatever `T`'s `Deserialize` impl accepts: required fields,
/// types, `#[serde(deny_unknown_fields)]` and so on. Fields are re-read from
/// `T`'s `Serialize` output, so defaults filled in by serde land in `args`.
/// An empty body reads as `{}`.
///
/// ```rust
/// use hookwork::hooks::JsonBody;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize, Serialize)]
/// struct CreateTimeout {
///     callback_url: String,
///     #[serde(default)]
///     delay_secs: u64,
/// }
///
/// let hook = JsonBody::<CreateTimeout>::new();
/// ```
pub struct JsonBody<T> {
    shape: PhantomData<fn() -> T>,
}

impl<T> JsonBody<T> {
    pub fn new() -> Self {
        Self { shape: PhantomData }
    }
}

impl<T> Default for JsonBody<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Hook for JsonBody<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        BoxedHandler::from_fn(move |props| {
            let parsed = body_value(props.request().body())
                .and_then(|body| shaped::<T>(body, "hookwork.body.invalid"));
            let next = next.clone();
            async move { next.call(props.with_args(parsed?)).await }
        })
    }
}

fn body_value(body: &[u8]) -> Result<Value, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|e| {
        JsonError::validation(format!("body is not valid JSON: {e}"))
            .key("hookwork.body.malformed")
            .into()
    })
}

// ── QueryArgs ─────────────────────────────────────────────────────────────────

/// Checks the query string against the shape `T` and merges `T`'s fields
/// into `args`.
///
/// Query values arrive as strings; declare them as `String` (or use a
/// deserializer that parses strings) in `T`.
pub struct QueryArgs<T> {
    shape: PhantomData<fn() -> T>,
}

impl<T> QueryArgs<T> {
    pub fn new() -> Self {
        Self { shape: PhantomData }
    }
}

impl<T> Default for QueryArgs<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Hook for QueryArgs<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        BoxedHandler::from_fn(move |props| {
            let query: Map<String, Value> = props.request().query()
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect();
            let parsed = shaped::<T>(Value::Object(query), "hookwork.query.invalid");
            let next = next.clone();
            async move { next.call(props.with_args(parsed?)).await }
        })
    }
}

// ── Shared ────────────────────────────────────────────────────────────────────

/// Validates `value` as `T` and returns `T`'s fields.
fn shaped<T>(value: Value, key: &str) -> Result<Map<String, Value>, Error>
where
    T: DeserializeOwned + Serialize,
{
    let typed: T = serde_json::from_value(value)
        .map_err(|e| JsonError::validation(e.to_string()).key(key))?;
    match serde_json::to_value(typed)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(JsonError::validation("arguments must form an object").key(key).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, Serialize)]
    struct Shape {
        id: u32,
        name: String,
    }

    #[test]
    fn shaped_returns_fields() {
        let fields = shaped::<Shape>(json!({ "id": 22, "name": "mock" }), "k").unwrap();
        assert_eq!(fields["id"], json!(22));
        assert_eq!(fields["name"], json!("mock"));
    }

    #[test]
    fn shaped_rejects_missing_fields() {
        let err = shaped::<Shape>(json!({ "id": 22 }), "k").unwrap_err();
        assert_eq!(err.status(), 400);
        match err {
            Error::Json(e) => assert_eq!(e.key, "k"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blank_body_reads_as_empty_object() {
        assert_eq!(body_value(b"").unwrap(), json!({}));
        assert_eq!(body_value(b" \n").unwrap(), json!({}));
        assert_eq!(body_value(b"{oops").unwrap_err().status(), 400);
    }
}
