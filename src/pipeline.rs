//! Composition of hooks around a handler, and the error boundary.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::debug;

use crate::error::{Error, response_from_error};
use crate::handler::{BoxedHandler, Handler};
use crate::hook::Hook;
use crate::props::Props;
use crate::request::Request;
use crate::response::Response;

/// Starts a pipeline.
///
/// ```rust
/// use hookwork::{Error, Props, compose};
/// use hookwork::hooks::PathParams;
///
/// async fn find(props: Props) -> Result<serde_json::Value, Error> {
///     Ok(serde_json::json!({ "id": props.arg("id") }))
/// }
///
/// let endpoint = compose()
///     .hook(PathParams::new("/v1/timeout/{id}"))
///     .handler(find);
/// ```
pub fn compose() -> Pipeline {
    Pipeline::new()
}

/// An ordered list of hooks waiting for its terminal handler.
///
/// The first hook added is the outermost: it runs first on the way in and
/// last on the way out.
#[derive(Default)]
pub struct Pipeline {
    hooks: Vec<Arc<dyn Hook>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hook(mut self, hook: impl Hook) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Right-folds the hooks over `handler`. This is the only place `wrap`
    /// is called.
    pub fn handler(self, handler: impl Handler) -> Endpoint {
        let inner = self
            .hooks
            .iter()
            .rev()
            .fold(handler.into_boxed_handler(), |next, hook| hook.wrap(next));
        debug!(hooks = self.hooks.len(), "pipeline composed");
        Endpoint { inner }
    }
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// A fully composed handler behind the error boundary.
///
/// Cheap to clone; share one per route across all requests.
#[derive(Clone)]
pub struct Endpoint {
    inner: BoxedHandler,
}

impl Endpoint {
    /// Runs the chain. Every exit path yields a response: errors from any
    /// depth are normalized here, panics included.
    pub async fn call(&self, props: Props) -> Response {
        let inner = self.inner.clone();
        let outcome = AssertUnwindSafe(async move { inner.call(props).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => response_from_error(error),
            Err(payload) => response_from_error(Error::unknown(Panicked(panic_message(payload)))),
        }
    }

    /// Runs the chain over fresh props built from `request`.
    pub async fn handle(&self, request: Request) -> Response {
        self.call(Props::new(request)).await
    }
}

#[derive(Debug, thiserror::Error)]
#[error("handler panicked: {0}")]
struct Panicked(String);

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
