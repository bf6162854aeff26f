//! The hook contract.
//!
//! A hook wraps the handler below it and returns a new handler. It may run
//! code before delegating, after, both, or never delegate at all.

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxedHandler, HandlerResult};
use crate::props::Props;

/// A transform from handler to handler.
///
/// `wrap` runs once, when the pipeline is built, not per request. Put
/// per-request work inside the returned handler.
pub trait Hook: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

/// Builds a hook from an async closure receiving the props and the next
/// handler.
///
/// ```rust
/// use hookwork::{Response, hook_fn};
///
/// // Answers OPTIONS itself, delegates everything else.
/// let preflight = hook_fn(|props, next| async move {
///     if props.request().method() == http::Method::OPTIONS {
///         return Ok(Response::status(http::StatusCode::NO_CONTENT));
///     }
///     next.call(props).await
/// });
/// ```
pub fn hook_fn<F, Fut>(f: F) -> FnHook<F>
where
    F: Fn(Props, BoxedHandler) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHook(Arc::new(f))
}

/// Hook returned by [`hook_fn`].
pub struct FnHook<F>(Arc<F>);

impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(Props, BoxedHandler) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let f = Arc::clone(&self.0);
        BoxedHandler::from_fn(move |props| f(props, next.clone()))
    }
}
