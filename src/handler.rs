//! Handler trait and type erasure.
//!
//! # How handlers and hooks share one type
//!
//! A hook does not know what it wraps: the terminal handler, or another hook
//! that eventually reaches it. Both are stored behind the same trait object,
//! [`BoxedHandler`], so a chain of any length has a single concrete type.
//!
//! ```text
//! async fn find(props: Props) -> Result<Json<T>, Error>   ← user writes this
//!        ↓ compose().hook(..).handler(find)
//! find.into_boxed_handler()                               ← Handler blanket impl
//!        ↓
//! BoxedHandler(Arc::new(FnHandler(find)))                 ← shared, heap-allocated
//!        ↓ hook.wrap(inner) for every hook, right to left, once at startup
//! handler.call(props) at request time                     ← one vtable dispatch per stage
//! ```

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::error::Error;
use crate::props::Props;
use crate::response::{IntoResponse, Response};

/// What every stage of a chain resolves to.
pub type HandlerResult = Result<Response, Error>;

/// Internal dispatch interface.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, props: Props) -> BoxFuture<'static, HandlerResult>;
}

/// A type-erased handler shared across concurrent requests.
///
/// Cloning is one atomic increment. This is what a [`Hook`](crate::Hook)
/// receives as `next` and what it returns.
#[derive(Clone)]
pub struct BoxedHandler(Arc<dyn ErasedHandler + Send + Sync + 'static>);

impl BoxedHandler {
    /// Builds a handler from a closure that already resolves to
    /// `Result<Response, Error>`. Hooks use this to return their wrapper.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Props) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self(Arc::new(RawFn(f)))
    }

    pub fn call(&self, props: Props) -> BoxFuture<'static, HandlerResult> {
        self.0.call(props)
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid terminal handler.
///
/// You never implement this yourself. It is satisfied for any `async fn`
/// with the signature:
///
/// ```text
/// async fn name(props: Props) -> Result<impl IntoResponse, Error>
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Props) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Props) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        BoxedHandler(Arc::new(FnHandler(self)))
    }
}

// ── Concrete wrappers ─────────────────────────────────────────────────────────

/// Holds a user handler and maps its success value through `IntoResponse`.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Props) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, props: Props) -> BoxFuture<'static, HandlerResult> {
        let fut = (self.0)(props);
        async move { fut.await.map(IntoResponse::into_response) }.boxed()
    }
}

/// Holds a hook's wrapper closure; no conversion needed.
struct RawFn<F>(F);

impl<F, Fut> ErasedHandler for RawFn<F>
where
    F: Fn(Props) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, props: Props) -> BoxFuture<'static, HandlerResult> {
        (self.0)(props).boxed()
    }
}
