//! Resolves named dependencies into `services`.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::error;

use crate::cache::Cache;
use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::hook::Hook;
use crate::props::{Props, Services};

/// Name under which [`CachedResponse`](crate::hooks::CachedResponse) looks
/// up its backend.
pub const CACHE_SERVICE: &str = "cache";

type Handle = Arc<dyn Any + Send + Sync>;
type Factory = dyn Fn(&Props) -> BoxFuture<'static, Result<Handle, Error>> + Send + Sync;

/// A service factory failed; the request cannot be served at all.
#[derive(Debug, thiserror::Error)]
#[error("failed to resolve service `{name}`: {source}")]
struct ServiceError {
    name: String,
    #[source]
    source: Error,
}

/// Runs each factory, in declaration order, and merges the handles into
/// `services`.
///
/// Any factory error is a setup failure: the request ends with a 500 and the
/// cause is logged, never shown.
///
/// ```rust
/// use std::sync::Arc;
/// use hookwork::MemoryCache;
/// use hookwork::hooks::UseServices;
///
/// struct Database;
///
/// let cache = Arc::new(MemoryCache::new());
/// let services = UseServices::new()
///     .service("db", |_props| async { Ok::<_, hookwork::Error>(Database) })
///     .cache(cache);
/// ```
#[derive(Clone, Default)]
pub struct UseServices {
    factories: Vec<(String, Arc<Factory>)>,
}

impl UseServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service<F, Fut, T>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Props) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let factory: Arc<Factory> = Arc::new(move |props: &Props| {
            let fut = factory(props);
            async move { fut.await.map(|handle| Arc::new(handle) as Handle) }.boxed()
        });
        self.factories.push((name.to_owned(), factory));
        self
    }

    /// Registers a shared cache backend under [`CACHE_SERVICE`].
    pub fn cache(self, cache: Arc<dyn Cache>) -> Self {
        self.service(CACHE_SERVICE, move |_props| {
            let cache = Arc::clone(&cache);
            async move { Ok::<_, Error>(cache) }
        })
    }

    async fn resolve(&self, props: &Props) -> Result<Services, Error> {
        let mut services = Services::new();
        for (name, factory) in &self.factories {
            match factory(props).await {
                Ok(handle) => services = services.with_shared(name, handle),
                Err(source) => {
                    error!(service = %name, error = %source, "service resolution failed");
                    return Err(Error::unknown(ServiceError { name: name.clone(), source }));
                }
            }
        }
        Ok(services)
    }
}

impl Hook for UseServices {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let config = Arc::new(self.clone());
        BoxedHandler::from_fn(move |props| {
            let config = Arc::clone(&config);
            let next = next.clone();
            async move {
                let services = config.resolve(&props).await?;
                next.call(props.with_services(services)).await
            }
        })
    }
}
