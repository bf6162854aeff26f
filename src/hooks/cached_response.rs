//! Caches the terminal handler's response keyed by request arguments.
//!
//! # Request flow
//!
//! ```text
//! skip header matches?  ── yes ──▶ handler (no GET, no SET)
//!        │ no
//!        ▼
//! GET prefix.uuid ── hit ──▶ decoded cached response (handler NOT called)
//!        │ miss / GET error / undecodable entry
//!        ▼
//! handler ──▶ SET prefix.uuid (errors only logged) ──▶ fresh response
//! ```
//!
//! There is no single-flight: concurrent misses on one key each run the
//! handler and each issue a SET.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::cache::Cache;
use crate::error::Error;
use crate::handler::{BoxedHandler, HandlerResult};
use crate::hook::Hook;
use crate::hooks::services::CACHE_SERVICE;
use crate::identity;
use crate::logger::Logger;
use crate::props::Props;
use crate::response::Response;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

type ToIdentity = dyn Fn(&Map<String, Value>) -> Value + Send + Sync;
type ToCache = dyn Fn(&Response) -> Result<String, Error> + Send + Sync;
type ToResponse = dyn Fn(&str) -> Result<Response, Error> + Send + Sync;

/// Bypass rule: skip the cache when `header` equals `value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Skipping {
    pub header: String,
    pub value: String,
}

/// Options for [`CachedResponse`]. Only `key` is required.
///
/// | option | default |
/// |---|---|
/// | `ttl` | one hour ([`DEFAULT_TTL`]), sent to the backend in whole seconds, rounded up |
/// | `skipping` | never skip |
/// | `to_identity` | all args |
/// | `to_cache` / `to_response` | JSON encode / decode of the [`Response`] |
/// | `logger` | none (silent) |
pub struct CacheOptions {
    key: String,
    ttl: Option<Duration>,
    skipping: Option<Skipping>,
    to_identity: Option<Arc<ToIdentity>>,
    to_cache: Option<Arc<ToCache>>,
    to_response: Option<Arc<ToResponse>>,
    logger: Option<Arc<dyn Logger>>,
}

impl CacheOptions {
    /// `key` namespaces every entry this hook writes; use one per endpoint.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_owned(),
            ttl: None,
            skipping: None,
            to_identity: None,
            to_cache: None,
            to_response: None,
            logger: None,
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn skipping(mut self, header: &str, value: &str) -> Self {
        self.skipping = Some(Skipping { header: header.to_owned(), value: value.to_owned() });
        self
    }

    /// Reduces args to the part that identifies a response.
    pub fn to_identity<F>(mut self, f: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Value + Send + Sync + 'static,
    {
        self.to_identity = Some(Arc::new(f));
        self
    }

    pub fn to_cache<F>(mut self, f: F) -> Self
    where
        F: Fn(&Response) -> Result<String, Error> + Send + Sync + 'static,
    {
        self.to_cache = Some(Arc::new(f));
        self
    }

    pub fn to_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.to_response = Some(Arc::new(f));
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

/// Options with every default filled in.
struct CacheConfig {
    prefix: String,
    ttl_secs: u64,
    skipping: Option<Skipping>,
    to_identity: Arc<ToIdentity>,
    to_cache: Arc<ToCache>,
    to_response: Arc<ToResponse>,
    logger: Option<Arc<dyn Logger>>,
}

/// Get-before-compute, set-after-compute caching around the inner handler.
///
/// The backend is the `Arc<dyn Cache>` registered under
/// [`CACHE_SERVICE`](crate::hooks::CACHE_SERVICE), usually by
/// [`UseServices::cache`](crate::hooks::UseServices::cache). Backend failures
/// never fail the request: a GET error reads as a miss, a SET error only
/// loses the write.
///
/// ```rust
/// use std::time::Duration;
/// use hookwork::hooks::{CacheOptions, CachedResponse};
///
/// let cached = CachedResponse::new(
///     CacheOptions::new("timeouts.list")
///         .ttl(Duration::from_secs(300))
///         .skipping("x-skip-cache", "yes"),
/// );
/// ```
pub struct CachedResponse {
    config: Arc<CacheConfig>,
}

impl CachedResponse {
    pub fn new(options: CacheOptions) -> Self {
        let ttl = options.ttl.unwrap_or(DEFAULT_TTL);
        let ttl_secs = ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0));

        let config = CacheConfig {
            prefix: options.key,
            ttl_secs,
            skipping: options.skipping,
            to_identity: options.to_identity.unwrap_or_else(|| Arc::new(all_args)),
            to_cache: options.to_cache.unwrap_or_else(|| Arc::new(encode_response)),
            to_response: options.to_response.unwrap_or_else(|| Arc::new(decode_response)),
            logger: options.logger,
        };
        Self { config: Arc::new(config) }
    }
}

fn all_args(args: &Map<String, Value>) -> Value {
    Value::Object(args.clone())
}

fn encode_response(response: &Response) -> Result<String, Error> {
    Ok(serde_json::to_string(response)?)
}

fn decode_response(cached: &str) -> Result<Response, Error> {
    Ok(serde_json::from_str(cached)?)
}

impl Hook for CachedResponse {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let config = Arc::clone(&self.config);
        BoxedHandler::from_fn(move |props| {
            let config = Arc::clone(&config);
            let next = next.clone();
            async move { config.run(props, next).await }
        })
    }
}

impl CacheConfig {
    async fn run(&self, props: Props, next: BoxedHandler) -> HandlerResult {
        if let Some(skip) = &self.skipping {
            if props.request().header(&skip.header) == Some(skip.value.as_str()) {
                self.log(&format!("[cached-response] skipping cache {}={}", skip.header, skip.value));
                return next.call(props).await;
            }
        }

        let cache = Arc::clone(props.service::<Arc<dyn Cache>>(CACHE_SERVICE)?);
        let key = identity::cache_key(&self.prefix, &(self.to_identity)(props.args()));

        match cache.get(&key).await {
            Ok(Some(cached)) if !cached.is_empty() => match (self.to_response)(&cached) {
                Ok(response) => {
                    self.log(&format!("[cached-response] cache hit for key: {key}"));
                    return Ok(response);
                }
                Err(e) => self.warn(&format!("[cached-response] undecodable entry for key {key}: {e}")),
            },
            Ok(_) => self.log(&format!("[cached-response] cache miss for key: {key}")),
            Err(e) => self.error("[cached-response] error on GET, falling back to handler", &e),
        }

        let response = next.call(props).await?;

        match (self.to_cache)(&response) {
            Ok(encoded) => {
                if let Err(e) = cache.set(&key, encoded, self.ttl_secs).await {
                    self.error("[cached-response] error on SET, the handler result was not persisted", &e);
                }
            }
            Err(e) => self.error("[cached-response] response could not be encoded, not persisted", &e),
        }

        Ok(response)
    }

    fn log(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.log(message);
        }
    }

    fn warn(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.warn(message);
        }
    }

    fn error(&self, message: &str, detail: &dyn Display) {
        if let Some(logger) = &self.logger {
            logger.error(message, Some(detail));
        }
    }
}
