//! The stock hooks.
//!
//! | hook | contributes |
//! |---|---|
//! | [`PathParams`] | path placeholder bindings into `args` |
//! | [`JsonBody`] / [`QueryArgs`] | typed body / query fields into `args` |
//! | [`UseServices`] | named dependencies into `services` |
//! | [`ApiKey`] / [`BasicAuth`] | credentials into `auth` |
//! | [`Logging`] | one templated line per request |
//! | [`CachedResponse`] | a cached handler result |

mod args;
mod auth;
mod cached_response;
mod logging;
mod services;

pub use args::{JsonBody, PathParams, QueryArgs};
pub use auth::{ApiKey, BasicAuth, parse_basic};
pub use cached_response::{CacheOptions, CachedResponse, DEFAULT_TTL, Skipping};
pub use logging::{BUILTIN_TOKENS, LogContext, Logging};
pub use services::{CACHE_SERVICE, UseServices};
