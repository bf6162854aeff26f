//! # hookwork
//!
//! Composable request hooks around runtime-agnostic handlers.
//!
//! A handler is an async function from [`Props`] to a response. Hooks wrap
//! it: each one may enrich the props (path params, parsed body, services,
//! credentials), short-circuit with an error, or observe the outcome
//! (logging, caching). [`compose`] stacks hooks outermost-first and seals
//! the chain into an [`Endpoint`], the single place where any error or panic
//! becomes a [`Response`].
//!
//! Nothing in the core knows about sockets. The bundled [`Server`] is one
//! adapter (hyper + tokio); any other runtime only has to build a
//! [`Request`] and call [`Endpoint::handle`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use hookwork::hooks::{Logging, PathParams};
//! use hookwork::{Error, JsonError, Props, Server, compose};
//! use serde_json::{Value, json};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hookwork::ServerError> {
//!     let endpoint = compose()
//!         .hook(Logging::new("[:method] :path -> :status in :elapsed(ms, ms)"))
//!         .hook(PathParams::new("/users/{id}"))
//!         .handler(get_user);
//!
//!     Server::bind("0.0.0.0:3000")?.serve(endpoint).await
//! }
//!
//! async fn get_user(props: Props) -> Result<Value, Error> {
//!     match props.arg("id").and_then(Value::as_str) {
//!         Some("42") => Ok(json!({ "id": "42", "name": "ray" })),
//!         _ => Err(JsonError::not_found("User not found").into()),
//!     }
//! }
//! ```

mod cache;
mod error;
mod handler;
mod hook;
mod logger;
mod path;
mod pipeline;
mod props;
mod request;
mod response;
mod server;

pub mod hooks;
pub mod identity;
pub mod log_format;

pub use cache::{Cache, CacheError, MemoryCache};
pub use error::{BoxError, Error, JsonError, ServerError, response_from_error};
pub use handler::{BoxedHandler, Handler, HandlerResult};
pub use hook::{FnHook, Hook, hook_fn};
pub use logger::{Logger, TracingLogger};
pub use path::{PathPattern, RouteMismatch, match_path};
pub use pipeline::{Endpoint, Pipeline, compose};
pub use props::{Auth, BasicCredentials, Props, Services};
pub use request::{Request, RequestBuilder};
pub use response::{IntoResponse, Json, Response, ResponseBuilder};
pub use server::Server;
