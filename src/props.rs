//! The per-request value threaded through a hook chain.
//!
//! A [`Props`] is moved from stage to stage. Hooks never edit the one they
//! received in place; they consume it and hand the next stage a new value
//! with their contribution merged in, so every field set upstream survives.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, JsonError};
use crate::request::Request;
use crate::response::Response;

// ── Services ──────────────────────────────────────────────────────────────────

/// Named, typed dependency handles (a database, a cache, ...).
#[derive(Clone, Default)]
pub struct Services {
    handles: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handle` under `name`, replacing any previous handle of that name.
    pub fn with<T: Send + Sync + 'static>(mut self, name: &str, handle: T) -> Self {
        self.handles.insert(name.to_owned(), Arc::new(handle));
        self
    }

    pub(crate) fn with_shared(mut self, name: &str, handle: Arc<dyn Any + Send + Sync>) -> Self {
        self.handles.insert(name.to_owned(), handle);
        self
    }

    /// The handle stored under `name`, if it exists and has type `T`.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Option<&T> {
        self.handles.get(name)?.downcast_ref::<T>()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_set().entries(names).finish()
    }
}

// ── Auth ──────────────────────────────────────────────────────────────────────

/// Credentials accepted by the authentication hooks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Auth {
    pub api_key: Option<String>,
    pub basic: Option<BasicCredentials>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicCredentials {
    pub client_id: String,
    pub client_secret: String,
}

// ── Props ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Props {
    request: Arc<Request>,
    response: Option<Response>,
    args: Map<String, Value>,
    services: Services,
    auth: Auth,
}

impl Props {
    pub fn new(request: Request) -> Self {
        Self {
            request: Arc::new(request),
            response: None,
            args: Map::new(),
            services: Services::new(),
            auth: Auth::default(),
        }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn shared_request(&self) -> Arc<Request> { Arc::clone(&self.request) }
    pub fn response(&self) -> Option<&Response> { self.response.as_ref() }
    pub fn args(&self) -> &Map<String, Value> { &self.args }
    pub fn services(&self) -> &Services { &self.services }
    pub fn auth(&self) -> &Auth { &self.auth }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Deserializes the accumulated args into `T`.
    pub fn args_as<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(Value::Object(self.args.clone()))
            .map_err(|e| JsonError::validation(e.to_string()).key("hookwork.args.invalid").into())
    }

    /// The service stored under `name`.
    ///
    /// A missing service means the pipeline was assembled wrong, so it fails
    /// as an unknown (500) error rather than a caller-facing one.
    pub fn service<T: Send + Sync + 'static>(&self, name: &str) -> Result<&T, Error> {
        self.services
            .get::<T>(name)
            .ok_or_else(|| Error::unknown(format!("service `{name}` is not available")))
    }

    /// Merges `args` over the current args. Same-named keys are replaced,
    /// every other key is kept.
    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn with_arg(mut self, name: &str, value: Value) -> Self {
        self.args.insert(name.to_owned(), value);
        self
    }

    pub fn with_service<T: Send + Sync + 'static>(mut self, name: &str, handle: T) -> Self {
        self.services = self.services.with(name, handle);
        self
    }

    pub(crate) fn with_services(mut self, services: Services) -> Self {
        for (name, handle) in services.handles {
            self.services = self.services.with_shared(&name, handle);
        }
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.auth.api_key = Some(key.into());
        self
    }

    pub fn with_basic(mut self, credentials: BasicCredentials) -> Self {
        self.auth.basic = Some(credentials);
        self
    }

    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }
}
