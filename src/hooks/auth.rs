//! Authentication hooks: API key and HTTP Basic.

use std::future::Future;
use std::sync::Arc;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::error::{Error, JsonError};
use crate::handler::BoxedHandler;
use crate::hook::Hook;
use crate::props::{BasicCredentials, Props};

// ── ApiKey ────────────────────────────────────────────────────────────────────

type KeySource = dyn Fn(&Props) -> BoxFuture<'static, Result<Option<String>, Error>> + Send + Sync;

/// Requires an `x-api-key` header equal to the expected key.
///
/// The header may carry a `Key ` prefix (`x-api-key: Key abc123`). On
/// success the provided key is stored in `auth.api_key`. Every failure is a
/// 401 `Not Authenticated` with a distinct `key`:
///
/// | key | cause |
/// |---|---|
/// | `hookwork.api-key.missing-header` | no header |
/// | `hookwork.api-key.missing-key` | header holds only the prefix |
/// | `hookwork.api-key.key-error` | the expected key could not be loaded |
/// | `hookwork.api-key.key-not-found` | no expected key configured |
/// | `hookwork.api-key.mismatch` | keys differ |
#[derive(Clone)]
pub struct ApiKey {
    source: Arc<KeySource>,
}

impl ApiKey {
    /// Compares against a fixed key.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::resolve(move |_props| {
            let key = key.clone();
            async move { Ok::<_, Error>(Some(key)) }
        })
    }

    /// Loads the expected key per request (from a secrets store, a
    /// database, ...).
    pub fn resolve<F, Fut>(f: F) -> Self
    where
        F: Fn(&Props) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<String>, Error>> + Send + 'static,
    {
        Self { source: Arc::new(move |props: &Props| f(props).boxed()) }
    }

    async fn authenticate(&self, props: Props) -> Result<Props, Error> {
        let denied = |key: &str, info: &str| -> Error {
            JsonError::not_authenticated(info).key(key).into()
        };

        let Some(header) = props.request().header("x-api-key") else {
            return Err(denied("hookwork.api-key.missing-header", "This function requires an api key"));
        };
        let provided = strip_key_prefix(header).to_owned();
        if provided.is_empty() {
            return Err(denied("hookwork.api-key.missing-key", "Invalid api key"));
        }

        let expected = match (self.source)(&props).await {
            Ok(Some(key)) if !key.is_empty() => key,
            Ok(_) => return Err(denied("hookwork.api-key.key-not-found", "Server cannot authenticate")),
            Err(e) => {
                tracing::warn!(error = %e, "api key lookup failed");
                return Err(denied("hookwork.api-key.key-error", "Server cannot authenticate"));
            }
        };

        if provided != expected {
            return Err(denied("hookwork.api-key.mismatch", "Invalid api key"));
        }
        Ok(props.with_api_key(provided))
    }
}

/// Removes a leading `Key`/`key` followed by one whitespace character.
fn strip_key_prefix(header: &str) -> &str {
    let Some(rest) = header.strip_prefix("Key").or_else(|| header.strip_prefix("key")) else {
        return header;
    };
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_whitespace() => chars.as_str(),
        _ => header,
    }
}

impl Hook for ApiKey {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let config = Arc::new(self.clone());
        BoxedHandler::from_fn(move |props| {
            let config = Arc::clone(&config);
            let next = next.clone();
            async move {
                let props = config.authenticate(props).await?;
                next.call(props).await
            }
        })
    }
}

// ── BasicAuth ─────────────────────────────────────────────────────────────────

/// Requires `authorization: Basic base64(client_id:client_secret)` and
/// stores the decoded pair in `auth.basic`.
///
/// Verifying the pair is left to the handler (or a later hook). Failures are
/// 401s keyed `hookwork.basic.noheader`, `hookwork.basic.nobasic` and
/// `hookwork.basic.misformat`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicAuth;

impl BasicAuth {
    pub fn new() -> Self {
        Self
    }
}

/// Decodes an `authorization` header value.
pub fn parse_basic(header: Option<&str>) -> Result<BasicCredentials, JsonError> {
    let Some(header) = header else {
        return Err(JsonError::not_authenticated("This function requires authentication via a token")
            .key("hookwork.basic.noheader"));
    };

    let token = header.strip_prefix("Basic ").unwrap_or_default();
    if token.is_empty() {
        return Err(JsonError::not_authenticated("This function requires authentication via a token")
            .key("hookwork.basic.nobasic"));
    }

    let misformat = || {
        JsonError::not_authenticated("Cannot call this function without a valid authentication token")
            .key("hookwork.basic.misformat")
    };
    let decoded = BASE64_STANDARD.decode(token).map_err(|_| misformat())?;
    let decoded = String::from_utf8(decoded).map_err(|_| misformat())?;

    match decoded.split_once(':') {
        Some((id, secret)) if !id.is_empty() && !secret.is_empty() => Ok(BasicCredentials {
            client_id: id.to_owned(),
            client_secret: secret.to_owned(),
        }),
        _ => Err(misformat()),
    }
}

impl Hook for BasicAuth {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        BoxedHandler::from_fn(move |props| {
            let credentials = parse_basic(props.request().header("authorization"));
            let next = next.clone();
            async move { next.call(props.with_basic(credentials?)).await }
        })
    }
}
