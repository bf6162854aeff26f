//! Access logging rendered from a format string.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::handler::BoxedHandler;
use crate::hook::Hook;
use crate::log_format::{LogFormat, Resolve};
use crate::logger::{Logger, TracingLogger};
use crate::request::Request;

/// Directives every [`Logging`] hook understands.
pub const BUILTIN_TOKENS: &[&str] = &[
    "status", "path", "url", "domain", "method", "elapsed", "date",
    "referrer", "ip", "http-version", "protocol", "user-agent",
];

/// Everything a directive can be resolved from.
pub struct LogContext<'a> {
    pub request: &'a Request,
    pub status: u16,
    pub elapsed: Duration,
    pub now: DateTime<Utc>,
}

type CustomToken = dyn Fn(&LogContext<'_>, &[String]) -> String + Send + Sync;

/// Logs one line per request after the inner chain finishes.
///
/// Responses with status >= 500, and failed chains, go to
/// [`Logger::error`]; everything else to [`Logger::log`]. The inner result is
/// passed through untouched.
///
/// ```rust
/// use hookwork::hooks::Logging;
///
/// let logging = Logging::new("[:method] :path -> :status in :elapsed(ms, ms)")
///     .token("tenant", |ctx, _args| {
///         ctx.request.header("x-tenant").unwrap_or("-").to_owned()
///     });
/// ```
///
/// # Panics
///
/// [`wrap`](Hook::wrap) panics, at pipeline build time, if the format uses
/// a directive that is neither built in nor registered with
/// [`token`](Logging::token).
#[derive(Clone)]
pub struct Logging {
    format: LogFormat,
    logger: Option<Arc<dyn Logger>>,
    tokens: HashMap<String, Arc<CustomToken>>,
}

impl Logging {
    /// Logs through [`TracingLogger`] by default.
    pub fn new(format: &str) -> Self {
        Self {
            format: LogFormat::parse(format),
            logger: Some(Arc::new(TracingLogger)),
            tokens: HashMap::new(),
        }
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Renders nothing and logs nothing.
    pub fn silent(mut self) -> Self {
        self.logger = None;
        self
    }

    /// Registers (or overrides) a directive.
    pub fn token<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&LogContext<'_>, &[String]) -> String + Send + Sync + 'static,
    {
        self.tokens.insert(name.to_owned(), Arc::new(f));
        self
    }

    fn knows(&self, token: &str) -> bool {
        self.tokens.contains_key(token) || BUILTIN_TOKENS.contains(&token)
    }

    fn report(&self, logger: &dyn Logger, ctx: &LogContext<'_>, failure: Option<&dyn Display>) {
        let resolver = ContextResolver { ctx, custom: &self.tokens };
        let line = match self.format.render(&resolver) {
            Ok(line) => line,
            Err(e) => {
                logger.error("failed to render access log line", Some(&e as &dyn Display));
                return;
            }
        };
        if failure.is_some() || ctx.status >= 500 {
            logger.error(&line, failure);
        } else {
            logger.log(&line);
        }
    }
}

impl Hook for Logging {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        if let Some(unknown) = self.format.tokens().iter().find(|t| !self.knows(&t.token)) {
            panic!("log format `{}` uses unknown token `{}`", self.format.as_str(), unknown.raw);
        }

        let config = Arc::new(self.clone());
        BoxedHandler::from_fn(move |props| {
            let config = Arc::clone(&config);
            let next = next.clone();
            async move {
                let Some(logger) = config.logger.clone() else {
                    return next.call(props).await;
                };

                let request = props.shared_request();
                let result = next.call(props).await;

                let status = match &result {
                    Ok(response) => response.status_code(),
                    Err(e) => e.status(),
                };
                let ctx = LogContext {
                    request: &request,
                    status,
                    elapsed: request.started_at().elapsed(),
                    now: Utc::now(),
                };
                let failure = result.as_ref().err().map(|e| e as &dyn Display);
                config.report(logger.as_ref(), &ctx, failure);

                result
            }
        })
    }
}

// ── Resolution ────────────────────────────────────────────────────────────────

struct ContextResolver<'a, 'c> {
    ctx: &'a LogContext<'c>,
    custom: &'a HashMap<String, Arc<CustomToken>>,
}

impl Resolve for ContextResolver<'_, '_> {
    fn resolve(&self, token: &str, args: &[String]) -> Option<String> {
        if let Some(custom) = self.custom.get(token) {
            return Some(custom(self.ctx, args));
        }
        builtin(self.ctx, token, args)
    }
}

fn builtin(ctx: &LogContext<'_>, token: &str, args: &[String]) -> Option<String> {
    let req = ctx.request;
    let value = match token {
        "status" => ctx.status.to_string(),
        "path" => req.path().to_owned(),
        "url" => req.url().to_owned(),
        "domain" => domain(req),
        "method" => req.method().to_string(),
        "elapsed" => elapsed(ctx.elapsed, args),
        "date" => date(ctx.now, args),
        "referrer" => or_dash(req.header("referer").or_else(|| req.header("referrer"))),
        "ip" => req.ip().map_or_else(|| "-".to_owned(), |ip| ip.to_string()),
        "http-version" => req.http_version().to_owned(),
        "protocol" => req.protocol().to_owned(),
        "user-agent" => or_dash(req.header("user-agent")),
        _ => return None,
    };
    Some(value)
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_owned()
}

fn domain(req: &Request) -> String {
    if let Some(host) = url::Url::parse(req.url()).ok().and_then(|u| u.host_str().map(str::to_owned)) {
        return host;
    }
    match req.header("host") {
        Some(host) => host.split(':').next().unwrap_or(host).to_owned(),
        None => "-".to_owned(),
    }
}

/// `elapsed`, `elapsed(unit)` or `elapsed(unit, suffix)`.
///
/// Sub-second units are integers; `s`, `m` and `h` keep up to three
/// decimals. Unknown units read as milliseconds.
fn elapsed(d: Duration, args: &[String]) -> String {
    let value = match args.first().map(String::as_str) {
        Some("ns") => d.as_nanos().to_string(),
        Some("us") => d.as_micros().to_string(),
        Some("s") => decimal(d.as_secs_f64()),
        Some("m") => decimal(d.as_secs_f64() / 60.0),
        Some("h") => decimal(d.as_secs_f64() / 3600.0),
        _ => d.as_millis().to_string(),
    };
    let suffix = args.get(1).map(String::as_str).unwrap_or("");
    format!("{value}{suffix}")
}

fn decimal(v: f64) -> String {
    let text = format!("{v:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_owned()
}

/// `iso`, `clf` or `web` (the default).
fn date(now: DateTime<Utc>, args: &[String]) -> String {
    match args.first().map(String::as_str) {
        Some("iso") => now.to_rfc3339_opts(SecondsFormat::Millis, true),
        Some("clf") => now.format("%d/%b/%Y:%H:%M:%S +0000").to_string(),
        _ => now.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
    }
}
