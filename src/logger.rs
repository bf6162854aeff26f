//! Optional logger boundary used by the logging and caching hooks.

use std::fmt::Display;

/// Where hooks report what they did. Hooks hold an
/// `Option<Arc<dyn Logger>>`; `None` means silence.
pub trait Logger: Send + Sync {
    fn log(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str, detail: Option<&dyn Display>);
}

/// Forwards to `tracing` under the `hookwork` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "hookwork", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "hookwork", "{message}");
    }

    fn error(&self, message: &str, detail: Option<&dyn Display>) {
        match detail {
            Some(detail) => tracing::error!(target: "hookwork", detail = %detail, "{message}"),
            None => tracing::error!(target: "hookwork", "{message}"),
        }
    }
}
