//! Log format strings: `":method :path -> :status in :elapsed(ms, ms)"`.
//!
//! A directive is `:` followed by an identifier (an ASCII letter, then
//! letters, digits, `-` or `_`), optionally followed by a parenthesized,
//! comma-separated argument list. Everything else is literal text and is
//! reproduced unchanged when rendering.
//!
//! [`tokenize`] extracts the directives. [`render`] substitutes each one,
//! in source order, with what its resolver returns.

use std::collections::HashMap;
use std::sync::Arc;

/// One directive occurrence in a format string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogToken {
    /// Directive name, without the leading `:`.
    pub token: String,
    /// The directive exactly as written, arguments included.
    pub raw: String,
    pub args: Vec<String>,
    /// `true` iff the directive was written with parentheses, even `()`.
    pub calls: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("no resolver for log token `:{0}`")]
    UnknownToken(String),

    #[error("log token `{0}` does not occur in the format string")]
    Misaligned(String),
}

/// Extracts every directive of `format`, in order.
pub fn tokenize(format: &str) -> Vec<LogToken> {
    let bytes = format.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b':' || !bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i + 1;
        while bytes.get(end).is_some_and(|&b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            end += 1;
        }
        let token = format[start + 1..end].to_owned();

        let (args, calls) = match parse_args(format, end) {
            Some((args, close)) => {
                end = close;
                (args, true)
            }
            None => (Vec::new(), false),
        };

        tokens.push(LogToken { token, raw: format[start..end].to_owned(), args, calls });
        i = end;
    }

    tokens
}

/// Parses `(a, b)` starting at `open`. Returns the trimmed arguments and the
/// index just past `)`. An unterminated list is not an argument list.
fn parse_args(format: &str, open: usize) -> Option<(Vec<String>, usize)> {
    let rest = format[open..].strip_prefix('(')?;
    let close = rest.find(')')?;
    let inner = &rest[..close];
    let args = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|arg| arg.trim().to_owned()).collect()
    };
    Some((args, open + 1 + close + 1))
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// Source of directive values.
pub trait Resolve {
    /// Value for `token` called with `args`, or `None` if the token is not
    /// known to this resolver.
    fn resolve(&self, token: &str, args: &[String]) -> Option<String>;
}

type ResolverFn = dyn Fn(&[String]) -> String + Send + Sync;

/// A name → function resolver table.
///
/// ```rust
/// use hookwork::log_format::{Resolvers, render, tokenize};
///
/// let format = ":status :date(iso)";
/// let resolvers = Resolvers::new()
///     .with("status", |_| "200".to_owned())
///     .with("date", |args| format!("+{}", args[0]));
///
/// assert_eq!(render(format, &tokenize(format), &resolvers).unwrap(), "200 +iso");
/// ```
#[derive(Clone, Default)]
pub struct Resolvers {
    table: HashMap<String, Arc<ResolverFn>>,
}

impl Resolvers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, token: &str, f: F) -> Self
    where
        F: Fn(&[String]) -> String + Send + Sync + 'static,
    {
        self.table.insert(token.to_owned(), Arc::new(f));
        self
    }

    pub fn contains(&self, token: &str) -> bool {
        self.table.contains_key(token)
    }
}

impl Resolve for Resolvers {
    fn resolve(&self, token: &str, args: &[String]) -> Option<String> {
        self.table.get(token).map(|f| f(args))
    }
}

/// Renders `format`, replacing each token's `raw` span with its resolved
/// value.
///
/// Tokens must be the ones [`tokenize`] produced for `format`. Directives
/// written without parentheses are resolved with no arguments. A token with
/// no resolver is an error, never silently skipped.
pub fn render<R: Resolve + ?Sized>(
    format: &str,
    tokens: &[LogToken],
    resolvers: &R,
) -> Result<String, FormatError> {
    let mut out = String::with_capacity(format.len());
    let mut cursor = 0;

    for token in tokens {
        let args: &[String] = if token.calls { &token.args } else { &[] };
        let value = resolvers
            .resolve(&token.token, args)
            .ok_or_else(|| FormatError::UnknownToken(token.token.clone()))?;
        let offset = format[cursor..]
            .find(&token.raw)
            .ok_or_else(|| FormatError::Misaligned(token.raw.clone()))?;

        out.push_str(&format[cursor..cursor + offset]);
        out.push_str(&value);
        cursor += offset + token.raw.len();
    }

    out.push_str(&format[cursor..]);
    Ok(out)
}

/// A format string tokenized once, rendered many times.
#[derive(Clone, Debug)]
pub struct LogFormat {
    format: String,
    tokens: Vec<LogToken>,
}

impl LogFormat {
    pub fn parse(format: &str) -> Self {
        Self { format: format.to_owned(), tokens: tokenize(format) }
    }

    pub fn as_str(&self) -> &str { &self.format }
    pub fn tokens(&self) -> &[LogToken] { &self.tokens }

    pub fn render<R: Resolve + ?Sized>(&self, resolvers: &R) -> Result<String, FormatError> {
        render(&self.format, &self.tokens, resolvers)
    }
}
