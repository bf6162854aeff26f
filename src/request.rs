//! Inbound request shape supplied by runtime adapters.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use bytes::Bytes;
use http::Method;

/// An inbound request, already translated out of the hosting runtime's own
/// representation.
///
/// Built once per request with [`Request::builder`] and never mutated
/// afterwards; [`Props`](crate::Props) shares it behind an `Arc`.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) query: HashMap<String, String>,
    pub(crate) started_at: Instant,
    pub(crate) ip: Option<IpAddr>,
    pub(crate) http_version: String,
    pub(crate) protocol: String,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn url(&self) -> &str { &self.url }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn query(&self) -> &HashMap<String, String> { &self.query }
    pub fn started_at(&self) -> Instant { self.started_at }
    pub fn ip(&self) -> Option<IpAddr> { self.ip }
    pub fn http_version(&self) -> &str { &self.http_version }
    pub fn protocol(&self) -> &str { &self.protocol }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Builder used by adapters (and tests) to assemble a [`Request`].
///
/// ```rust
/// use hookwork::Request;
///
/// let req = Request::builder()
///     .method(http::Method::GET)
///     .uri("/v1/timeout/42?verbose=1")
///     .header("host", "api.example.com")
///     .build();
///
/// assert_eq!(req.path(), "/v1/timeout/42");
/// assert_eq!(req.query()["verbose"], "1");
/// assert_eq!(req.url(), "http://api.example.com/v1/timeout/42?verbose=1");
/// ```
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    path: String,
    raw_query: Option<String>,
    url: Option<String>,
    headers: Vec<(String, String)>,
    body: Bytes,
    query: HashMap<String, String>,
    started_at: Option<Instant>,
    ip: Option<IpAddr>,
    http_version: String,
    protocol: String,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: "/".to_owned(),
            raw_query: None,
            url: None,
            headers: Vec::new(),
            body: Bytes::new(),
            query: HashMap::new(),
            started_at: None,
            ip: None,
            http_version: "1.1".to_owned(),
            protocol: "http".to_owned(),
        }
    }
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the path without touching the query.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets path and query from a path-and-query string (`/a/b?x=1`).
    /// Query pairs are percent-decoded.
    pub fn uri(mut self, uri: &str) -> Self {
        match uri.split_once('?') {
            Some((path, query)) => {
                self.path = path.to_owned();
                self.query.extend(url::form_urlencoded::parse(query.as_bytes()).into_owned());
                self.raw_query = Some(query.to_owned());
            }
            None => self.path = uri.to_owned(),
        }
        self
    }

    /// Overrides the reconstructed absolute URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn started_at(mut self, at: Instant) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn http_version(mut self, version: impl Into<String>) -> Self {
        self.http_version = version.into();
        self
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn build(self) -> Request {
        let url = self.url.unwrap_or_else(|| {
            let mut url = match self.headers.iter().find(|(k, _)| k == "host") {
                Some((_, host)) => format!("{}://{host}{}", self.protocol, self.path),
                None => self.path.clone(),
            };
            if let Some(query) = &self.raw_query {
                url.push('?');
                url.push_str(query);
            }
            url
        });

        Request {
            method: self.method,
            path: self.path,
            url,
            headers: self.headers,
            body: self.body,
            query: self.query,
            started_at: self.started_at.unwrap_or_else(Instant::now),
            ip: self.ip,
            http_version: self.http_version,
            protocol: self.protocol,
        }
    }
}
