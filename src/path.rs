//! Positional path-pattern matching.
//!
//! A pattern is split on `/` into literal segments and `{name}` placeholders.
//! A request path matches when it has the same number of segments and every
//! literal segment is equal, byte for byte. No wildcards, no regex, no
//! optional segments.

use std::collections::HashMap;

use crate::error::{Error, JsonError};

/// The request path does not fit the pattern.
///
/// Callers surface this as a 404.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("path `{path}` does not match pattern `{pattern}`")]
pub struct RouteMismatch {
    pub path: String,
    pub pattern: String,
}

impl From<RouteMismatch> for JsonError {
    fn from(e: RouteMismatch) -> Self {
        JsonError::not_found("Not Found")
            .key("hookwork.path.mismatch")
            .info(e.to_string())
    }
}

impl From<RouteMismatch> for Error {
    fn from(e: RouteMismatch) -> Self {
        JsonError::from(e).into()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled pattern such as `/v1/show/{workspace}/account/{account}`.
///
/// Parse once at startup, match on every request.
#[derive(Clone, Debug)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// `{name}` segments become placeholders; everything else, including a
    /// bare `{}`, is literal.
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .map(|segment| {
                match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(name) if !name.is_empty() => Segment::Param(name.to_owned()),
                    _ => Segment::Literal(segment.to_owned()),
                }
            })
            .collect();
        Self { raw: pattern.to_owned(), segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in pattern order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Binds every placeholder to the segment at the same position in
    /// `path`.
    pub fn matches(&self, path: &str) -> Result<HashMap<String, String>, RouteMismatch> {
        let mismatch = || RouteMismatch { path: path.to_owned(), pattern: self.raw.clone() };

        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return Err(mismatch());
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_owned());
                }
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return Err(mismatch()),
            }
        }
        Ok(params)
    }
}

/// One-shot form of [`PathPattern::matches`].
pub fn match_path(path: &str, pattern: &str) -> Result<HashMap<String, String>, RouteMismatch> {
    PathPattern::parse(pattern).matches(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "/v1/show/w1/account/a1/details";

    #[test]
    fn extracts_every_placeholder() {
        let params = match_path(PATH, "/v1/show/{workspace}/account/{account}/details").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["workspace"], "w1");
        assert_eq!(params["account"], "a1");
    }

    #[test]
    fn shorter_patterns_do_not_match() {
        for pattern in [
            "/v1/show/{workspace}/account/{account}",
            "/v1/show/{workspace}",
            "/v1/show/{workspace}/account",
            "/v1/show",
        ] {
            let err = match_path(PATH, pattern).unwrap_err();
            assert_eq!(err.pattern, pattern);
        }
    }

    #[test]
    fn longer_patterns_do_not_match() {
        assert!(match_path("/v1/timeout", "/v1/timeout/{id}").is_err());
        assert!(match_path("/v1/timeout/1", "/v1/timeout/{id}/clear").is_err());
    }

    #[test]
    fn verbatim_pattern_matches_with_no_params() {
        assert!(match_path("/ping", "/ping").unwrap().is_empty());
    }

    #[test]
    fn literals_are_case_sensitive() {
        assert!(match_path("/Ping", "/ping").is_err());
        assert!(match_path("/v1/timeout/42/Clear", "/v1/timeout/{id}/clear").is_err());
    }

    #[test]
    fn placeholder_binds_empty_segment() {
        let params = match_path("/v1/timeout/", "/v1/timeout/{id}").unwrap();
        assert_eq!(params["id"], "");
    }

    #[test]
    fn mismatch_surfaces_as_not_found() {
        let err: Error = match_path("/a", "/b").unwrap_err().into();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn compiled_pattern_lists_params() {
        let pattern = PathPattern::parse("/v1/{org}/users/{id}");
        assert_eq!(pattern.params().collect::<Vec<_>>(), ["org", "id"]);
        assert_eq!(pattern.as_str(), "/v1/{org}/users/{id}");
    }
}
