//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::Method;
use serde_json::{Map, Value};
use tracing::debug;

use crate::scope::ValidatedSnapshot;

/// An incoming HTTP request.
///
/// Route params and the query string are always available. The parsed body
/// and cookies are `None` until [`BodyParser`](crate::middleware::BodyParser)
/// and [`CookieParser`](crate::middleware::CookieParser) have run; the
/// validated snapshot is `None` until a [`Validate`](crate::middleware::Validate)
/// middleware has accepted the request.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) query: HashMap<String, String>,
    pub(crate) fields: Option<Map<String, Value>>,
    pub(crate) cookies: Option<HashMap<String, String>>,
    pub(crate) valid: Option<ValidatedSnapshot>,
}

impl Request {
    /// Builder for requests constructed outside the server, e.g. in tests.
    pub fn builder() -> RequestBuilder {
        RequestBuilder {
            method: Method::GET,
            uri: "/".to_owned(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub(crate) fn new(
        method: Method,
        path: String,
        query: Option<&str>,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            path,
            headers,
            body,
            params: HashMap::new(),
            query: query.map(parse_query).unwrap_or_default(),
            fields: None,
            cookies: None,
            valid: None,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    /// Returns a query-string value. On repeated keys the first one wins.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn queries(&self) -> &HashMap<String, String> { &self.query }

    /// Parsed body fields, or `None` if no body parser ran.
    pub fn fields(&self) -> Option<&Map<String, Value>> { self.fields.as_ref() }

    pub fn set_fields(&mut self, fields: Map<String, Value>) {
        self.fields = Some(fields);
    }

    /// Parsed cookies, or `None` if no cookie parser ran.
    pub fn cookies(&self) -> Option<&HashMap<String, String>> { self.cookies.as_ref() }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.as_ref()?.get(name).map(String::as_str)
    }

    pub fn set_cookies(&mut self, cookies: HashMap<String, String>) {
        self.cookies = Some(cookies);
    }

    /// The values a [`Validate`](crate::middleware::Validate) middleware
    /// collected and accepted.
    pub fn valid(&self) -> Option<&ValidatedSnapshot> { self.valid.as_ref() }

    pub fn set_valid(&mut self, snapshot: ValidatedSnapshot) {
        self.valid = Some(snapshot);
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}

fn parse_query(raw: &str) -> HashMap<String, String> {
    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(raw) {
        Ok(pairs) => pairs,
        Err(e) => {
            debug!(error = %e, "ignoring malformed query string");
            return HashMap::new();
        }
    };
    let mut query = HashMap::with_capacity(pairs.len());
    for (k, v) in pairs {
        query.entry(k).or_insert(v);
    }
    query
}

// ── RequestBuilder ────────────────────────────────────────────────────────────

/// Fluent builder for [`Request`]. Defaults to `GET /`.
pub struct RequestBuilder {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Path with an optional query string, e.g. `/users?page=2`.
    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = uri.to_owned();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Terminate with a JSON body and `content-type: application/json`.
    pub fn json(self, value: &Value) -> Request {
        self.header("content-type", "application/json")
            .body(value.to_string())
            .build()
    }

    pub fn build(self) -> Request {
        let (path, query) = match self.uri.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query)),
            None => (self.uri.clone(), None),
        };
        Request::new(self.method, path, query, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_query() {
        let req = Request::builder().uri("/users?page=2&sort=name").build();
        assert_eq!(req.path(), "/users");
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query("sort"), Some("name"));
        assert_eq!(req.query("missing"), None);
    }

    #[test]
    fn first_repeated_query_key_wins() {
        let req = Request::builder().uri("/?a=1&a=2").build();
        assert_eq!(req.query("a"), Some("1"));
    }

    #[test]
    fn query_values_are_percent_decoded() {
        let req = Request::builder().uri("/?name=hello%20world&plus=a+b").build();
        assert_eq!(req.query("name"), Some("hello world"));
        assert_eq!(req.query("plus"), Some("a b"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::builder().header("Content-Type", "text/plain").build();
        assert_eq!(req.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn parsed_scopes_start_unset() {
        let req = Request::builder().build();
        assert!(req.fields().is_none());
        assert!(req.cookies().is_none());
        assert!(req.valid().is_none());
    }
}
