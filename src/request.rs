//! Incoming HTTP request type.
//!
//! [`Request`] doubles as the per-request context: middleware can stash
//! typed values in its [`Extensions`] for handlers further down the chain.
//! That is where schema validation leaves its errors.

use std::collections::HashMap;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method};
use serde_json::{Map, Value};

/// An incoming HTTP request with its body fully buffered.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) extensions: Extensions,
}

impl Request {
    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    /// Adds path parameters without overwriting ones the router already set.
    pub(crate) fn merge_params(&mut self, params: HashMap<String, String>) {
        for (k, v) in params {
            self.params.entry(k).or_insert(v);
        }
    }

    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// The query string decoded into a JSON object.
    ///
    /// Every value is a string; a key that appears more than once becomes an
    /// array of strings. A missing query string yields `{}`.
    pub fn query_json(&self) -> Value {
        Value::Object(decode_form(self.query.as_deref().unwrap_or("").as_bytes()))
    }

    /// The body decoded into a JSON value.
    ///
    /// - empty body: `{}`
    /// - `application/x-www-form-urlencoded`: decoded like [`query_json`](Self::query_json)
    /// - anything else: parsed as JSON, `null` when that fails
    pub fn body_json(&self) -> Value {
        if self.body.is_empty() {
            return Value::Object(Map::new());
        }
        let is_form = self
            .header("content-type")
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if is_form {
            return Value::Object(decode_form(&self.body));
        }
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body,
            params: HashMap::new(),
            extensions: parts.extensions,
        }
    }
}

fn decode_form(input: &[u8]) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        let value = Value::String(value.into_owned());
        match out.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                out.insert(key.into_owned(), value);
            }
        }
    }
    out
}
