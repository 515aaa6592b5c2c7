//! Route registry: descriptors built from schema option records.
//!
//! The registry is an ordered list published through an [`ArcSwap`].
//! Request handling takes a lock-free snapshot; a reload builds the next list
//! off to the side and swaps it in whole, so a request sees either the old
//! table or the new one and never a half-applied mix.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use http::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Error;
use crate::handler::BoxedMiddleware;
use crate::path::{PathPattern, create_prefix};

use super::options::Options;
use super::validate::SchemaMiddleware;

/// A route bound to its compiled validators and path matcher.
pub struct RouteDescriptor {
    route: String,
    method: Method,
    body_schema: Option<Value>,
    query_schema: Option<Value>,
    matcher: PathPattern,
    validate: Arc<SchemaMiddleware>,
}

impl RouteDescriptor {
    /// The pattern as configured, before the prefix is applied.
    pub fn route(&self) -> &str { &self.route }
    pub fn method(&self) -> &Method { &self.method }
    pub fn body_schema(&self) -> Option<&Value> { self.body_schema.as_ref() }
    pub fn query_schema(&self) -> Option<&Value> { self.query_schema.as_ref() }

    /// Matcher for the prefixed pattern.
    pub fn matcher(&self) -> &PathPattern { &self.matcher }

    /// The generated validation middleware, ready to splice into a chain.
    pub fn middleware(&self) -> BoxedMiddleware {
        Arc::clone(&self.validate) as BoxedMiddleware
    }

    pub(crate) fn validator(&self) -> &SchemaMiddleware { &self.validate }

    /// Method first, then path. Returns the extracted path parameters.
    pub fn matches(&self, method: &Method, path: &str) -> Option<HashMap<String, String>> {
        if self.method != *method {
            return None;
        }
        self.matcher.matches(path)
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("route", &self.route)
            .field("method", &self.method)
            .field("matcher", &self.matcher)
            .field("body_schema", &self.body_schema.is_some())
            .field("query_schema", &self.query_schema.is_some())
            .finish()
    }
}

pub(crate) type Snapshot = Arc<Vec<Arc<RouteDescriptor>>>;

pub(crate) struct Registry {
    routes: ArcSwap<Vec<Arc<RouteDescriptor>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self { routes: ArcSwap::from_pointee(Vec::new()) }
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        self.routes.load_full()
    }

    /// Upserts every descriptor by route string, then publishes the result.
    ///
    /// A replaced route keeps its position; a new one goes to the end.
    /// Concurrent upserts retry against each other, so none is lost.
    pub(crate) fn upsert(&self, descriptors: Vec<RouteDescriptor>) {
        let descriptors: Vec<Arc<RouteDescriptor>> = descriptors.into_iter().map(Arc::new).collect();
        self.routes.rcu(|current| {
            let mut next = Vec::clone(current);
            for descriptor in &descriptors {
                match next.iter().position(|d| d.route == descriptor.route) {
                    Some(i) => next[i] = Arc::clone(descriptor),
                    None => next.push(Arc::clone(descriptor)),
                }
            }
            next
        });
    }

    /// First descriptor, in registration order, matching `method` and `path`.
    pub(crate) fn find(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Arc<RouteDescriptor>, HashMap<String, String>)> {
        self.routes.load().iter().find_map(|d| {
            d.matches(method, path).map(|params| (Arc::clone(d), params))
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Builds the descriptor for one record, or `None` when the record has no
/// route or no usable schema.
pub(crate) fn descriptor(options: &Arc<Options>, record: &Value) -> Result<Option<RouteDescriptor>, Error> {
    let route = (options.get_route)(record)
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();
    if route.is_empty() {
        debug!("skipping schema option without route");
        return Ok(None);
    }
    let method = (options.get_method)(record)
        .and_then(|v| v.as_str().map(str::to_ascii_uppercase))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "GET".to_owned());
    let method = Method::from_bytes(method.as_bytes()).map_err(|_| Error::InvalidMethod(method))?;

    let mut body_schema = match &options.get_body_schema {
        Some(get) => schema_value(options, &route, get(record))?,
        None => None,
    };
    let mut query_schema = match &options.get_query_schema {
        Some(get) => schema_value(options, &route, get(record))?,
        None => None,
    };

    if body_schema.is_none() && query_schema.is_none() {
        let schema = schema_value(options, &route, (options.get_schema)(record))?;
        if is_write(&method) {
            body_schema = schema;
        } else {
            query_schema = schema;
        }
    }

    if body_schema.is_none() && query_schema.is_none() {
        debug!(route = %route, %method, "skipping schema option without schema");
        return Ok(None);
    }

    let matcher = PathPattern::new(&create_prefix(&options.prefix, &route))?;
    let validate = SchemaMiddleware::new(
        Arc::clone(options),
        &route,
        body_schema.as_ref(),
        query_schema.as_ref(),
    )?;

    Ok(Some(RouteDescriptor {
        route,
        method,
        body_schema,
        query_schema,
        matcher,
        validate: Arc::new(validate),
    }))
}

/// Methods whose generic schema applies to the body rather than the query.
fn is_write(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Normalizes a schema field: strings are parsed as JSON, `null` is absent.
///
/// Malformed JSON makes the schema absent, with a warning, unless strict
/// loading is on.
pub(crate) fn schema_value(
    options: &Options,
    route: &str,
    raw: Option<Value>,
) -> Result<Option<Value>, Error> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Null) => Ok(None),
            Ok(schema) => Ok(Some(schema)),
            Err(source) if options.strict_schemas => {
                Err(Error::MalformedSchema { route: route.to_owned(), source })
            }
            Err(e) => {
                warn!(route = %route, error = %e, "ignoring malformed schema");
                Ok(None)
            }
        },
        Some(schema) => Ok(Some(schema)),
    }
}
