//! [`RouteSchema`]: the entry point tying options, registry and dispatch
//! together.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use http::Method;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Error;
use crate::path::same_prefix;
use crate::router::Router;

use super::dispatch::{LegacyMiddleware, ScanMiddleware};
use super::options::{Options, RouteSchemaBuilder};
use super::registry::{self, Registry, RouteDescriptor};
use super::validate::SchemaMiddleware;

/// Route-aware JSON-Schema request validation.
///
/// Built once at startup with [`RouteSchema::builder`]. Route schemas are
/// loaded from option records and can be reloaded at any time; request
/// handling always sees a consistent snapshot of the registry.
pub struct RouteSchema {
    options: Arc<Options>,
    registry: Arc<Registry>,
}

impl RouteSchema {
    pub fn builder() -> RouteSchemaBuilder {
        RouteSchemaBuilder::default()
    }

    pub(crate) fn from_options(options: Options) -> Self {
        Self { options: Arc::new(options), registry: Arc::new(Registry::new()) }
    }

    pub fn options(&self) -> &Options { &self.options }

    /// Loads schema option records into the registry.
    ///
    /// Each record yields at most one descriptor; records with no route or
    /// no schema are skipped. A descriptor replaces any existing one with the
    /// same route string. Either every record loads and the new registry is
    /// published, or an error is returned and the registry is left as it was.
    pub fn load_schema_options(&self, records: Vec<Value>) -> Result<(), Error> {
        let records = match &self.options.parse_schema_options {
            Some(parse) => parse(records),
            None => records,
        };

        let mut descriptors = Vec::with_capacity(records.len());
        for record in &records {
            if let Some(d) = registry::descriptor(&self.options, record)? {
                descriptors.push(d);
            }
        }

        let loaded = descriptors.len();
        self.registry.upsert(descriptors);
        info!(records = records.len(), loaded, total = self.registry.snapshot().len(), "route schemas loaded");
        Ok(())
    }

    /// Loads a JSON array of schema option records.
    pub fn load_schema_json(&self, json: &str) -> Result<(), Error> {
        let records: Vec<Value> = serde_json::from_str(json)?;
        self.load_schema_options(records)
    }

    /// Reads a file holding a JSON array of schema option records.
    pub fn load_schema_file(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let json = std::fs::read_to_string(path)?;
        self.load_schema_json(&json)
    }

    /// The current registry, in registration order.
    pub fn routes(&self) -> Arc<Vec<Arc<RouteDescriptor>>> {
        self.registry.snapshot()
    }

    /// First registered route matching `method` and `path`, with the
    /// extracted path parameters.
    pub fn find(&self, method: &Method, path: &str) -> Option<(Arc<RouteDescriptor>, HashMap<String, String>)> {
        self.registry.find(method, path)
    }

    // ── Standalone dispatch ──────────────────────────────────────────────────

    /// A global middleware that matches every request against the registry.
    ///
    /// Simple to set up and independent of any router, but costs a linear
    /// scan per request. Prefer [`attach_to_router`](Self::attach_to_router)
    /// for large route tables.
    pub fn middleware(&self) -> ScanMiddleware {
        ScanMiddleware {
            options: Arc::clone(&self.options),
            registry: Arc::clone(&self.registry),
        }
    }

    /// The standalone scan in handler-wrapper form, for hosts without a
    /// middleware chain.
    pub fn legacy_middleware(&self) -> LegacyMiddleware {
        LegacyMiddleware { scan: self.middleware() }
    }

    // ── Router attachment ────────────────────────────────────────────────────

    /// Splices every registered validator into `router`'s matching routes.
    ///
    /// Routes registered in `router` after this call are not covered, and
    /// neither are registry reloads; attach again after either.
    pub fn attach_to_router(&self, router: &mut Router) {
        if !same_prefix(&self.options.prefix, router.prefix()) {
            warn!(
                prefix = %self.options.prefix,
                router_prefix = %router.prefix(),
                "attach_to_router: schema prefix differs from router prefix"
            );
        }
        for descriptor in self.registry.snapshot().iter() {
            (self.options.attach_route)(&mut *router, &**descriptor);
        }
    }

    // ── Per-route middleware ─────────────────────────────────────────────────

    /// A validator for one route's body and/or query, outside the registry.
    pub fn route_middleware(
        &self,
        body_schema: Option<Value>,
        query_schema: Option<Value>,
    ) -> Result<SchemaMiddleware, Error> {
        SchemaMiddleware::new(
            Arc::clone(&self.options),
            "<route middleware>",
            body_schema.as_ref(),
            query_schema.as_ref(),
        )
    }

    pub fn route_body_middleware(&self, schema: Value) -> Result<SchemaMiddleware, Error> {
        self.route_middleware(Some(schema), None)
    }

    pub fn route_query_middleware(&self, schema: Value) -> Result<SchemaMiddleware, Error> {
        self.route_middleware(None, Some(schema))
    }
}
