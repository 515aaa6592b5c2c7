//! Configuration for [`RouteSchema`] and its builder.

use std::sync::Arc;

use jsonschema::paths::Location;
use jsonschema::{Keyword, ValidationError};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::handler::{BoxedMiddleware, Middleware};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

use super::keywords;
use super::registry::RouteDescriptor;
use super::schema::RouteSchema;
use super::validate::{Locale, Target, ValidationFailure};

/// Pulls one field out of a schema option record.
pub type RecordFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;
/// Rewrites the whole record list before it is loaded.
pub type ParseFn = Arc<dyn Fn(Vec<Value>) -> Vec<Value> + Send + Sync>;
/// Produces the payload to validate for a target.
pub type DataFn = Arc<dyn Fn(&Request, Target) -> Value + Send + Sync>;
/// Splices one descriptor into a host router.
pub type AttachFn = Arc<dyn Fn(&mut Router, &RouteDescriptor) + Send + Sync>;
/// Handles a failed check. `Some` answers the request; `None` lets it
/// continue down the chain.
pub type ErrorFn =
    Arc<dyn Fn(&ValidationFailure, &mut Request, &str) -> Option<Response> + Send + Sync>;

/// Settings handed to `jsonschema::options()` for every compiled schema.
#[derive(Clone, Debug, Default)]
pub struct ValidatorOptions {
    /// Force a draft instead of detecting it from `$schema`.
    pub draft: Option<jsonschema::Draft>,
    /// Treat `format` as an assertion rather than an annotation.
    pub validate_formats: Option<bool>,
    /// Accept schemas that name formats the validator does not know.
    pub ignore_unknown_formats: Option<bool>,
}

/// Builds a custom keyword validator from its parent schema object, its
/// value, and its location in the schema.
pub type KeywordFactory = Arc<
    dyn for<'a> Fn(&'a Map<String, Value>, &'a Value, Location) -> Result<Box<dyn Keyword>, ValidationError<'a>>
        + Send
        + Sync,
>;

/// Extra vocabulary on top of the draft's own keywords.
///
/// [`enabled`](Self::enabled) turns `format` into an assertion and adds the
/// built-in `range` and `exclusiveRange` keywords. Custom formats and
/// keywords can be registered on top.
///
/// ```rust
/// use route_schema::middleware::ExtraKeywords;
///
/// let extra = ExtraKeywords::enabled()
///     .format("slug", |s| s.chars().all(|c| c.is_ascii_lowercase() || c == '-'));
/// ```
#[derive(Clone, Default)]
pub struct ExtraKeywords {
    pub(crate) enabled: bool,
    pub(crate) formats: Vec<(String, Arc<dyn Fn(&str) -> bool + Send + Sync>)>,
    pub(crate) keywords: Vec<(String, KeywordFactory)>,
}

impl ExtraKeywords {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            formats: Vec::new(),
            keywords: vec![
                ("range".to_owned(), Arc::new(keywords::range) as KeywordFactory),
                ("exclusiveRange".to_owned(), Arc::new(keywords::exclusive_range) as KeywordFactory),
            ],
        }
    }

    /// Registers a custom `format` checker, e.g. `"slug"`.
    pub fn format(
        mut self,
        name: impl Into<String>,
        check: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.enabled = true;
        self.formats.push((name.into(), Arc::new(check)));
        self
    }

    /// Registers a custom keyword. A later registration under the same name
    /// replaces an earlier one, built-ins included.
    pub fn keyword<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: for<'a> Fn(&'a Map<String, Value>, &'a Value, Location) -> Result<Box<dyn Keyword>, ValidationError<'a>>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        self.enabled = true;
        self.keywords.retain(|(existing, _)| *existing != name);
        let factory: KeywordFactory = Arc::new(factory);
        self.keywords.push((name, factory));
        self
    }
}

/// Immutable configuration shared by the registry and every generated
/// middleware.
pub struct Options {
    pub(crate) validator: ValidatorOptions,
    pub(crate) error_aggregation: bool,
    pub(crate) extra_keywords: ExtraKeywords,
    pub(crate) locale: Option<Arc<dyn Locale>>,
    pub(crate) prefix: String,
    pub(crate) strict_schemas: bool,

    pub(crate) parse_schema_options: Option<ParseFn>,
    pub(crate) get_route: RecordFn,
    pub(crate) get_method: RecordFn,
    pub(crate) get_schema: RecordFn,
    pub(crate) get_body_schema: Option<RecordFn>,
    pub(crate) get_query_schema: Option<RecordFn>,
    pub(crate) get_data: DataFn,
    pub(crate) attach_route: AttachFn,

    pub(crate) body_error_prefix: String,
    pub(crate) query_error_prefix: String,

    pub(crate) on_error: Option<ErrorFn>,
    pub(crate) not_found: Option<BoxedMiddleware>,
}

impl Options {
    pub fn prefix(&self) -> &str { &self.prefix }
    pub fn error_aggregation(&self) -> bool { self.error_aggregation }
    pub fn strict_schemas(&self) -> bool { self.strict_schemas }

    pub(crate) fn error_prefix(&self, target: Target) -> &str {
        match target {
            Target::Body => &self.body_error_prefix,
            Target::Query => &self.query_error_prefix,
        }
    }
}

fn field(name: &'static str) -> RecordFn {
    Arc::new(move |record: &Value| record.get(name).cloned())
}

impl Default for Options {
    fn default() -> Self {
        Self {
            validator: ValidatorOptions::default(),
            error_aggregation: false,
            extra_keywords: ExtraKeywords::default(),
            locale: None,
            prefix: String::new(),
            strict_schemas: false,
            parse_schema_options: None,
            get_route: field("route"),
            get_method: field("method"),
            get_schema: field("schema"),
            get_body_schema: None,
            get_query_schema: None,
            get_data: Arc::new(|req: &Request, target: Target| match target {
                Target::Body => req.body_json(),
                Target::Query => req.query_json(),
            }),
            attach_route: Arc::new(super::dispatch::attach_route),
            body_error_prefix: "body: ".to_owned(),
            query_error_prefix: "query: ".to_owned(),
            on_error: None,
            not_found: None,
        }
    }
}

/// Builder for [`RouteSchema`]. Obtain via [`RouteSchema::builder`].
///
/// ```rust
/// use route_schema::RouteSchema;
/// use serde_json::json;
///
/// let schema = RouteSchema::builder()
///     .prefix("/api")
///     .error_aggregation(true)
///     .schema_options(vec![json!({
///         "route": "/users",
///         "method": "POST",
///         "schema": {"type": "object", "required": ["name"]},
///     })])
///     .build()
///     .unwrap();
///
/// assert_eq!(schema.routes().len(), 1);
/// ```
#[derive(Default)]
pub struct RouteSchemaBuilder {
    options: Options,
    schema_options: Vec<Value>,
}

impl RouteSchemaBuilder {
    pub fn validator_options(mut self, validator: ValidatorOptions) -> Self {
        self.options.validator = validator;
        self
    }

    /// Collect every violation instead of stopping at the first, and make
    /// the default rejection carry the aggregated text.
    pub fn error_aggregation(mut self, on: bool) -> Self {
        self.options.error_aggregation = on;
        self
    }

    pub fn extra_keywords(mut self, extra: ExtraKeywords) -> Self {
        self.options.extra_keywords = extra;
        self
    }

    pub fn locale(mut self, locale: impl Locale + 'static) -> Self {
        self.options.locale = Some(Arc::new(locale));
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.prefix = prefix.into();
        self
    }

    /// Fail loading when a schema field holds malformed JSON, instead of
    /// treating that side as having no schema.
    pub fn strict_schemas(mut self, on: bool) -> Self {
        self.options.strict_schemas = on;
        self
    }

    pub fn parse_schema_options(
        mut self,
        parse: impl Fn(Vec<Value>) -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        self.options.parse_schema_options = Some(Arc::new(parse));
        self
    }

    pub fn get_route(mut self, get: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        self.options.get_route = Arc::new(get);
        self
    }

    pub fn get_method(mut self, get: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        self.options.get_method = Arc::new(get);
        self
    }

    pub fn get_schema(mut self, get: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        self.options.get_schema = Arc::new(get);
        self
    }

    pub fn get_body_schema(mut self, get: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        self.options.get_body_schema = Some(Arc::new(get));
        self
    }

    pub fn get_query_schema(mut self, get: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        self.options.get_query_schema = Some(Arc::new(get));
        self
    }

    pub fn get_data(mut self, get: impl Fn(&Request, Target) -> Value + Send + Sync + 'static) -> Self {
        self.options.get_data = Arc::new(get);
        self
    }

    pub fn attach_route(
        mut self,
        attach: impl Fn(&mut Router, &RouteDescriptor) + Send + Sync + 'static,
    ) -> Self {
        self.options.attach_route = Arc::new(attach);
        self
    }

    pub fn body_error_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.body_error_prefix = prefix.into();
        self
    }

    pub fn query_error_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.query_error_prefix = prefix.into();
        self
    }

    pub fn on_error(
        mut self,
        on_error: impl Fn(&ValidationFailure, &mut Request, &str) -> Option<Response> + Send + Sync + 'static,
    ) -> Self {
        self.options.on_error = Some(Arc::new(on_error));
        self
    }

    /// Middleware to run when the standalone dispatcher finds no route.
    pub fn not_found(mut self, mw: impl Middleware) -> Self {
        self.options.not_found = Some(Arc::new(mw));
        self
    }

    /// Records to load as soon as the instance is built.
    pub fn schema_options(mut self, records: Vec<Value>) -> Self {
        self.schema_options = records;
        self
    }

    pub fn build(self) -> Result<RouteSchema, Error> {
        let schema = RouteSchema::from_options(self.options);
        if !self.schema_options.is_empty() {
            schema.load_schema_options(self.schema_options)?;
        }
        Ok(schema)
    }
}
