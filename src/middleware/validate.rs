//! Middleware generation: compiled validators wrapped into one request check.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use jsonschema::Validator;
use jsonschema::error::ValidationErrorKind;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::handler::{BoxFuture, Middleware, Next};
use crate::request::Request;
use crate::response::Response;

use super::options::Options;

/// The part of a request a schema applies to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Target {
    Body,
    Query,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field-level schema violation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Violation {
    /// The keyword that failed, e.g. `required` or `type`.
    pub keyword: String,
    /// JSON pointer to the offending value; empty for the document root.
    pub instance_path: String,
    /// JSON pointer to the failing keyword inside the schema.
    pub schema_path: String,
    pub message: String,
}

impl From<jsonschema::ValidationError<'_>> for Violation {
    fn from(e: jsonschema::ValidationError<'_>) -> Self {
        let schema_path = e.schema_path.to_string();
        Self {
            keyword: keyword_name(&e.kind, &schema_path).to_owned(),
            instance_path: e.instance_path.to_string(),
            schema_path,
            message: e.to_string(),
        }
    }
}

/// The schema keyword behind an error kind. Custom keywords are named by the
/// last segment of their schema location.
fn keyword_name<'p>(kind: &ValidationErrorKind, schema_path: &'p str) -> &'p str {
    use ValidationErrorKind as K;
    match kind {
        K::AdditionalItems { .. } => "additionalItems",
        K::AdditionalProperties { .. } => "additionalProperties",
        K::AnyOf => "anyOf",
        K::BacktrackLimitExceeded { .. } | K::Pattern { .. } => "pattern",
        K::Constant { .. } => "const",
        K::Contains => "contains",
        K::ContentEncoding { .. } | K::FromUtf8 { .. } => "contentEncoding",
        K::ContentMediaType { .. } => "contentMediaType",
        K::Custom { .. } => schema_path.rsplit('/').next().unwrap_or_default(),
        K::Enum { .. } => "enum",
        K::ExclusiveMaximum { .. } => "exclusiveMaximum",
        K::ExclusiveMinimum { .. } => "exclusiveMinimum",
        K::FalseSchema => "false",
        K::Format { .. } => "format",
        K::MaxItems { .. } => "maxItems",
        K::Maximum { .. } => "maximum",
        K::MaxLength { .. } => "maxLength",
        K::MaxProperties { .. } => "maxProperties",
        K::MinItems { .. } => "minItems",
        K::Minimum { .. } => "minimum",
        K::MinLength { .. } => "minLength",
        K::MinProperties { .. } => "minProperties",
        K::MultipleOf { .. } => "multipleOf",
        K::Not { .. } => "not",
        K::OneOfMultipleValid | K::OneOfNotValid => "oneOf",
        K::PropertyNames { .. } => "propertyNames",
        K::Required { .. } => "required",
        K::Type { .. } => "type",
        K::UnevaluatedItems { .. } => "unevaluatedItems",
        K::UnevaluatedProperties { .. } => "unevaluatedProperties",
        K::UniqueItems => "uniqueItems",
        K::Referencing(_) => "$ref",
    }
}

/// Finds the `errorMessage` a schema declares for `error`.
///
/// The lookup happens in the schema object holding the failing keyword:
///
/// - `"errorMessage": "..."` replaces every error raised there
/// - `"errorMessage": {"minLength": "..."}` replaces one keyword's errors
/// - `"errorMessage": {"required": {"name": "..."}}` replaces the error for
///   one missing property
fn custom_message(schema: &Value, error: &jsonschema::ValidationError<'_>) -> Option<String> {
    let path = error.schema_path.as_str();
    let (parent, _) = path.rsplit_once('/')?;
    let keyword = keyword_name(&error.kind, path);
    match schema.pointer(parent)?.get("errorMessage")? {
        Value::String(message) => Some(message.clone()),
        Value::Object(by_keyword) => match by_keyword.get(keyword)? {
            Value::String(message) => Some(message.clone()),
            Value::Object(by_property) => {
                let ValidationErrorKind::Required { property } = &error.kind else {
                    return None;
                };
                by_property.get(property.as_str()?)?.as_str().map(str::to_owned)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Applies custom messages. Violations that end up with the same path and
/// message as an earlier overridden one are merged into it.
fn apply_custom_messages(violations: Vec<Violation>, custom: Vec<Option<String>>) -> Vec<Violation> {
    let mut seen = HashSet::new();
    violations
        .into_iter()
        .zip(custom)
        .filter_map(|(mut v, message)| {
            let Some(message) = message else { return Some(v) };
            v.message = message;
            seen.insert((v.instance_path.clone(), v.message.clone())).then_some(v)
        })
        .collect()
}

/// Rewrites violation messages, typically into another language.
///
/// Any `Fn(&mut Violation)` is a locale:
///
/// ```rust
/// use route_schema::RouteSchema;
/// use route_schema::middleware::Violation;
///
/// let _ = RouteSchema::builder().locale(|v: &mut Violation| {
///     if v.keyword == "required" {
///         v.message = "champ obligatoire manquant".to_owned();
///     }
/// });
/// ```
pub trait Locale: Send + Sync {
    fn localize(&self, violations: &mut [Violation]);
}

impl<F> Locale for F
where
    F: Fn(&mut Violation) + Send + Sync,
{
    fn localize(&self, violations: &mut [Violation]) {
        violations.iter_mut().for_each(|v| self(v));
    }
}

/// Request extension left behind by a failed check.
///
/// When body and query both fail and the error handler lets the request
/// continue, the query failure overwrites the body failure.
#[derive(Clone)]
pub struct RouteSchemaErrors {
    pub target: Target,
    pub violations: Vec<Violation>,
    /// The validator that rejected the payload.
    pub validator: Arc<Validator>,
}

impl fmt::Debug for RouteSchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSchemaErrors")
            .field("target", &self.target)
            .field("violations", &self.violations)
            .finish_non_exhaustive()
    }
}

/// The error value handed to a custom error handler.
#[derive(Clone, Debug, thiserror::Error)]
#[error("RouteSchemaErrors: {target} failed validation with {} violation(s)", .violations.len())]
pub struct ValidationFailure {
    pub target: Target,
    pub violations: Vec<Violation>,
}

/// Joins violations into one line each, `{prefix}{instance_path} {message}`.
///
/// The instance path is left out for violations at the document root.
pub fn errors_text(violations: &[Violation], prefix: &str) -> String {
    violations
        .iter()
        .map(|v| {
            if v.instance_path.is_empty() {
                format!("{prefix}{}", v.message)
            } else {
                format!("{prefix}{} {}", v.instance_path, v.message)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compiles `schema` with the configured validator settings.
pub(crate) fn compile(options: &Options, route: &str, schema: &Value) -> Result<Validator, Error> {
    let mut opts = jsonschema::options();
    if let Some(draft) = options.validator.draft {
        opts.with_draft(draft);
    }
    if let Some(ignore) = options.validator.ignore_unknown_formats {
        opts.should_ignore_unknown_formats(ignore);
    }
    let extra = &options.extra_keywords;
    if let Some(on) = options.validator.validate_formats.or(extra.enabled.then_some(true)) {
        opts.should_validate_formats(on);
    }
    for (name, check) in &extra.formats {
        let check = Arc::clone(check);
        opts.with_format(name.clone(), move |s: &str| check(s));
    }
    for (name, factory) in &extra.keywords {
        let factory = Arc::clone(factory);
        opts.with_keyword(name.clone(), move |parent, value, location| factory(parent, value, location));
    }
    opts.build(schema).map_err(|e| Error::SchemaCompile {
        route: route.to_owned(),
        reason: e.to_string(),
    })
}

/// Validates the body and/or query of a request before handing it on.
///
/// Produced by [`RouteSchema::route_middleware`](crate::RouteSchema::route_middleware)
/// and friends, and generated for every registered route. Body is checked
/// before query.
pub struct SchemaMiddleware {
    options: Arc<Options>,
    body: Option<Compiled>,
    query: Option<Compiled>,
}

struct Compiled {
    validator: Arc<Validator>,
    schema: Value,
}

impl Compiled {
    fn new(options: &Options, route: &str, schema: &Value) -> Result<Self, Error> {
        let validator = Arc::new(compile(options, route, schema)?);
        Ok(Self { validator, schema: schema.clone() })
    }
}

impl SchemaMiddleware {
    pub(crate) fn new(
        options: Arc<Options>,
        route: &str,
        body: Option<&Value>,
        query: Option<&Value>,
    ) -> Result<Self, Error> {
        let body = body.map(|s| Compiled::new(&options, route, s)).transpose()?;
        let query = query.map(|s| Compiled::new(&options, route, s)).transpose()?;
        Ok(Self { options, body, query })
    }

    pub fn validates_body(&self) -> bool { self.body.is_some() }
    pub fn validates_query(&self) -> bool { self.query.is_some() }

    /// Runs the checks. `Some` is the response that ends the request.
    pub fn check(&self, req: &mut Request) -> Option<Response> {
        let targets = [(Target::Body, &self.body), (Target::Query, &self.query)];
        for (target, compiled) in targets {
            let Some(compiled) = compiled else { continue };
            if let Some(res) = self.check_one(req, target, compiled) {
                return Some(res);
            }
        }
        None
    }

    fn check_one(&self, req: &mut Request, target: Target, compiled: &Compiled) -> Option<Response> {
        let validator = &compiled.validator;
        let data = (self.options.get_data)(&*req, target);
        if validator.is_valid(&data) {
            return None;
        }

        // Schema-declared messages need every error, so they only apply
        // with aggregation on.
        let aggregate = self.options.error_aggregation;
        let limit = if aggregate { usize::MAX } else { 1 };
        let mut violations = Vec::new();
        let mut custom = Vec::new();
        for error in validator.iter_errors(&data).take(limit) {
            custom.push(if aggregate { custom_message(&compiled.schema, &error) } else { None });
            violations.push(Violation::from(error));
        }
        if let Some(locale) = &self.options.locale {
            locale.localize(&mut violations);
        }
        let violations = apply_custom_messages(violations, custom);

        let text = errors_text(&violations, self.options.error_prefix(target));
        debug!(
            method = %req.method(),
            path = %req.path(),
            %target,
            violations = violations.len(),
            "request failed schema validation"
        );

        req.extensions_mut().insert(RouteSchemaErrors {
            target,
            violations: violations.clone(),
            validator: Arc::clone(validator),
        });

        let failure = ValidationFailure { target, violations };
        match &self.options.on_error {
            Some(on_error) => on_error(&failure, req, &text),
            None => Some(self.reject(&text)),
        }
    }

    fn reject(&self, text: &str) -> Response {
        let body = if self.options.error_aggregation { text } else { "request validation failed" };
        Response::builder().status(StatusCode::BAD_REQUEST).text(body)
    }
}

impl Middleware for SchemaMiddleware {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        match self.check(&mut req) {
            Some(res) => Box::pin(async move { res }),
            None => next.run(req),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::options::ExtraKeywords;
    use bytes::Bytes;
    use serde_json::json;

    fn request(uri: &str, body: Value) -> Request {
        http::Request::builder()
            .method("POST")
            .uri(uri)
            .body(Bytes::from(body.to_string()))
            .unwrap()
            .into()
    }

    fn name_schema() -> Value {
        json!({"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}})
    }

    fn middleware(options: Options, body: Option<Value>, query: Option<Value>) -> SchemaMiddleware {
        SchemaMiddleware::new(Arc::new(options), "/test", body.as_ref(), query.as_ref()).unwrap()
    }

    #[test]
    fn valid_body_passes_without_errors() {
        let mw = middleware(Options::default(), Some(name_schema()), None);
        let mut req = request("/users", json!({"name": "a"}));
        assert!(mw.check(&mut req).is_none());
        assert!(req.extensions().get::<RouteSchemaErrors>().is_none());
    }

    #[test]
    fn missing_required_field_rejects_with_400() {
        let mw = middleware(Options::default(), Some(name_schema()), None);
        let mut req = request("/users", json!({}));
        let res = mw.check(&mut req).unwrap();
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(res.body(), b"request validation failed");

        let errors = req.extensions().get::<RouteSchemaErrors>().unwrap();
        assert_eq!(errors.target, Target::Body);
        assert_eq!(errors.violations.len(), 1);
        assert_eq!(errors.violations[0].keyword, "required");
    }

    #[test]
    fn aggregation_collects_every_violation_into_the_text() {
        let options = Options { error_aggregation: true, ..Options::default() };
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}, "age": {"type": "integer"}},
        });
        let mw = middleware(options, Some(schema), None);
        let mut req = request("/users", json!({"name": 1, "age": "x"}));
        let res = mw.check(&mut req).unwrap();

        let text = String::from_utf8(res.body().to_vec()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("body: /")));
        assert!(text.contains("/name"));
        assert!(text.contains("/age"));
    }

    #[test]
    fn query_is_checked_with_its_own_prefix() {
        let options = Options {
            error_aggregation: true,
            query_error_prefix: "q> ".to_owned(),
            ..Options::default()
        };
        let mw = middleware(options, None, Some(json!({"type": "object", "required": ["page"]})));
        let mut req = request("/items?size=1", json!({}));
        let res = mw.check(&mut req).unwrap();
        assert!(String::from_utf8_lossy(res.body()).starts_with("q> "));
        assert_eq!(req.extensions().get::<RouteSchemaErrors>().unwrap().target, Target::Query);
    }

    #[test]
    fn continuing_error_handler_lets_the_last_failure_win() {
        let options = Options {
            on_error: Some(Arc::new(|_: &ValidationFailure, _: &mut Request, _: &str| -> Option<Response> {
                None
            })),
            ..Options::default()
        };
        let mw = middleware(
            options,
            Some(name_schema()),
            Some(json!({"type": "object", "required": ["page"]})),
        );
        let mut req = request("/items", json!({}));
        assert!(mw.check(&mut req).is_none());
        let errors = req.extensions().get::<RouteSchemaErrors>().unwrap();
        assert_eq!(errors.target, Target::Query);
    }

    #[test]
    fn error_handler_sees_failure_and_text() {
        let options = Options {
            on_error: Some(Arc::new(|failure: &ValidationFailure, _: &mut Request, text: &str| {
                assert_eq!(failure.target, Target::Body);
                assert!(failure.to_string().starts_with("RouteSchemaErrors"));
                Some(Response::builder().status(StatusCode::UNPROCESSABLE_ENTITY).text(text))
            })),
            ..Options::default()
        };
        let mw = middleware(options, Some(name_schema()), None);
        let res = mw.check(&mut request("/users", json!({}))).unwrap();
        assert_eq!(res.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(String::from_utf8_lossy(res.body()).starts_with("body: "));
    }

    #[test]
    fn locale_rewrites_messages() {
        let options = Options {
            error_aggregation: true,
            locale: Some(Arc::new(|v: &mut Violation| v.message = format!("[{}]", v.keyword))),
            ..Options::default()
        };
        let mw = middleware(options, Some(name_schema()), None);
        let res = mw.check(&mut request("/users", json!({}))).unwrap();
        assert_eq!(res.body(), b"body: [required]");
    }

    #[test]
    fn extra_formats_are_asserted() {
        let options = Options {
            extra_keywords: ExtraKeywords::default()
                .format("slug", |s| s.chars().all(|c| c.is_ascii_lowercase() || c == '-')),
            ..Options::default()
        };
        let schema = json!({"type": "object", "properties": {"id": {"type": "string", "format": "slug"}}});
        let mw = middleware(options, Some(schema), None);
        assert!(mw.check(&mut request("/p", json!({"id": "hello-world"}))).is_none());
        assert!(mw.check(&mut request("/p", json!({"id": "Hello World"}))).is_some());
    }

    #[test]
    fn extra_keywords_enable_range() {
        let options = Options { extra_keywords: ExtraKeywords::enabled(), ..Options::default() };
        let schema = json!({"type": "object", "properties": {"n": {"type": "integer", "range": [1, 5]}}});
        let mw = middleware(options, Some(schema), None);

        assert!(mw.check(&mut request("/n", json!({"n": 3}))).is_none());

        let mut req = request("/n", json!({"n": 99}));
        assert_eq!(mw.check(&mut req).unwrap().status_code(), StatusCode::BAD_REQUEST);
        let errors = req.extensions().get::<RouteSchemaErrors>().unwrap();
        assert_eq!(errors.violations[0].keyword, "range");
        assert_eq!(errors.violations[0].instance_path, "/n");
    }

    #[test]
    fn custom_keywords_can_be_registered() {
        use jsonschema::Keyword;

        struct Even;
        impl Keyword for Even {
            fn validate<'i>(
                &self,
                instance: &'i Value,
                location: &jsonschema::paths::LazyLocation,
            ) -> Result<(), jsonschema::ValidationError<'i>> {
                if self.is_valid(instance) {
                    return Ok(());
                }
                Err(jsonschema::ValidationError::custom(
                    jsonschema::paths::Location::new(),
                    location.into(),
                    instance,
                    "must be even",
                ))
            }

            fn is_valid(&self, instance: &Value) -> bool {
                instance.as_u64().is_some_and(|n| n % 2 == 0)
            }
        }

        let options = Options {
            extra_keywords: ExtraKeywords::default().keyword("even", |_, _, _| Ok(Box::new(Even))),
            ..Options::default()
        };
        let mw = middleware(options, Some(json!({"properties": {"n": {"even": true}}})), None);
        assert!(mw.check(&mut request("/n", json!({"n": 4}))).is_none());
        assert!(mw.check(&mut request("/n", json!({"n": 5}))).is_some());
    }

    #[test]
    fn keyword_comes_from_the_error_kind() {
        let options = Options { error_aggregation: true, ..Options::default() };
        let schema = json!({
            "$defs": {"age": {"type": "integer"}},
            "properties": {"age": {"$ref": "#/$defs/age"}, "legacy": false},
        });
        let mw = middleware(options, Some(schema), None);
        let mut req = request("/users", json!({"age": "old", "legacy": 1}));
        mw.check(&mut req).unwrap();

        let errors = req.extensions().get::<RouteSchemaErrors>().unwrap();
        let mut keywords: Vec<(&str, &str)> = errors
            .violations
            .iter()
            .map(|v| (v.instance_path.as_str(), v.keyword.as_str()))
            .collect();
        keywords.sort();
        assert_eq!(keywords, vec![("/age", "type"), ("/legacy", "false")]);
    }

    #[test]
    fn without_extra_keywords_range_is_an_annotation() {
        let schema = json!({"properties": {"n": {"range": [1, 5]}}});
        let mw = middleware(Options::default(), Some(schema), None);
        assert!(mw.check(&mut request("/n", json!({"n": 99}))).is_none());
    }

    #[test]
    fn schema_error_messages_replace_defaults() {
        let options = Options { error_aggregation: true, ..Options::default() };
        let schema = json!({
            "type": "object",
            "required": ["name", "email"],
            "properties": {
                "age": {"type": "integer", "minimum": 0, "errorMessage": "age must be a positive integer"},
                "nick": {"type": "string", "minLength": 3, "errorMessage": {"minLength": "nick is too short"}},
            },
            "errorMessage": {"required": {"name": "name is mandatory"}},
        });
        let mw = middleware(options, Some(schema), None);

        let res = mw.check(&mut request("/users", json!({"email": "a@b.c"}))).unwrap();
        assert_eq!(res.body(), b"body: name is mandatory");

        let res = mw
            .check(&mut request("/users", json!({"name": "a", "email": "a@b.c", "age": -1.5, "nick": "x"})))
            .unwrap();
        let text = String::from_utf8_lossy(res.body()).into_owned();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["body: /age age must be a positive integer", "body: /nick nick is too short"]);
    }

    #[test]
    fn unmatched_property_keeps_the_default_message() {
        let options = Options { error_aggregation: true, ..Options::default() };
        let schema = json!({
            "required": ["name", "email"],
            "errorMessage": {"required": {"name": "name is mandatory"}},
        });
        let mw = middleware(options, Some(schema), None);
        let res = mw.check(&mut request("/users", json!({"name": "a"}))).unwrap();
        assert_eq!(res.body(), b"body: \"email\" is a required property");
    }

    #[test]
    fn schema_error_messages_need_aggregation() {
        let schema = json!({"required": ["name"], "errorMessage": "custom"});
        let mw = middleware(Options::default(), Some(schema), None);
        let mut req = request("/users", json!({}));
        mw.check(&mut req).unwrap();
        let errors = req.extensions().get::<RouteSchemaErrors>().unwrap();
        assert_eq!(errors.violations[0].message, "\"name\" is a required property");
    }

    #[test]
    fn uncompilable_schema_is_an_error() {
        let err = SchemaMiddleware::new(
            Arc::new(Options::default()),
            "/bad",
            Some(&json!({"type": "no-such-type"})),
            None,
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::SchemaCompile { ref route, .. } if route == "/bad"));
    }

    #[test]
    fn errors_text_omits_empty_root_path() {
        let violations = vec![
            Violation {
                keyword: "required".into(),
                instance_path: String::new(),
                schema_path: "/required".into(),
                message: "\"name\" is a required property".into(),
            },
            Violation {
                keyword: "type".into(),
                instance_path: "/age".into(),
                schema_path: "/properties/age/type".into(),
                message: "\"x\" is not of type \"integer\"".into(),
            },
        ];
        assert_eq!(
            errors_text(&violations, "body: "),
            "body: \"name\" is a required property\nbody: /age \"x\" is not of type \"integer\""
        );
    }
}
