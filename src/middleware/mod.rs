//! JSON-Schema request validation.
//!
//! Route schemas come from option records, typically a JSON file:
//!
//! ```json
//! [
//!   { "route": "/users/:id", "method": "GET",  "schema": { "type": "object" } },
//!   { "route": "/users",     "method": "POST", "schema": "{\"required\":[\"name\"]}" }
//! ]
//! ```
//!
//! Each record becomes a [`RouteDescriptor`] in the registry. A generic
//! `schema` applies to the body for `POST`, `PUT` and `PATCH` and to the
//! query string otherwise; configure `get_body_schema` / `get_query_schema`
//! on the builder to validate both sides of one route.
//!
//! Wire the registry in one of two ways:
//!
//! ```rust,no_run
//! use route_schema::{Request, RouteSchema, Router};
//!
//! # async fn create_user(_: Request) -> &'static str { "" }
//! let schema = RouteSchema::builder().build().unwrap();
//! schema.load_schema_file("schemas.json").unwrap();
//!
//! // standalone: one layer, linear scan per request
//! let app = Router::new()
//!     .layer(schema.middleware())
//!     .post("/users", create_user);
//!
//! // attached: validators spliced into the matching routes
//! let mut app = Router::new().post("/users", create_user);
//! schema.attach_to_router(&mut app);
//! ```
//!
//! A failed check answers `400 Bad Request` unless an `on_error` handler says
//! otherwise, and leaves [`RouteSchemaErrors`] in the request extensions.
//!
//! Malformed JSON in a schema string is treated as "no schema" (with a
//! warning) so one bad record does not take down startup; enable
//! `strict_schemas` to make it an error instead. A schema that parses but
//! does not compile is always an error.

mod dispatch;
mod keywords;
mod options;
mod registry;
mod schema;
mod validate;

pub use dispatch::{LegacyMiddleware, ScanMiddleware, attach_route};
pub use options::{
    AttachFn, DataFn, ErrorFn, ExtraKeywords, KeywordFactory, Options, ParseFn, RecordFn,
    RouteSchemaBuilder, ValidatorOptions,
};
pub use registry::RouteDescriptor;
pub use schema::RouteSchema;
pub use validate::{
    Locale, RouteSchemaErrors, SchemaMiddleware, Target, ValidationFailure, Violation, errors_text,
};
