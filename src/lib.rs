//! # route-schema
//!
//! Route-aware JSON-Schema validation for HTTP request bodies and query
//! strings.
//!
//! Declare, per route and method, a schema the incoming data must satisfy.
//! Requests that fail never reach the handler: they are answered with a
//! `400 Bad Request` (or whatever your `on_error` hook decides) and the
//! violations are left on the request for anything further down the chain.
//!
//! The crate ships the small host it plugs into:
//!
//! - Radix-tree routing via [`matchit`], with per-route middleware chains
//! - Async I/O on tokio + hyper (HTTP/1.1 and HTTP/2)
//! - Graceful shutdown on SIGTERM / Ctrl-C
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use route_schema::{Request, Response, RouteSchema, Router, Server};
//! use http::StatusCode;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), route_schema::Error> {
//!     let schema = RouteSchema::builder()
//!         .prefix("/api")
//!         .schema_options(vec![json!({
//!             "route": "/users",
//!             "method": "POST",
//!             "schema": {"type": "object", "required": ["name"]},
//!         })])
//!         .build()?;
//!
//!     let mut app = Router::with_prefix("/api")
//!         .get("/users/:id", get_user)
//!         .post("/users", create_user);
//!     schema.attach_to_router(&mut app);
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//!
//! async fn create_user(_req: Request) -> Response {
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/api/users/99")
//!         .no_body()
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;
pub mod path;

pub use error::Error;
pub use handler::{BoxFuture, BoxedMiddleware, FromFn, Handler, Middleware, Next, from_fn};
pub use middleware::{RouteSchema, RouteSchemaBuilder, RouteSchemaErrors};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{Route, Router};
pub use server::{DEFAULT_BODY_LIMIT, Server};
