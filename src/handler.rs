//! Handler and middleware traits, type erasure, and the [`Next`] chain.
//!
//! # How async handlers are stored
//!
//! The router needs to hold handlers of *different* types in a single
//! route table. Rust collections can only hold one concrete type, so we use
//! **trait objects** (`dyn ErasedHandler`, `dyn Middleware`) to hide the
//! concrete type behind a common interface and store everything uniformly.
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ router.get("/", hello)
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time               ← one vtable dispatch
//! ```
//!
//! # How middleware runs
//!
//! A route owns a chain of [`BoxedMiddleware`] in front of its handler.
//! Each middleware receives the request and a [`Next`]; calling
//! [`Next::run`] hands the request to the following link. Returning a
//! response without calling `next` short-circuits the chain. That is how a
//! failed schema check turns into a `400` before the handler ever runs.
//!
//! ```text
//! layer[0] ─ next.run ─▶ layer[1] ─ next.run ─▶ … ─▶ handler
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// `Send + 'static` let tokio move the future across threads safely.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// The trait is **sealed** (via the private `Sealed` supertrait).
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype wrapper that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Middleware ────────────────────────────────────────────────────────────────

/// A link in a request-handling chain.
///
/// Implement this directly for middleware that carries state (the schema
/// validators do), or wrap a plain `async fn(Request, Next)` with
/// [`from_fn`].
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

/// A type-erased middleware shared between every route it is attached to.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Adapts an `async fn(Request, Next) -> impl IntoResponse` into a
/// [`Middleware`].
///
/// ```rust
/// use route_schema::{from_fn, Next, Request, Response};
/// use http::StatusCode;
///
/// async fn require_auth(req: Request, next: Next) -> Response {
///     if req.header("authorization").is_none() {
///         return Response::status(StatusCode::UNAUTHORIZED);
///     }
///     next.run(req).await
/// }
///
/// let _ = from_fn(require_auth);
/// ```
pub fn from_fn<F, Fut, R>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    FromFn(f)
}

/// Middleware built by [`from_fn`].
pub struct FromFn<F>(F);

impl<F, Fut, R> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let fut = (self.0)(req, next);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The remainder of a middleware chain.
///
/// Cloning the chain is one `Arc` increment; walking it is an index bump.
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    index: usize,
    endpoint: BoxedHandler,
}

impl Next {
    /// A chain of `middlewares` that ends in `endpoint`.
    pub fn new(chain: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { chain, index: 0, endpoint }
    }

    /// A chain with no middleware left: `run` goes straight to `handler`.
    pub fn handler(handler: impl Handler) -> Self {
        Self::new(Arc::from(Vec::new()), handler.into_boxed_handler())
    }

    /// Passes `req` to the next link, or to the endpoint once the chain is
    /// exhausted.
    pub fn run(mut self, req: Request) -> BoxFuture {
        match self.chain.get(self.index).cloned() {
            Some(mw) => {
                self.index += 1;
                mw.call(req, self)
            }
            None => self.endpoint.call(req),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;

    fn request() -> Request {
        http::Request::builder().uri("/").body(Bytes::new()).unwrap().into()
    }

    async fn endpoint(req: Request) -> String {
        format!("endpoint:{}", req.header("x-trail").unwrap_or(""))
    }

    async fn append_a(mut req: Request, next: Next) -> Response {
        req.headers.insert("x-trail", "a".parse().unwrap());
        next.run(req).await
    }

    async fn stop(_req: Request, _next: Next) -> StatusCode {
        StatusCode::FORBIDDEN
    }

    #[tokio::test]
    async fn runs_chain_in_order_then_endpoint() {
        let chain: Arc<[BoxedMiddleware]> = Arc::from(vec![Arc::new(from_fn(append_a)) as BoxedMiddleware]);
        let res = Next::new(chain, endpoint.into_boxed_handler()).run(request()).await;
        assert_eq!(res.body(), b"endpoint:a");
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let chain: Arc<[BoxedMiddleware]> = Arc::from(vec![
            Arc::new(from_fn(stop)) as BoxedMiddleware,
            Arc::new(from_fn(append_a)) as BoxedMiddleware,
        ]);
        let res = Next::new(chain, endpoint.into_boxed_handler()).run(request()).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn empty_chain_goes_straight_to_handler() {
        let res = Next::handler(endpoint).run(request()).await;
        assert_eq!(res.body(), b"endpoint:");
    }
}
