//! Radix-tree request router with per-route middleware chains.
//!
//! One tree per HTTP method, O(path-length) lookup. The tree stores an
//! index into a flat route table; each entry in that table owns the
//! middleware chain and handler for its route. Keeping the chains in a
//! table rather than inside the tree is what lets code outside the router,
//! such as [`RouteSchema::attach_to_router`](crate::RouteSchema::attach_to_router),
//! walk the registered routes and splice validators into them.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, BoxedMiddleware, ErasedHandler, Handler, Middleware, Next};
use crate::path::{create_prefix, normalize};
use crate::request::Request;
use crate::response::Response;

/// A registered route: method, pattern, middleware chain and handler.
pub struct Route {
    method: Method,
    pattern: String,
    chain: Arc<[BoxedMiddleware]>,
    handler: BoxedHandler,
}

impl Route {
    pub fn method(&self) -> &Method { &self.method }

    /// The pattern as registered, without the router prefix.
    pub fn pattern(&self) -> &str { &self.pattern }

    /// Middleware that runs before the handler, outermost first.
    pub fn middlewares(&self) -> &[BoxedMiddleware] { &self.chain }

    /// Inserts `mw` at the front of the chain so it runs before everything
    /// already attached.
    pub fn prepend(&mut self, mw: BoxedMiddleware) {
        let mut chain = Vec::with_capacity(self.chain.len() + 1);
        chain.push(mw);
        chain.extend(self.chain.iter().cloned());
        self.chain = Arc::from(chain);
    }

    /// Appends `mw` to the end of the chain, just before the handler.
    pub fn push(&mut self, mw: BoxedMiddleware) {
        let mut chain = self.chain.to_vec();
        chain.push(mw);
        self.chain = Arc::from(chain);
    }
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each registration returns `self` so calls chain naturally.
pub struct Router {
    prefix: String,
    routes: Vec<Route>,
    trees: HashMap<Method, MatchitRouter<usize>>,
    layers: Arc<[BoxedMiddleware]>,
}

impl Router {
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    /// A router whose patterns all live under `prefix`.
    ///
    /// `Router::with_prefix("/api").get("/users/:id", h)` serves
    /// `/api/users/42`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            routes: Vec::new(),
            trees: HashMap::new(),
            layers: Arc::from(Vec::new()),
        }
    }

    pub fn prefix(&self) -> &str { &self.prefix }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` or `:name` syntax; `req.param("name")`
    /// retrieves them:
    ///
    /// ```rust
    /// # use route_schema::{Request, Response, Router};
    /// # use http::Method;
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or conflicts with a route
    /// already registered for `method`.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, Vec::new(), handler)
    }

    /// Like [`on`](Self::on), with route-specific middleware in front of the
    /// handler. `middlewares[0]` runs first.
    pub fn on_with(
        self,
        method: Method,
        path: &str,
        middlewares: Vec<BoxedMiddleware>,
        handler: impl Handler,
    ) -> Self {
        self.add(method, path, middlewares, handler)
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self { self.on(Method::GET, path, handler) }
    pub fn post(self, path: &str, handler: impl Handler) -> Self { self.on(Method::POST, path, handler) }
    pub fn put(self, path: &str, handler: impl Handler) -> Self { self.on(Method::PUT, path, handler) }
    pub fn patch(self, path: &str, handler: impl Handler) -> Self { self.on(Method::PATCH, path, handler) }
    pub fn delete(self, path: &str, handler: impl Handler) -> Self { self.on(Method::DELETE, path, handler) }

    /// Adds middleware that runs for every request, before routing.
    ///
    /// Layers run in the order they were added.
    pub fn layer(mut self, mw: impl Middleware) -> Self {
        let mut layers = self.layers.to_vec();
        layers.push(Arc::new(mw));
        self.layers = Arc::from(layers);
        self
    }

    pub fn routes(&self) -> &[Route] { &self.routes }

    /// Mutable access to the route table, for splicing middleware into
    /// already-registered routes.
    pub fn routes_mut(&mut self) -> &mut [Route] { &mut self.routes }

    fn add(
        mut self,
        method: Method,
        path: &str,
        middlewares: Vec<BoxedMiddleware>,
        handler: impl Handler,
    ) -> Self {
        let index = self.routes.len();
        let full = normalize(&create_prefix(&self.prefix, path));
        self.trees
            .entry(method.clone())
            .or_default()
            .insert(full, index)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.routes.push(Route {
            method,
            pattern: path.to_owned(),
            chain: Arc::from(middlewares),
            handler: handler.into_boxed_handler(),
        });
        self
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(&Route, HashMap<String, String>)> {
        let tree = self.trees.get(method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((&self.routes[*matched.value], params))
    }

    /// Runs `req` through the global layers, then the matched route's chain
    /// and handler. Unmatched requests get `404 Not Found` once the layers
    /// have had their turn.
    pub fn dispatch(self: Arc<Self>, req: Request) -> BoxFuture {
        let layers = Arc::clone(&self.layers);
        Next::new(layers, Arc::new(Routed(self))).run(req)
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// The endpoint at the end of the global layers: route lookup itself.
struct Routed(Arc<Router>);

impl ErasedHandler for Routed {
    fn call(&self, mut req: Request) -> BoxFuture {
        match self.0.lookup(&req.method, &req.path) {
            Some((route, params)) => {
                req.params.extend(params);
                Next::new(Arc::clone(&route.chain), Arc::clone(&route.handler)).run(req)
            }
            None => {
                tracing::debug!(method = %req.method, path = %req.path, "no route matched");
                Box::pin(async { Response::status(StatusCode::NOT_FOUND) })
            }
        }
    }
}
