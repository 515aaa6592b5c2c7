//! The two ways validation joins the request lifecycle.
//!
//! **Standalone** ([`ScanMiddleware`]): one global layer scans the registry
//! on every request. It works with any router, or none, at O(routes) per
//! request.
//!
//! **Attached** ([`attach_route`]): each descriptor's validator is spliced
//! into the host router's own route chains, so the router's radix lookup
//! does the matching and no second scan happens.

use std::sync::Arc;

use tracing::debug;

use crate::handler::{BoxFuture, BoxedHandler, Handler, Middleware, Next};
use crate::path::create_prefix;
use crate::request::Request;
use crate::router::Router;

use super::options::Options;
use super::registry::{RouteDescriptor, Registry};

/// Global middleware that validates whatever registered route a request
/// matches. Obtain via [`RouteSchema::middleware`](crate::RouteSchema::middleware).
///
/// Descriptors are tried in registration order and the first one whose
/// method and path both match wins. Reloads are picked up on the next
/// request.
#[derive(Clone)]
pub struct ScanMiddleware {
    pub(crate) options: Arc<Options>,
    pub(crate) registry: Arc<Registry>,
}

impl Middleware for ScanMiddleware {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let routes = self.registry.snapshot();
        for route in routes.iter() {
            if route.method() != req.method() {
                continue;
            }
            let Some(params) = route.matcher().matches(req.path()) else {
                continue;
            };
            req.merge_params(params);
            return route.validator().call(req, next);
        }

        match &self.options.not_found {
            Some(not_found) => not_found.call(req, next),
            None => next.run(req),
        }
    }
}

/// Standalone validation for hosts that only speak the plain handler
/// convention. Obtain via [`RouteSchema::legacy_middleware`](crate::RouteSchema::legacy_middleware).
///
/// ```rust
/// use route_schema::{Request, RouteSchema, Router};
///
/// async fn create_user(_req: Request) -> &'static str { "created" }
///
/// let schema = RouteSchema::builder().build().unwrap();
/// let guard = schema.legacy_middleware();
/// let app = Router::new().post("/users", guard.wrap(create_user));
/// ```
#[derive(Clone)]
pub struct LegacyMiddleware {
    pub(crate) scan: ScanMiddleware,
}

impl LegacyMiddleware {
    /// A handler that runs the registry scan, then `handler` if the request
    /// passes.
    pub fn wrap<H: Handler>(self, handler: H) -> impl Handler {
        let scan = Arc::new(self.scan);
        let handler: BoxedHandler = handler.into_boxed_handler();
        move |req: Request| {
            let next = Next::new(Arc::from(Vec::new()), Arc::clone(&handler));
            scan.call(req, next)
        }
    }
}

/// Default attachment: prepends the descriptor's validator to every route
/// in `router` with the same method whose prefixed pattern the descriptor
/// matches.
pub fn attach_route(router: &mut Router, descriptor: &RouteDescriptor) {
    let prefix = router.prefix().to_owned();
    for target in router.routes_mut() {
        if target.method() != descriptor.method() {
            continue;
        }
        let prefixed = create_prefix(&prefix, target.pattern());
        if descriptor.matcher().matches(&prefixed).is_none() {
            continue;
        }
        debug!(
            route = %descriptor.route(),
            method = %descriptor.method(),
            pattern = %target.pattern(),
            "attached schema validation"
        );
        target.prepend(descriptor.middleware());
    }
}
