//! Route-aware wrapper (spec §4.7: "A route-aware wrapper resolves the
//! route once and inserts the `RouteResult` into the context so subsequent
//! middleware reads per-route policy without re-matching."). Grounded on
//! the teacher's `proxy::resolve_backend` call site being hoisted to the
//! top of `httpproxy::proxy`, ahead of its policy filters, for exactly this
//! reason: later stages (auth's `authRequired`, rate limit's per-route
//! policy, the breaker's route-id key) all need `RouteResult` before they
//! run, not after the base handler forwards.

use super::{DynHandler, Handler, HandlerFuture, Middleware};
use crate::context::RequestContext;
use crate::model::Protocol;
use crate::router::Router;
use std::sync::Arc;

pub struct RouteResolution {
	router: Arc<Router>,
}

impl RouteResolution {
	pub fn new(router: Arc<Router>) -> Self {
		RouteResolution { router }
	}
}

impl Middleware for RouteResolution {
	fn wrap(&self, next: DynHandler) -> DynHandler {
		std::sync::Arc::new(RouteResolutionHandler { next, router: self.router.clone() })
	}
}

struct RouteResolutionHandler {
	next: DynHandler,
	router: Arc<Router>,
}

impl Handler for RouteResolutionHandler {
	fn call(&self, mut ctx: RequestContext, req: crate::http_types::Request) -> HandlerFuture {
		let next = self.next.clone();
		let router = self.router.clone();
		Box::pin(async move {
			let route = router.resolve(req.method(), req.uri().path(), Protocol::Http, None).await?;
			ctx.with_route(route);
			next.call(ctx, req).await
		})
	}
}
