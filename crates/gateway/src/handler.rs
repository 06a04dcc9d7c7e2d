//! The base handler (spec §4.7 item 11): `route(ctx, req) -> forward(ctx,
//! req, route)`. Grounded on the teacher's two-step
//! `resolve_backend`/forward split in `proxy/mod.rs` and
//! `proxy/httpproxy.rs`.

use std::sync::Arc;

use crate::connectors::HttpConnector;
use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::http_types::{Request, Response};
use crate::model::Protocol;
use crate::router::Router;

/// Wraps `router.resolve` + the protocol-appropriate connector call.
/// Installed as the innermost link of the middleware chain
/// (`middleware::compose`'s `base` argument).
pub struct BaseHandler {
	router: Arc<Router>,
	http: Arc<HttpConnector>,
}

impl BaseHandler {
	pub fn new(router: Arc<Router>, http: Arc<HttpConnector>) -> Self {
		BaseHandler { router, http }
	}

	/// Uses the route already resolved by
	/// [`crate::middleware::route_resolution::RouteResolution`] when present
	/// (the normal case once the full chain is wired); resolves directly
	/// otherwise, so a caller that exercises `BaseHandler` standalone (e.g. a
	/// unit test) doesn't need to wire the route-aware wrapper too.
	pub async fn handle(&self, mut ctx: RequestContext, req: Request) -> Result<Response, GatewayError> {
		let instance = match &ctx.route {
			Some(route) => route.instance.clone(),
			None => {
				let route = self
					.router
					.resolve(req.method(), req.uri().path(), Protocol::Http, None)
					.await?;
				let instance = route.instance.clone();
				ctx.with_route(route);
				instance
			}
		};

		self.http.forward(req, &instance, &ctx.remote_addr.to_string(), &ctx.request_id).await
	}
}

impl crate::middleware::Handler for BaseHandler {
	fn call(&self, ctx: RequestContext, req: Request) -> crate::middleware::HandlerFuture {
		// `BaseHandler` is only ever wrapped behind an `Arc` inside the
		// chain, so this clone is just bumping that refcount, not copying
		// connector/router state.
		let router = self.router.clone();
		let http = self.http.clone();
		Box::pin(async move { BaseHandler { router, http }.handle(ctx, req).await })
	}
}
