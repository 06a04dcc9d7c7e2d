//! Composable middleware chain (spec §4.7). Grounded on the teacher's
//! `proxy::httpproxy::apply_request_policies`/`apply_response_filters`
//! ordered-application pattern, generalized into the explicit
//! function-composition model spec §9 names: "`Middleware = Handler ->
//! Handler`. It is associative; ordering is explicit, not inherited."

pub mod authentication;
pub mod authorization;
pub mod circuit_breaker;
pub mod cors;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod recovery;
pub mod retry;
pub mod route_resolution;
pub mod telemetry_span;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::http_types::{Request, Response};

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, GatewayError>> + Send>>;

/// The base handler and every middleware share this signature: take the
/// request context plus the request, produce a response or an error.
pub trait Handler: Send + Sync {
	fn call(&self, ctx: RequestContext, req: Request) -> HandlerFuture;
}

impl<F> Handler for F
where
	F: Fn(RequestContext, Request) -> HandlerFuture + Send + Sync,
{
	fn call(&self, ctx: RequestContext, req: Request) -> HandlerFuture {
		(self)(ctx, req)
	}
}

pub type DynHandler = Arc<dyn Handler>;

/// `Middleware = Handler -> Handler` (spec §9). A middleware closes over the
/// next handler in the chain and returns a new handler that wraps it.
pub trait Middleware: Send + Sync {
	fn wrap(&self, next: DynHandler) -> DynHandler;
}

/// Composes middlewares outside-in so that the first entry in `layers` runs
/// first on entry and unwinds last on exit (spec §4.7): "Middleware is
/// composed outside-in so that on entry the outer middleware runs first and
/// on exit the innermost unwinds first."
///
/// Pass layers in the canonical order from spec §4.7 (recovery, logging,
/// telemetry, cors, auth, authz, rate limit, breaker, retry, metrics); this
/// function wraps from the end of the slice backward so the first element
/// ends up outermost. Breaker sits outer to retry, not inner as the bare
/// numbered list in §4.7 might suggest: spec §9's open question on this
/// ordering is resolved in favor of breaker-outer, so an open breaker
/// rejects once instead of absorbing an entire retry budget.
pub fn compose(layers: Vec<Box<dyn Middleware>>, base: DynHandler) -> DynHandler {
	layers.into_iter().rev().fold(base, |inner, mw| mw.wrap(inner))
}
