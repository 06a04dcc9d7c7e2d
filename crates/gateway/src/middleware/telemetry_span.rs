//! Telemetry span middleware (spec §4.7 item 3). Grounded on the teacher's
//! `#[instrument]`-heavy style: opens one `tracing` span per request so
//! every event emitted further down the chain (auth failures, retries,
//! breaker trips) is automatically correlated.

use tracing::Instrument;

use super::{DynHandler, Handler, HandlerFuture, Middleware};
use crate::context::RequestContext;
use crate::http_types::Request;

pub struct TelemetrySpan;

impl Middleware for TelemetrySpan {
	fn wrap(&self, next: DynHandler) -> DynHandler {
		std::sync::Arc::new(TelemetrySpanHandler { next })
	}
}

struct TelemetrySpanHandler {
	next: DynHandler,
}

impl Handler for TelemetrySpanHandler {
	fn call(&self, ctx: RequestContext, req: Request) -> HandlerFuture {
		let next = self.next.clone();
		let span = tracing::info_span!(
			"request",
			request_id = %ctx.request_id,
			method = %req.method(),
			path = %req.uri().path(),
		);
		Box::pin(async move { next.call(ctx, req).await }.instrument(span))
	}
}
