//! Metrics middleware (spec §4.7 item 10), innermost before the base
//! handler. Grounded on the teacher's `prometheus-client`-based metric
//! registration style (`mtrcs.rs`), narrowed to the counters/histograms
//! this crate's `telemetry::metrics` module registers.

use std::time::Instant;

use super::{DynHandler, Handler, HandlerFuture, Middleware};
use crate::context::RequestContext;
use crate::http_types::Request;
use crate::telemetry::metrics::GatewayMetrics;

pub struct MetricsMiddleware {
	metrics: GatewayMetrics,
}

impl MetricsMiddleware {
	pub fn new(metrics: GatewayMetrics) -> Self {
		MetricsMiddleware { metrics }
	}
}

impl Middleware for MetricsMiddleware {
	fn wrap(&self, next: DynHandler) -> DynHandler {
		std::sync::Arc::new(MetricsHandler { next, metrics: self.metrics.clone() })
	}
}

struct MetricsHandler {
	next: DynHandler,
	metrics: GatewayMetrics,
}

impl Handler for MetricsHandler {
	fn call(&self, ctx: RequestContext, req: Request) -> HandlerFuture {
		let next = self.next.clone();
		let metrics = self.metrics.clone();
		let method = req.method().to_string();
		let path = req.uri().path().to_string();

		Box::pin(async move {
			let start = Instant::now();
			let result = next.call(ctx, req).await;
			let elapsed = start.elapsed();
			let status = match &result {
				Ok(resp) => resp.status().as_u16(),
				Err(err) => err.status().as_u16(),
			};
			metrics.observe_request(&method, &path, status, elapsed);
			result
		})
	}
}
