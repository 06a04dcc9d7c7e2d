//! Logging / request-id middleware (spec §4.7 item 2). Grounded on the
//! teacher's convention of assigning a request id and logging at
//! `info`/`warn` via `tracing`, mirroring `telemetry::log`'s per-request
//! summary line.

use std::time::Instant;

use uuid::Uuid;

use super::{DynHandler, Handler, HandlerFuture, Middleware};
use crate::context::RequestContext;
use crate::http_types::{Request, x_headers};

pub struct RequestLogging;

impl Middleware for RequestLogging {
	fn wrap(&self, next: DynHandler) -> DynHandler {
		std::sync::Arc::new(LoggingHandler { next })
	}
}

struct LoggingHandler {
	next: DynHandler,
}

impl Handler for LoggingHandler {
	fn call(&self, mut ctx: RequestContext, req: Request) -> HandlerFuture {
		let next = self.next.clone();
		Box::pin(async move {
			if ctx.request_id.is_empty() {
				ctx.request_id = req
					.headers()
					.get(x_headers::X_REQUEST_ID)
					.and_then(|v| v.to_str().ok())
					.map(|s| s.to_string())
					.unwrap_or_else(|| Uuid::new_v4().to_string());
			}

			let method = req.method().clone();
			let path = req.uri().path().to_string();
			let start = Instant::now();
			let request_id = ctx.request_id.clone();

			let mut result = next.call(ctx, req).await;
			match &mut result {
				Ok(resp) => {
					if let Ok(hv) = http::HeaderValue::from_str(&request_id) {
						resp.headers_mut().insert(x_headers::X_REQUEST_ID, hv);
					}
				}
				Err(err) => {
					err.detail.entry("request_id".to_string()).or_insert_with(|| request_id.clone());
				}
			}

			let elapsed = start.elapsed();
			match &result {
				Ok(resp) => tracing::info!(
					request_id, %method, path, status = resp.status().as_u16(), elapsed_ms = elapsed.as_millis() as u64,
					"request completed"
				),
				Err(err) => tracing::warn!(
					request_id, %method, path, status = err.status().as_u16(), elapsed_ms = elapsed.as_millis() as u64,
					error = %err, "request failed"
				),
			}

			result
		})
	}
}
