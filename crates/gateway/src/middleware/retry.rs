//! Retry middleware (spec §4.7 item 8: "retry wraps below, so it lives
//! closer to the handler"). Grounded on the teacher's `proxy::httpproxy`
//! retry loop: buffer the body once, clone it for every attempt but the
//! last, add an `x-retry-attempt` header, decide continuation via
//! `should_retry`. Consumes one [`RetryBudget`] token per retry attempt.

use std::sync::Arc;

use http_body_util::BodyExt;

use super::{DynHandler, Handler, HandlerFuture, Middleware};
use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::http_types::{Body, Request};
use crate::reliability::retry::{fits_in_deadline, RetryPolicy};
use crate::reliability::RetryBudget;

/// Bodies larger than this are not buffered for retry; a request with a
/// larger body is forwarded without retry capability, mirroring the
/// teacher's `MAX_BUFFERED_BYTES` cap in `proxy::httpproxy`.
const MAX_BUFFERED_BYTES: usize = 64 * 1024;

pub struct RetryMiddleware {
	policy: RetryPolicy,
	budget: Arc<RetryBudget>,
}

impl RetryMiddleware {
	pub fn new(policy: RetryPolicy, budget: Arc<RetryBudget>) -> Self {
		RetryMiddleware { policy, budget }
	}
}

impl Middleware for RetryMiddleware {
	fn wrap(&self, next: DynHandler) -> DynHandler {
		std::sync::Arc::new(RetryHandler {
			next,
			policy: self.policy.clone(),
			budget: self.budget.clone(),
		})
	}
}

struct RetryHandler {
	next: DynHandler,
	policy: RetryPolicy,
	budget: Arc<RetryBudget>,
}

impl Handler for RetryHandler {
	fn call(&self, ctx: RequestContext, req: Request) -> HandlerFuture {
		let next = self.next.clone();
		let policy = self.policy.clone();
		let budget = self.budget.clone();

		Box::pin(async move {
			budget.observe_request();

			if !policy.is_retryable_method(req.method()) {
				return next.call(ctx, req).await;
			}

			let (parts, body) = req.into_parts();
			let collected = body.collect().await;
			let Ok(collected) = collected else {
				// Body already partially consumed or unreadable; fall back
				// to a single attempt with no replay capability.
				let req = http::Request::from_parts(parts, Body::empty());
				return next.call(ctx, req).await;
			};
			let bytes = collected.to_bytes();
			if bytes.len() > MAX_BUFFERED_BYTES {
				let req = http::Request::from_parts(parts.clone(), Body::from(bytes));
				return next.call(ctx, req).await;
			}

			let mut last_err = None;
			for attempt in 0..policy.max_attempts {
				let mut attempt_parts = parts.clone();
				if attempt > 0 {
					if let Ok(hv) = http::HeaderValue::from_str(&attempt.to_string()) {
						attempt_parts.headers.insert("x-retry-attempt", hv);
					}
				}
				let attempt_req = http::Request::from_parts(attempt_parts, Body::from(bytes.clone()));

				match next.call(ctx.clone(), attempt_req).await {
					Ok(resp) if !is_retryable_status(resp.status()) => return Ok(resp),
					Ok(resp) => {
						if attempt + 1 >= policy.max_attempts {
							return Ok(resp);
						}
						last_err = Some(GatewayError::bad_gateway(format!(
							"upstream returned {}",
							resp.status()
						)));
					}
					Err(err) if !err.is_retryable() => return Err(err),
					Err(err) => {
						if attempt + 1 >= policy.max_attempts {
							return Err(err);
						}
						last_err = Some(err);
					}
				}

				if !budget.try_consume() {
					return Err(last_err.unwrap_or_else(|| GatewayError::internal("retry budget exhausted")));
				}

				let delay = policy.backoff_for_attempt(attempt);
				if !fits_in_deadline(delay, ctx.deadline) {
					return Err(last_err.unwrap_or_else(|| GatewayError::timeout()));
				}
				tokio::time::sleep(delay).await;
			}

			Err(last_err.unwrap_or_else(|| GatewayError::internal("retry loop exited unexpectedly")))
		})
	}
}

fn is_retryable_status(status: http::StatusCode) -> bool {
	matches!(status.as_u16(), 502 | 503 | 504)
}
