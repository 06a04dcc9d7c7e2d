//! Rate limit middleware (spec §4.7 item 7). Reads the per-route policy
//! attached to the resolved route and checks it against the shared
//! [`RateLimiter`], per spec §4.5 "Per-route rate limits selected via the
//! route rule during routing."

use std::sync::Arc;

use super::{DynHandler, Handler, HandlerFuture, Middleware};
use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::http_types::{Request, x_headers};
use crate::model::RateLimitKeyBy;
use crate::reliability::RateLimiter;

pub struct RateLimitMiddleware {
	limiter: Arc<RateLimiter>,
}

impl RateLimitMiddleware {
	pub fn new(limiter: Arc<RateLimiter>) -> Self {
		RateLimitMiddleware { limiter }
	}
}

impl Middleware for RateLimitMiddleware {
	fn wrap(&self, next: DynHandler) -> DynHandler {
		std::sync::Arc::new(RateLimitHandler { next, limiter: self.limiter.clone() })
	}
}

struct RateLimitHandler {
	next: DynHandler,
	limiter: Arc<RateLimiter>,
}

impl Handler for RateLimitHandler {
	fn call(&self, ctx: RequestContext, req: Request) -> HandlerFuture {
		let next = self.next.clone();
		let limiter = self.limiter.clone();
		let policy = ctx.route.as_ref().and_then(|r| r.rule.rate_limit.clone());

		Box::pin(async move {
			let Some(policy) = policy else {
				return next.call(ctx, req).await;
			};

			let key = match policy.key_by {
				RateLimitKeyBy::ClientIp => ctx.remote_addr.ip().to_string(),
				RateLimitKeyBy::Path => req.uri().path().to_string(),
				RateLimitKeyBy::IpAndPath => format!("{}:{}", ctx.remote_addr.ip(), req.uri().path()),
			};

			let decision = limiter.check(&key, &policy).await;
			if !decision.allowed {
				return Err(build_rejection(&decision));
			}

			next.call(ctx, req).await
		})
	}
}

fn build_rejection(decision: &crate::reliability::ratelimit::Decision) -> GatewayError {
	GatewayError::rate_limited(decision.reset_seconds)
		.with_detail(x_headers::X_RATELIMIT_REMAINING, decision.remaining.to_string())
}
