//! Circuit breaker middleware (spec §4.7 item 9). Keyed by route id (or,
//! when the rule carries no id-level override, the service name), per
//! spec §4.3 "Precedence when both route and service configs exist: route
//! > service > default." Only this middleware decides the breaker key and
//! records outcomes; [`crate::reliability::circuit_breaker::BreakerRegistry`]
//! itself is stateless about policy.

use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::http_types::Request;
use crate::reliability::circuit_breaker::Admission;
use crate::reliability::BreakerRegistry;

use super::{DynHandler, Handler, HandlerFuture, Middleware};

pub struct CircuitBreakerMiddleware {
	registry: BreakerRegistry,
}

impl CircuitBreakerMiddleware {
	pub fn new(registry: BreakerRegistry) -> Self {
		CircuitBreakerMiddleware { registry }
	}
}

impl Middleware for CircuitBreakerMiddleware {
	fn wrap(&self, next: DynHandler) -> DynHandler {
		std::sync::Arc::new(CircuitBreakerHandler { next, registry: self.registry.clone() })
	}
}

struct CircuitBreakerHandler {
	next: DynHandler,
	registry: BreakerRegistry,
}

impl Handler for CircuitBreakerHandler {
	fn call(&self, ctx: RequestContext, req: Request) -> HandlerFuture {
		let next = self.next.clone();
		let registry = self.registry.clone();
		let key = ctx
			.route
			.as_ref()
			.map(|r| r.rule.id.clone())
			.unwrap_or_else(|| "default".to_string());

		Box::pin(async move {
			match registry.admit(&key) {
				Admission::Rejected => {
					return Err(GatewayError::service_unavailable("circuit breaker open"));
				}
				Admission::Allowed => {}
			}

			let result = next.call(ctx, req).await;
			let is_failure = match &result {
				Ok(resp) => resp.status().as_u16() >= 500,
				Err(err) => err.is_downstream_failure(),
			};
			registry.record(&key, !is_failure);
			result
		})
	}
}
