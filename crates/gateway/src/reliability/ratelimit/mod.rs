//! Token-bucket rate limiter with a pluggable store (spec §4.5). Grounded
//! on the teacher's `http/localratelimit.rs` (`RateLimit` wrapping a token
//! bucket, `check_request` returning remaining/reset) and
//! `http/remoteratelimit.rs` (an atomic round-trip to an external store);
//! the spec's `Allow(key, rate, burst, n)` contract (§6) is modeled as the
//! [`RateLimiterStore`] trait so local and shared storage are
//! interchangeable behind one [`RateLimiter`] façade.

mod local;
mod shared;

pub use local::LocalStore;
pub use shared::SharedStore;

use async_trait::async_trait;

use crate::model::RateLimitPolicy;

/// Outcome of one `Allow` call (spec §6 rate-limit store contract).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
	pub allowed: bool,
	pub remaining: u32,
	/// Seconds until the next token is available, used to compute
	/// `Retry-After` on a deny.
	pub reset_seconds: u64,
}

/// `Allow(key, rate, burst, n) -> (allowed, remaining, resetAt)` plus
/// `Reset(key)` (spec §6). Implementations must make the check-and-decrement
/// atomic: "a RateLimiterBucket never reports remaining<0" (spec §3
/// invariant).
#[async_trait]
pub trait RateLimiterStore: Send + Sync {
	async fn allow(&self, key: &str, rate: u32, burst: u32, n: u32) -> Decision;
	async fn reset(&self, key: &str);
}

/// The middleware-facing limiter: resolves the per-route [`RateLimitPolicy`]
/// against whichever store (local or shared) the route names.
pub struct RateLimiter {
	store: Box<dyn RateLimiterStore>,
}

impl RateLimiter {
	pub fn new(store: Box<dyn RateLimiterStore>) -> Self {
		RateLimiter { store }
	}

	pub async fn check(&self, key: &str, policy: &RateLimitPolicy) -> Decision {
		self.store.allow(key, policy.rate, policy.burst, 1).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn decision_never_reports_negative_remaining() {
		let store = LocalStore::new(1_000);
		for _ in 0..5 {
			let d = store.allow("k", 2, 2, 1).await;
			assert!(d.remaining <= 2);
		}
	}
}
