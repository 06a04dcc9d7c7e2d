//! Local rate-limit store: an LRU map of per-key buckets protected by
//! per-bucket locking (spec §4.5 "Local"). Grounded directly on the
//! teacher's `http/localratelimit.rs::RateLimit`, with `moka`'s sync cache
//! standing in for the teacher's forked `ratelimit::Ratelimiter` +
//! `clocksource` combination (background TTL/capacity eviction is what
//! `moka` gives us for free and the spec asks for: "background cleanup by
//! TTL/max-entries").

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::sync::Cache;
use parking_lot::Mutex;

use super::{Decision, RateLimiterStore};

struct Bucket {
	tokens: f64,
	last_refill: Instant,
}

pub struct LocalStore {
	buckets: Cache<String, Arc<Mutex<Bucket>>>,
}

impl LocalStore {
	pub fn new(capacity: u64) -> Self {
		LocalStore {
			buckets: Cache::builder()
				.max_capacity(capacity)
				.time_to_idle(Duration::from_secs(3600))
				.build(),
		}
	}
}

#[async_trait]
impl RateLimiterStore for LocalStore {
	async fn allow(&self, key: &str, rate: u32, burst: u32, n: u32) -> Decision {
		let bucket = self.buckets.get_with(key.to_string(), || {
			Arc::new(Mutex::new(Bucket { tokens: burst as f64, last_refill: Instant::now() }))
		});

		let mut b = bucket.lock();
		let now = Instant::now();
		let elapsed = now.duration_since(b.last_refill).as_secs_f64();
		b.tokens = (b.tokens + elapsed * rate as f64).min(burst as f64);
		b.last_refill = now;

		let cost = n as f64;
		if b.tokens >= cost {
			b.tokens -= cost;
			Decision { allowed: true, remaining: b.tokens as u32, reset_seconds: 0 }
		} else {
			let deficit = cost - b.tokens;
			let reset_seconds = if rate > 0 { (deficit / rate as f64).ceil() as u64 } else { 1 };
			Decision { allowed: false, remaining: b.tokens.max(0.0) as u32, reset_seconds: reset_seconds.max(1) }
		}
	}

	async fn reset(&self, key: &str) {
		self.buckets.invalidate(key);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn allows_up_to_burst_then_denies() {
		let store = LocalStore::new(100);
		assert!(store.allow("ip1", 2, 2, 1).await.allowed);
		assert!(store.allow("ip1", 2, 2, 1).await.allowed);
		let third = store.allow("ip1", 2, 2, 1).await;
		assert!(!third.allowed);
		assert!(third.reset_seconds >= 1);
	}

	#[tokio::test]
	async fn distinct_keys_have_independent_buckets() {
		let store = LocalStore::new(100);
		assert!(store.allow("a", 1, 1, 1).await.allowed);
		assert!(!store.allow("a", 1, 1, 1).await.allowed);
		assert!(store.allow("b", 1, 1, 1).await.allowed);
	}
}
