//! Circuit breaker state machine (spec §4.3). Grounded on the teacher's
//! per-key `dashmap`-sharded state pattern (seen throughout
//! `http/localratelimit.rs` and `rbac.rs`'s keyed caches), generalized to
//! the closed/open/half-open machine the spec names; the teacher's proxy
//! has no breaker of its own, so the state machine logic is authored
//! directly from spec §4.3 and §8's testable properties.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::CircuitBreakerConfig;

/// Legal transitions per spec §3 invariant: `{closed->open, open->half-open,
/// half-open->open, half-open->closed}`. No other transition is reachable
/// through this type's public API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
	Closed,
	Open,
	HalfOpen,
}

struct KeyState {
	state: BreakerState,
	consecutive_failures: u32,
	window_requests: u32,
	window_failures: u32,
	window_started_at: Instant,
	opened_at: Option<Instant>,
	half_open_successes: u32,
	half_open_admitted: u32,
}

impl KeyState {
	fn new(now: Instant) -> Self {
		KeyState {
			state: BreakerState::Closed,
			consecutive_failures: 0,
			window_requests: 0,
			window_failures: 0,
			window_started_at: now,
			opened_at: None,
			half_open_successes: 0,
			half_open_admitted: 0,
		}
	}

	fn roll_window_if_needed(&mut self, now: Instant, interval: Duration) {
		if now.duration_since(self.window_started_at) >= interval {
			self.window_requests = 0;
			self.window_failures = 0;
			self.window_started_at = now;
		}
	}
}

/// Whether a forward attempt may proceed right now, and what the caller
/// must do with the eventual outcome.
pub enum Admission {
	Allowed,
	Rejected,
}

/// Process-wide, sharded-by-key breaker state (spec §9: "a concurrent map
/// sharded by key hash; avoid a single global lock"). `dashmap` gives us
/// that sharding; each entry additionally holds a `parking_lot::Mutex` so a
/// single key's read-modify-write sequence (admit, then record outcome) is
/// linearizable, per spec §4.3 "Thread safety: all state transitions are
/// serialized per key."
#[derive(Clone)]
pub struct BreakerRegistry {
	config: Arc<CircuitBreakerConfig>,
	keys: Arc<DashMap<String, Mutex<KeyState>>>,
}

impl BreakerRegistry {
	pub fn new(config: CircuitBreakerConfig) -> Self {
		BreakerRegistry { config: Arc::new(config), keys: Arc::new(DashMap::new()) }
	}

	/// Call before forwarding. Returns `Rejected` when the breaker is open
	/// (or half-open with no probe slots left), in which case the connector
	/// must never be invoked (spec §8 testable property).
	pub fn admit(&self, key: &str) -> Admission {
		let now = Instant::now();
		let entry = self.keys.entry(key.to_string()).or_insert_with(|| Mutex::new(KeyState::new(now)));
		let mut state = entry.lock();

		match state.state {
			BreakerState::Closed => Admission::Allowed,
			BreakerState::Open => {
				let opened_at = state.opened_at.unwrap_or(now);
				if now.duration_since(opened_at) >= self.config.timeout {
					state.state = BreakerState::HalfOpen;
					state.half_open_successes = 0;
					state.half_open_admitted = 1;
					Admission::Allowed
				} else {
					Admission::Rejected
				}
			}
			BreakerState::HalfOpen => {
				if state.half_open_admitted < self.config.max_requests {
					state.half_open_admitted += 1;
					Admission::Allowed
				} else {
					Admission::Rejected
				}
			}
		}
	}

	/// Records the outcome of a forward that `admit` allowed. Only
	/// downstream failures (5xx/timeout/connection error/gRPC
	/// Unavailable-DeadlineExceeded, per spec §4.3) should be reported as
	/// `success = false`; a 4xx response is not a breaker failure.
	pub fn record(&self, key: &str, success: bool) {
		let now = Instant::now();
		let Some(entry) = self.keys.get(key) else { return };
		let mut state = entry.lock();

		match state.state {
			BreakerState::Closed => {
				state.roll_window_if_needed(now, self.config.interval);
				state.window_requests += 1;
				if success {
					state.consecutive_failures = 0;
				} else {
					state.consecutive_failures += 1;
					state.window_failures += 1;
				}
				let rate_tripped = state.window_requests >= self.config.max_failures
					&& (state.window_failures as f64 / state.window_requests as f64)
						>= self.config.failure_threshold;
				if state.consecutive_failures >= self.config.max_failures || rate_tripped {
					state.state = BreakerState::Open;
					state.opened_at = Some(now);
				}
			}
			BreakerState::HalfOpen => {
				if success {
					state.half_open_successes += 1;
					if state.half_open_successes >= self.config.max_requests {
						state.state = BreakerState::Closed;
						state.consecutive_failures = 0;
						state.window_requests = 0;
						state.window_failures = 0;
						state.window_started_at = now;
						state.opened_at = None;
					}
				} else {
					state.state = BreakerState::Open;
					state.opened_at = Some(now);
				}
			}
			BreakerState::Open => {
				// A result arriving for a request admitted just before the
				// breaker tripped; nothing to do, the state already reflects
				// the worst outcome.
			}
		}
	}

	pub fn state_of(&self, key: &str) -> BreakerState {
		self.keys.get(key).map(|e| e.lock().state).unwrap_or(BreakerState::Closed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config() -> CircuitBreakerConfig {
		CircuitBreakerConfig {
			max_failures: 3,
			failure_threshold: 1.0,
			interval: Duration::from_secs(60),
			timeout: Duration::from_millis(50),
			max_requests: 1,
		}
	}

	#[test]
	fn opens_after_consecutive_failures_and_rejects_without_admitting() {
		let registry = BreakerRegistry::new(config());
		for _ in 0..3 {
			assert!(matches!(registry.admit("k"), Admission::Allowed));
			registry.record("k", false);
		}
		assert!(matches!(registry.admit("k"), Admission::Rejected));
		assert_eq!(registry.state_of("k"), BreakerState::Open);
	}

	#[test]
	fn transitions_half_open_after_timeout_then_closed_on_success() {
		let registry = BreakerRegistry::new(config());
		for _ in 0..3 {
			registry.admit("k");
			registry.record("k", false);
		}
		assert_eq!(registry.state_of("k"), BreakerState::Open);

		std::thread::sleep(Duration::from_millis(60));
		assert!(matches!(registry.admit("k"), Admission::Allowed));
		assert_eq!(registry.state_of("k"), BreakerState::HalfOpen);

		registry.record("k", true);
		assert_eq!(registry.state_of("k"), BreakerState::Closed);
	}

	#[test]
	fn half_open_failure_reopens_immediately() {
		let registry = BreakerRegistry::new(config());
		for _ in 0..3 {
			registry.admit("k");
			registry.record("k", false);
		}
		std::thread::sleep(Duration::from_millis(60));
		registry.admit("k");
		registry.record("k", false);
		assert_eq!(registry.state_of("k"), BreakerState::Open);
	}
}
